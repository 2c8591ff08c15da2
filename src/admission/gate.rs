//! Upgrade admission pipeline.
//!
//! # Responsibilities
//! - Validate an inbound request step by step, short-circuiting on failure
//! - Look up the endpoint pattern via the listener's matcher set
//! - Run the pre-handshake hook when the endpoint declares one
//! - Hand the accepted pattern and negotiated sub-protocol back upstream
//!
//! # Design Decisions
//! - Exactly one admission attempt per connection; a rejected connection is
//!   never retried by this layer
//! - A pre-handshake hook that closes the connection aborts admission
//!   silently, without a rejection response
//! - A type mismatch while binding hook arguments becomes a bad request
//!   instead of being swallowed like other dispatch failures

use std::sync::Arc;

use axum::http::header::{HOST, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use axum::http::Method;

use crate::dispatch::{Connection, EventRouter, SUBPROTOCOLS_ATTR};
use crate::endpoint::BindError;

use super::response::Rejection;
use super::UpgradeRequest;

/// Host value treated as a wildcard bind (no host check).
const WILDCARD_ADDRESS: &str = "0.0.0.0";

/// A request that passed the whole admission pipeline.
#[derive(Debug, Clone)]
pub struct AcceptedUpgrade {
    /// The registered pattern the request path matched.
    pub pattern: String,
    /// Sub-protocol requested by the pre-handshake hook, if any.
    pub subprotocols: Option<String>,
}

/// Outcome of running the admission pipeline for one connection.
#[derive(Debug)]
pub enum Admission {
    /// Proceed with the handshake.
    Accept(AcceptedUpgrade),
    /// Answer with a rejection response.
    Reject(Rejection),
    /// The pre-handshake hook closed the connection; the hosting layer
    /// answers with as little as its protocol stack allows.
    Abort,
}

/// Validates inbound requests for one listener and admits upgrades.
pub struct UpgradeGate {
    router: Arc<EventRouter>,
}

impl UpgradeGate {
    pub fn new(router: Arc<EventRouter>) -> Self {
        Self { router }
    }

    /// Rejection for a request the hosting layer could not even decode.
    pub fn reject_malformed() -> Rejection {
        Rejection::bad_request()
    }

    /// Run the validation pipeline for one request. Side effects on the
    /// connection (pattern, headers, extracted path variables, handler and
    /// session binding) happen at most once.
    pub fn admit(&self, conn: &Connection, req: &UpgradeRequest) -> Admission {
        // Only the safe retrieval method may initiate an upgrade.
        if req.method() != Method::GET {
            return Admission::Reject(Rejection::forbidden());
        }

        let Some(host) = req.headers().get(HOST).and_then(|v| v.to_str().ok()) else {
            return Admission::Reject(Rejection::forbidden());
        };

        if let Some(bound) = self.router.host() {
            let request_host = host.split(':').next().unwrap_or(host);
            if !bound.is_empty() && bound != WILDCARD_ADDRESS && bound != request_host {
                return Admission::Reject(Rejection::forbidden());
            }
        }

        // First matcher that accepts wins; a templated match stores its
        // extracted variables on the connection as it goes.
        let pattern = self
            .router
            .matchers()
            .iter()
            .find(|m| m.match_and_extract(req.path(), conn))
            .map(|m| m.pattern().to_owned());
        let Some(pattern) = pattern else {
            return Admission::Reject(Rejection::not_found());
        };

        let headers = req.headers();
        if !headers.contains_key(UPGRADE)
            || !headers.contains_key(SEC_WEBSOCKET_KEY)
            || !headers.contains_key(SEC_WEBSOCKET_VERSION)
        {
            return Admission::Reject(Rejection::forbidden());
        }

        conn.set_headers(headers.clone());

        let mut subprotocols = None;
        if self.router.has_before_handshake(conn, &pattern) {
            match self.router.do_before_handshake(conn, req, &pattern) {
                Ok(()) => {}
                Err(err @ BindError::TypeMismatch { .. }) => {
                    tracing::warn!(connection = %conn.id(), pattern, error = %err, "pre-handshake argument mismatch");
                    return Admission::Reject(Rejection::bad_request());
                }
                Err(err) => {
                    tracing::error!(connection = %conn.id(), pattern, error = %err, "pre-handshake binding failed");
                    return Admission::Reject(Rejection::internal_error());
                }
            }
            if !conn.transport().is_active() {
                return Admission::Abort;
            }
            subprotocols = conn
                .session()
                .and_then(|s| s.attr::<String>(SUBPROTOCOLS_ATTR))
                .map(|v| (*v).clone());
        }

        Admission::Accept(AcceptedUpgrade { pattern, subprotocols })
    }
}
