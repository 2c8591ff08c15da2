//! Request admission subsystem.
//!
//! # Data Flow
//! ```text
//! inbound upgrade request
//!     → gate.rs (validation pipeline, short-circuit on first failure)
//!     → path lookup → pre-handshake hook → Admission decision
//!     → Accept: hosting layer completes the handshake, installs the frame
//!       pump, and dispatches the open event
//!     → Reject: response.rs maps the failure to an HTTP status
//! ```

pub mod gate;
pub mod response;

pub use gate::{AcceptedUpgrade, Admission, UpgradeGate};
pub use response::Rejection;

use std::collections::HashMap;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};

/// The admission-relevant view of an inbound HTTP upgrade request.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
}

impl UpgradeRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self { method, uri, headers }
    }

    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Decoded query parameters, multi-valued per key.
    pub fn query_params(&self) -> HashMap<String, Vec<String>> {
        let mut params: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(query) = self.uri.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                params.entry(key.into_owned()).or_default().push(value.into_owned());
            }
        }
        params
    }
}
