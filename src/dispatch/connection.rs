//! Connection abstraction and typed per-connection context.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track the connection lifecycle phase
//! - Own the connection-scoped dispatch state: bound handler instance,
//!   session, resolved pattern, extracted path variables, cached query
//!   parameters, upgrade headers
//!
//! # Design Decisions
//! - State lives in one typed struct owned by the connection, not in a
//!   stringly-keyed attribute bag
//! - Query parameters are decoded at most once and cached for the
//!   connection's lifetime
//! - The handler instance is taken out of the context for the duration of an
//!   invocation, so a second dispatch for the same connection cannot run
//!   concurrently with it

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::HeaderMap;
use bytes::Bytes;
use thiserror::Error;

use crate::endpoint::HandlerInstance;

use super::session::Session;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Failure reported by a transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("transport failure: {0}")]
    Io(String),
}

/// One live transport connection, as seen by the dispatch core.
///
/// The hosting layer owns the wire; the core only sends, closes, and asks
/// whether the peer is still there.
pub trait Transport: Send + Sync {
    fn send_text(&self, text: &str) -> Result<(), TransportError>;

    fn send_binary(&self, data: Bytes) -> Result<(), TransportError>;

    /// Initiate close. Idempotent; later sends fail with `Closed`.
    fn close(&self);

    fn is_active(&self) -> bool;

    fn remote_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Lifecycle phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing admitted yet.
    Unopened,
    /// Pre-handshake hook ran; handler and session attached.
    Admitted,
    /// Handshake finished, open dispatched.
    Open,
    /// Terminal. No events are dispatched past this point.
    Closed,
}

struct ConnState {
    phase: Phase,
    handler: Option<HandlerInstance>,
    session: Option<Session>,
    pattern: Option<String>,
    path_vars: HashMap<String, String>,
    query: Option<HashMap<String, Vec<String>>>,
    headers: Option<HeaderMap>,
}

/// One physical connection plus its typed dispatch context.
pub struct Connection {
    id: ConnectionId,
    transport: Arc<dyn Transport>,
    inner: Mutex<ConnState>,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            id: ConnectionId::new(),
            transport,
            inner: Mutex::new(ConnState {
                phase: Phase::Unopened,
                handler: None,
                session: None,
                pattern: None,
                path_vars: HashMap::new(),
                query: None,
                headers: None,
            }),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn session(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnState> {
        // A poisoned lock means a handler panicked mid-dispatch; the state is
        // still structurally sound, so keep serving teardown events.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.lock().phase = phase;
    }

    /// Bind a fresh handler instance and session. Called exactly once per
    /// connection, at pre-handshake time or at open.
    pub(crate) fn attach(&self, handler: HandlerInstance, session: Session) {
        let mut state = self.lock();
        state.handler = Some(handler);
        state.session = Some(session);
    }

    pub(crate) fn has_binding(&self) -> bool {
        self.lock().session.is_some()
    }

    pub(crate) fn take_handler(&self) -> Option<HandlerInstance> {
        self.lock().handler.take()
    }

    pub(crate) fn restore_handler(&self, handler: HandlerInstance) {
        self.lock().handler = Some(handler);
    }

    /// Tear down the dispatch context. Returns true when a session was
    /// attached, i.e. the connection had been admitted.
    pub(crate) fn detach(&self) -> bool {
        let mut state = self.lock();
        state.phase = Phase::Closed;
        state.handler = None;
        state.pattern = None;
        state.path_vars.clear();
        state.session.take().is_some()
    }

    pub(crate) fn set_pattern(&self, pattern: &str) {
        self.lock().pattern = Some(pattern.to_owned());
    }

    pub fn pattern(&self) -> Option<String> {
        self.lock().pattern.clone()
    }

    pub(crate) fn set_path_vars(&self, vars: HashMap<String, String>) {
        self.lock().path_vars = vars;
    }

    pub(crate) fn path_var(&self, name: &str) -> Option<String> {
        self.lock().path_vars.get(name).cloned()
    }

    pub(crate) fn query_cached(&self) -> bool {
        self.lock().query.is_some()
    }

    pub(crate) fn cache_query(&self, params: HashMap<String, Vec<String>>) {
        let mut state = self.lock();
        if state.query.is_none() {
            state.query = Some(params);
        }
    }

    pub(crate) fn query_values(&self, name: &str) -> Option<Vec<String>> {
        self.lock().query.as_ref().and_then(|q| q.get(name).cloned())
    }

    pub(crate) fn set_headers(&self, headers: HeaderMap) {
        self.lock().headers = Some(headers);
    }

    pub(crate) fn headers(&self) -> Option<HeaderMap> {
        self.lock().headers.clone()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
