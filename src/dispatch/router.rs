//! Per-listener event routing.
//!
//! # Responsibilities
//! - Own the path→descriptor table for one listener
//! - Bind a handler instance and session to each admitted connection
//! - Dispatch every raw event to the bound method with resolved arguments
//! - Isolate handler failures from the I/O layer
//!
//! # Design Decisions
//! - The table is frozen by `build()`; dispatch takes no locks on it
//! - A listener serving a single pattern skips the stored-pattern lookup
//! - Pre-handshake type mismatches propagate to admission (bad request);
//!   every other user failure is logged and dropped

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::admission::UpgradeRequest;
use crate::endpoint::{
    BindError, HandlerDescriptor, HandlerSpec, RawEvent, RegistrationError, Role,
};
use crate::routing::{ExactPathMatcher, PathMatcher, TemplatePathMatcher};

use super::connection::{Connection, Phase};
use super::event::EventPayload;
use super::session::Session;

/// Collects endpoint registrations for one listener, then freezes them.
pub struct EventRouterBuilder {
    host: Option<String>,
    mappings: HashMap<String, Arc<HandlerDescriptor>>,
    matchers: Vec<Arc<dyn PathMatcher>>,
}

impl EventRouterBuilder {
    pub fn new() -> Self {
        Self {
            host: None,
            mappings: HashMap::new(),
            matchers: Vec::new(),
        }
    }

    /// Configure the bind host admission checks requests against.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Register one endpoint path. Builds the handler descriptor and picks
    /// the matcher policy: templated when the pattern declares variables or
    /// the open method binds a named path parameter, exact otherwise.
    pub fn register(&mut self, path: &str, spec: &HandlerSpec) -> Result<(), RegistrationError> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(RegistrationError::InvalidPath(path.to_owned()));
        }
        if self.mappings.contains_key(path) {
            return Err(RegistrationError::DuplicatePath(path.to_owned()));
        }

        let descriptor = Arc::new(HandlerDescriptor::build(spec)?);

        let templated = path.contains('{')
            || path.split('/').any(|s| s == "*")
            || descriptor
                .binding(Role::OnOpen)
                .is_some_and(|b| b.binds_path_param());
        if templated {
            self.matchers.push(Arc::new(TemplatePathMatcher::new(path)));
        } else {
            self.matchers.push(Arc::new(ExactPathMatcher::new(path)));
        }

        self.mappings.insert(path.to_owned(), descriptor);
        Ok(())
    }

    pub fn build(self) -> EventRouter {
        EventRouter {
            host: self.host,
            mappings: self.mappings,
            matchers: self.matchers,
            online: AtomicU64::new(0),
        }
    }
}

impl Default for EventRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Routes raw connection events to bound handler methods for one listener.
pub struct EventRouter {
    host: Option<String>,
    mappings: HashMap<String, Arc<HandlerDescriptor>>,
    matchers: Vec<Arc<dyn PathMatcher>>,
    online: AtomicU64,
}

impl EventRouter {
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Registered matchers, in registration order.
    pub fn matchers(&self) -> &[Arc<dyn PathMatcher>] {
        &self.matchers
    }

    pub fn pattern_count(&self) -> usize {
        self.mappings.len()
    }

    /// Connections currently in the open state.
    pub fn online(&self) -> u64 {
        self.online.load(Ordering::SeqCst)
    }

    pub fn has_before_handshake(&self, conn: &Connection, pattern: &str) -> bool {
        self.select(conn, Some(pattern))
            .is_some_and(|d| d.has_role(Role::BeforeHandshake))
    }

    /// Instantiate the handler, attach it and a fresh session, and run the
    /// pre-handshake hook. A type mismatch while binding hook arguments is
    /// returned to the caller so admission can answer with a bad request.
    pub fn do_before_handshake(
        &self,
        conn: &Connection,
        req: &UpgradeRequest,
        pattern: &str,
    ) -> Result<(), BindError> {
        let Some(descriptor) = self.select(conn, Some(pattern)) else {
            tracing::error!(connection = %conn.id(), pattern, "no descriptor for admitted pattern");
            return Ok(());
        };
        let descriptor = Arc::clone(descriptor);

        conn.attach(descriptor.instantiate(), Session::new(Arc::clone(conn.transport())));
        conn.set_phase(Phase::Admitted);

        self.run_binding(conn, &descriptor, Role::BeforeHandshake, &RawEvent::Request(req))
    }

    /// Dispatch the open event. Attaches handler and session first when no
    /// pre-handshake hook ran. Handler failures are logged, never rethrown;
    /// the connection stays open unless the handler closed it itself.
    pub fn do_on_open(&self, conn: &Connection, req: &UpgradeRequest, pattern: &str) {
        if conn.phase() == Phase::Closed {
            return;
        }
        let Some(descriptor) = self.select(conn, Some(pattern)) else {
            tracing::error!(connection = %conn.id(), pattern, "no descriptor for admitted pattern");
            return;
        };
        let descriptor = Arc::clone(descriptor);

        if !conn.has_binding() {
            conn.attach(descriptor.instantiate(), Session::new(Arc::clone(conn.transport())));
        }
        conn.set_phase(Phase::Open);
        self.online.fetch_add(1, Ordering::SeqCst);

        self.dispatch(conn, &descriptor, Role::OnOpen, RawEvent::Request(req));
    }

    /// Dispatch the terminal close event and tear down the connection
    /// context. No-op for a connection that was never admitted; idempotent.
    pub fn do_on_close(&self, conn: &Connection) {
        if conn.phase() == Phase::Closed {
            return;
        }
        let was_open = conn.phase() == Phase::Open;

        if let Some(descriptor) = self.select(conn, None) {
            let descriptor = Arc::clone(descriptor);
            if conn.has_binding() {
                self.dispatch(conn, &descriptor, Role::OnClose, RawEvent::None);
            }
        }

        let was_admitted = conn.detach();
        if was_open && was_admitted {
            self.online.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Dispatch an error to the handler. Requires an attached session; a
    /// connection that never got admitted ignores errors.
    pub fn do_on_error(&self, conn: &Connection, error: &Arc<dyn std::error::Error + Send + Sync>) {
        if conn.phase() == Phase::Closed || !conn.has_binding() {
            return;
        }
        let Some(descriptor) = self.select(conn, None) else { return };
        let descriptor = Arc::clone(descriptor);
        self.dispatch(conn, &descriptor, Role::OnError, RawEvent::Error(error));
    }

    /// Dispatch a text frame.
    pub fn do_on_message(&self, conn: &Connection, text: &str) {
        if conn.phase() == Phase::Closed {
            return;
        }
        let Some(descriptor) = self.select(conn, None) else { return };
        let descriptor = Arc::clone(descriptor);
        self.dispatch(conn, &descriptor, Role::OnMessage, RawEvent::Text(text));
    }

    /// Dispatch a binary frame.
    pub fn do_on_binary(&self, conn: &Connection, data: &Bytes) {
        if conn.phase() == Phase::Closed {
            return;
        }
        let Some(descriptor) = self.select(conn, None) else { return };
        let descriptor = Arc::clone(descriptor);
        self.dispatch(conn, &descriptor, Role::OnBinary, RawEvent::Binary(data));
    }

    /// Dispatch a generic event. Requires an attached session.
    pub fn do_on_event(&self, conn: &Connection, event: &EventPayload) {
        if conn.phase() == Phase::Closed || !conn.has_binding() {
            return;
        }
        let Some(descriptor) = self.select(conn, None) else { return };
        let descriptor = Arc::clone(descriptor);
        self.dispatch(conn, &descriptor, Role::OnEvent, RawEvent::Event(event));
    }

    /// Descriptor selection. A single-pattern listener takes the fast path
    /// that ignores the stored pattern entirely; the table is frozen before
    /// traffic starts, which that shortcut depends on.
    fn select(&self, conn: &Connection, pattern: Option<&str>) -> Option<&Arc<HandlerDescriptor>> {
        if let Some(pattern) = pattern {
            conn.set_pattern(pattern);
        }
        if self.mappings.len() == 1 {
            return self.mappings.values().next();
        }
        match pattern {
            Some(p) => self.mappings.get(p),
            None => {
                let stored = conn.pattern()?;
                self.mappings.get(&stored)
            }
        }
    }

    fn dispatch(
        &self,
        conn: &Connection,
        descriptor: &HandlerDescriptor,
        role: Role,
        event: RawEvent<'_>,
    ) {
        if let Err(err) = self.run_binding(conn, descriptor, role, &event) {
            tracing::error!(
                connection = %conn.id(),
                role = %role,
                handler = descriptor.type_name(),
                error = %err,
                "argument resolution failed; event dropped"
            );
        }
    }

    fn run_binding(
        &self,
        conn: &Connection,
        descriptor: &HandlerDescriptor,
        role: Role,
        event: &RawEvent<'_>,
    ) -> Result<(), BindError> {
        let Some(binding) = descriptor.binding(role) else {
            return Ok(());
        };
        let args = binding.resolve_args(conn, event)?;

        // Taking the instance out keeps a second dispatch from running the
        // handler concurrently; events for one connection are ordered anyway.
        let Some(mut handler) = conn.take_handler() else {
            tracing::warn!(connection = %conn.id(), role = %role, "no handler instance attached; event dropped");
            return Ok(());
        };
        let result = binding.invoke(handler.as_mut(), &args);
        conn.restore_handler(handler);

        if let Err(err) = result {
            tracing::error!(
                connection = %conn.id(),
                role = %role,
                handler = descriptor.type_name(),
                error = %err,
                "handler invocation failed; event dropped"
            );
        }
        Ok(())
    }
}
