//! Session façade handed to handler code.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use super::connection::{Transport, TransportError};

/// Attribute a pre-handshake hook sets to request sub-protocol negotiation.
pub const SUBPROTOCOLS_ATTR: &str = "subprotocols";

type AttrValue = Arc<dyn Any + Send + Sync>;

/// Thin, clonable façade over one live connection.
///
/// Created exactly once per connection when it is admitted and detached when
/// it closes; handler code uses it to send frames, close, and keep named
/// connection-scoped attributes.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    attrs: Arc<DashMap<String, AttrValue>>,
}

impl Session {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            attrs: Arc::new(DashMap::new()),
        }
    }

    pub fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.transport.send_text(text)
    }

    pub fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), TransportError> {
        self.transport.send_binary(data.into())
    }

    pub fn close(&self) {
        self.transport.close();
    }

    pub fn is_active(&self) -> bool {
        self.transport.is_active()
    }

    pub fn set_attr<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.attrs.insert(name.into(), Arc::new(value));
    }

    /// Typed attribute lookup; `None` when absent or of another type.
    pub fn attr<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.attrs.get(name)?.clone();
        value.downcast::<T>().ok()
    }

    pub fn remove_attr(&self, name: &str) {
        self.attrs.remove(name);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("attrs", &self.attrs.len())
            .finish()
    }
}
