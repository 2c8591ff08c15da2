//! Generic event payloads.
//!
//! The original attribute-bag design passed arbitrarily typed event objects
//! through dispatch; here the set is closed: idle notifications from the
//! transport plus a free-form custom variant for host-defined signals.

/// Payload of an on-event dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// No frame was read within the configured reader-idle window.
    ReaderIdle,
    /// No frame was written within the configured writer-idle window.
    WriterIdle,
    /// No traffic in either direction within the all-idle window.
    AllIdle,
    /// Host-defined event, identified by label.
    Custom(String),
}

impl EventPayload {
    pub fn label(&self) -> &str {
        match self {
            EventPayload::ReaderIdle => "reader-idle",
            EventPayload::WriterIdle => "writer-idle",
            EventPayload::AllIdle => "all-idle",
            EventPayload::Custom(label) => label,
        }
    }
}
