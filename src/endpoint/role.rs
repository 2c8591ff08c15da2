//! Lifecycle roles a handler method may implement.

use std::fmt;

/// A named point in the connection lifecycle.
///
/// Each endpoint binds at most one method per role; a role with no bound
/// method is simply absent and dispatch for it is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Runs during admission, before the upgrade handshake completes.
    BeforeHandshake,
    /// Connection admitted and handshake finished.
    OnOpen,
    /// Terminal event for a connection.
    OnClose,
    /// Text frame received.
    OnMessage,
    /// Binary frame received.
    OnBinary,
    /// Transport or dispatch error surfaced to the handler.
    OnError,
    /// Generic event (idle timeouts, custom notifications).
    OnEvent,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::BeforeHandshake,
        Role::OnOpen,
        Role::OnClose,
        Role::OnMessage,
        Role::OnBinary,
        Role::OnError,
        Role::OnEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::BeforeHandshake => "before-handshake",
            Role::OnOpen => "on-open",
            Role::OnClose => "on-close",
            Role::OnMessage => "on-message",
            Role::OnBinary => "on-binary",
            Role::OnError => "on-error",
            Role::OnEvent => "on-event",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
