//! Per-connection state and event dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! admission (gate accepted, pattern known)
//!     → connection.rs (typed per-connection context)
//!     → router.rs (path → descriptor lookup, argument resolution)
//!     → bound handler method invoked
//!
//! frame / error / idle events
//!     → router.rs dispatch (exception-isolated)
//! ```
//!
//! # Design Decisions
//! - The path→descriptor table is frozen at build time; the hot path takes
//!   no locks on it
//! - Events for one connection are dispatched strictly in order by the
//!   hosting layer; the router never runs two calls for one connection
//!   concurrently
//! - A failing handler invocation is logged and dropped, never rethrown into
//!   the I/O task

pub mod connection;
pub mod event;
pub mod router;
pub mod session;

pub use connection::{Connection, ConnectionId, Phase, Transport, TransportError};
pub use event::EventPayload;
pub use router::{EventRouter, EventRouterBuilder};
pub use session::{Session, SUBPROTOCOLS_ATTR};
