//! Connection-oriented WebSocket endpoint dispatch.
//!
//! Register handler types against URL paths, declare which lifecycle events
//! each method consumes and which arguments it wants, and the server takes
//! care of admission, handshake, per-connection state, and event dispatch.

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod observability;
pub mod routing;
pub mod server;

pub use config::{EndpointConfig, ServerConfig};
pub use dispatch::{Connection, EventPayload, EventRouter, EventRouterBuilder, Session};
pub use endpoint::{HandlerSpec, MethodDecl, ParamSpec, Role, ScalarType};
pub use server::{EndpointRegistry, ListenerGroup};
