//! Hosting layer: listeners, transports, and endpoint registration.
//!
//! # Data Flow
//! ```text
//! EndpointRegistry (register paths under listener settings)
//!     → build() → ListenerGroup per bind address
//!     → listener.rs serves each group with Axum
//!     → transport.rs bridges handler sends back to the socket
//! ```

pub mod listener;
pub mod registry;
pub mod transport;

pub use listener::serve;
pub use registry::{EndpointRegistry, ListenerGroup};
pub use transport::{ChannelTransport, OutFrame};
