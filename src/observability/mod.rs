//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via the tracing crate; every event carries the
//!   connection ID and endpoint pattern as fields
//! - Log level configurable via environment (RUST_LOG)

pub mod logging;

pub use logging::init;
