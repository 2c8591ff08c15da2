//! Endpoint declaration and registration subsystem.
//!
//! # Data Flow
//! ```text
//! HandlerSpec (declared methods, per level)
//!     → descriptor.rs (role resolution, override handling)
//!     → resolver.rs (parameter binding plan, first-match-wins)
//!     → HandlerDescriptor (immutable capability table)
//!     → shared via Arc with the dispatch layer
//! ```
//!
//! # Design Decisions
//! - Capability tables are computed once at registration, never per connection
//! - Registration failures are fatal: a spec that does not register never serves
//! - No runtime reflection; invoke bodies are type-erased closures

pub mod descriptor;
pub mod param;
pub mod resolver;
pub mod role;

pub use descriptor::{
    HandlerDescriptor, HandlerError, HandlerInstance, HandlerLevel, HandlerResult, HandlerSpec,
    MethodBinding, MethodDecl,
};
pub use param::{ArgValue, Args, ParamKind, ParamSpec, ScalarType};
pub use resolver::{ArgumentResolver, BindError, RawEvent};
pub use role::Role;

use thiserror::Error;

/// Errors raised while building an endpoint's capability table.
///
/// Every variant is a deployment defect in the handler declaration, so all of
/// them fail startup rather than being reported per connection.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Two distinct (non-overriding) methods claim the same lifecycle role.
    #[error("duplicate {role} method: {duplicate:?} does not override {existing:?}")]
    DuplicateRole {
        role: Role,
        existing: String,
        duplicate: String,
    },

    /// A role-carrying method is not publicly invocable.
    #[error("handler method {0:?} carries a role but is not public")]
    NonPublicMethod(String),

    /// No resolver in the fixed chain accepts one of the declared parameters.
    #[error("no argument resolver matches parameter {index} of {method:?}")]
    UnresolvableParameter { method: String, index: usize },

    /// A role-carrying method was declared without an invoke body.
    #[error("handler method {0:?} carries a role but declares no invoke body")]
    MissingInvoke(String),

    /// Endpoint paths must be non-empty and start with a slash.
    #[error("invalid endpoint path {0:?}: must start with '/'")]
    InvalidPath(String),

    /// The same path was registered twice on one listener.
    #[error("path {0:?} is already registered on this listener")]
    DuplicatePath(String),
}
