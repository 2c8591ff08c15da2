//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (at startup):
//!     endpoint path
//!     → templated? (pattern has variables, or open binds a path param)
//!     → ExactPathMatcher | TemplatePathMatcher
//!     → frozen into the listener's ordered matcher list
//!
//! Admission:
//!     request path → first matcher that accepts wins → pattern
//! ```
//!
//! # Design Decisions
//! - Matcher list is ordered by registration; same input always resolves to
//!   the same pattern
//! - A request matching zero patterns is a not-found rejection

pub mod matcher;

pub use matcher::{ExactPathMatcher, PathMatcher, TemplatePathMatcher};
