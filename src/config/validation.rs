//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, frame limits, pool sizes)
//! - Detect listeners that would bind the same host/port twice
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn error(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError { field: field.into(), message: message.into() }
}

/// Validate a parsed configuration. Collects every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut binds = HashSet::new();

    for (i, endpoint) in config.endpoints.iter().enumerate() {
        let field = |name: &str| format!("endpoints[{i}].{name}");

        if endpoint.port == 0 {
            errors.push(error(field("port"), "port must be non-zero"));
        }
        if endpoint.host.trim().is_empty() {
            errors.push(error(field("host"), "host must not be empty"));
        }
        if endpoint.max_frame_payload == 0 {
            errors.push(error(field("max_frame_payload"), "frame payload limit must be positive"));
        }
        if endpoint.use_worker_pool && endpoint.worker_pool_threads == 0 {
            errors.push(error(
                field("worker_pool_threads"),
                "worker pool is enabled but sized to zero threads",
            ));
        }
        if let Some(tls) = &endpoint.tls {
            if tls.cert_path.trim().is_empty() {
                errors.push(error(field("tls.cert_path"), "certificate path must not be empty"));
            }
            if tls.key_path.trim().is_empty() {
                errors.push(error(field("tls.key_path"), "key path must not be empty"));
            }
        }
        if !binds.insert(endpoint.bind_key()) {
            errors.push(error(
                field("port"),
                format!("{}:{} is declared more than once", endpoint.host, endpoint.port),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
