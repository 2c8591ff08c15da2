//! Endpoint path matching.
//!
//! # Responsibilities
//! - Decide whether a request path belongs to a registered endpoint
//! - Extract named template variables onto the connection on success
//!
//! # Design Decisions
//! - Exact matching is used unless the endpoint needs template variables
//! - Matching is case-sensitive and segment-based; no regex on the hot path
//! - Lookup across matchers is first-match-wins in registration order

use std::collections::HashMap;

use crate::dispatch::Connection;

/// Decides whether a request path belongs to one registered endpoint.
pub trait PathMatcher: Send + Sync {
    /// The registered pattern this matcher answers for.
    fn pattern(&self) -> &str;

    /// Returns true on a match. A successful templated match additionally
    /// stores the extracted variables on the connection for resolver use.
    fn match_and_extract(&self, path: &str, conn: &Connection) -> bool;
}

/// Byte-for-byte equality against a static path.
#[derive(Debug, Clone)]
pub struct ExactPathMatcher {
    pattern: String,
}

impl ExactPathMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self { pattern: pattern.into() }
    }
}

impl PathMatcher for ExactPathMatcher {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn match_and_extract(&self, path: &str, _conn: &Connection) -> bool {
        self.pattern == path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(String),
    Wildcard,
}

/// Segment-wise matching with `{name}` variables and `*` wildcards.
///
/// `/chat/{room}` matches `/chat/42` and stores `room=42` on the connection.
#[derive(Debug, Clone)]
pub struct TemplatePathMatcher {
    pattern: String,
    segments: Vec<Segment>,
}

impl TemplatePathMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                if s == "*" {
                    Segment::Wildcard
                } else if let Some(name) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Segment::Var(name.to_owned())
                } else {
                    Segment::Literal(s.to_owned())
                }
            })
            .collect();
        Self { pattern, segments }
    }
}

impl PathMatcher for TemplatePathMatcher {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn match_and_extract(&self, path: &str, conn: &Connection) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return false;
        }

        let mut vars = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(lit) => {
                    if lit != part {
                        return false;
                    }
                }
                Segment::Var(name) => {
                    vars.insert(name.clone(), (*part).to_owned());
                }
                Segment::Wildcard => {}
            }
        }

        if !vars.is_empty() {
            conn.set_path_vars(vars);
        }
        true
    }
}
