//! Rejection responses.
//!
//! # Responsibilities
//! - Map admission failures to protocol-appropriate status codes
//! - Carry the status text as body when no richer body was set

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// A status-only admission rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    status: StatusCode,
    body: Option<String>,
}

impl Rejection {
    pub fn new(status: StatusCode) -> Self {
        Self { status, body: None }
    }

    /// Malformed request.
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// Wrong method, host mismatch, or missing upgrade headers.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN)
    }

    /// No registered endpoint matched the request path.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// Unexpected internal failure during admission.
    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response body: the explicit one if set, else the status line text.
    pub fn body_text(&self) -> String {
        match &self.body {
            Some(body) => body.clone(),
            None => format!(
                "{} {}",
                self.status.as_u16(),
                self.status.canonical_reason().unwrap_or("")
            ),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = self.body_text();
        (self.status, body).into_response()
    }
}
