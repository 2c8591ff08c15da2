//! Argument resolver chain.
//!
//! # Responsibilities
//! - Decide at registration time which resolver feeds each parameter slot
//! - Convert one raw event context into one typed argument at dispatch time
//!
//! # Design Decisions
//! - Fixed priority order, first match wins:
//!   session → headers → text → throwable → binary → path-param → event
//! - `supports` is a pure predicate over (parameter kind, enclosing role)
//! - Registration already proved every slot resolvable, so a dispatch-time
//!   failure is a hard error: the event is dropped and logged, never thrown
//!   into the I/O task

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::admission::UpgradeRequest;
use crate::dispatch::{Connection, EventPayload};

use super::param::{ArgValue, ParamKind, ParamSpec, ScalarType};
use super::role::Role;

/// Failure while converting an event context into a method argument.
#[derive(Debug, Error)]
pub enum BindError {
    /// A declared value could not be converted to the parameter's type.
    ///
    /// During pre-handshake this propagates to the admission pipeline and
    /// becomes a bad-request rejection; everywhere else it is logged and the
    /// event is dropped.
    #[error("cannot convert {value:?} to {expected} for parameter {param:?}")]
    TypeMismatch {
        param: String,
        expected: &'static str,
        value: String,
    },

    /// An argument slot held a value of the wrong shape.
    #[error("argument slot {index} holds {found}, expected {expected}")]
    Slot {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// The dispatched role requires an attached session and none exists.
    #[error("no session attached to connection")]
    NoSession,

    /// The raw event payload does not carry what the parameter needs.
    #[error("event payload does not carry a {0} value")]
    PayloadKind(&'static str),
}

/// The raw context of one dispatched event.
#[derive(Debug, Clone, Copy)]
pub enum RawEvent<'a> {
    /// Admission-time dispatch (before-handshake, open) with the request.
    Request(&'a UpgradeRequest),
    /// Text frame payload.
    Text(&'a str),
    /// Binary frame payload.
    Binary(&'a Bytes),
    /// Error being reported to the handler.
    Error(&'a Arc<dyn std::error::Error + Send + Sync>),
    /// Generic event payload.
    Event(&'a EventPayload),
    /// No payload (close).
    None,
}

/// Strategy converting one raw event context into one typed argument.
pub trait ArgumentResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Total, side-effect-free predicate over parameter metadata.
    fn supports(&self, param: &ParamSpec, role: Role) -> bool;

    fn resolve(
        &self,
        param: &ParamSpec,
        conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError>;
}

/// The fixed resolver chain, in priority order.
pub(crate) fn default_resolvers() -> &'static [&'static dyn ArgumentResolver] {
    static CHAIN: [&(dyn ArgumentResolver); 7] = [
        &SessionResolver,
        &HeadersResolver,
        &TextResolver,
        &ThrowableResolver,
        &BinaryResolver,
        &PathParamResolver,
        &EventResolver,
    ];
    &CHAIN
}

pub(crate) struct SessionResolver;

impl ArgumentResolver for SessionResolver {
    fn name(&self) -> &'static str {
        "session"
    }

    fn supports(&self, param: &ParamSpec, _role: Role) -> bool {
        matches!(param.kind(), ParamKind::Session)
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        conn: &Connection,
        _event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        conn.session().map(ArgValue::Session).ok_or(BindError::NoSession)
    }
}

pub(crate) struct HeadersResolver;

impl ArgumentResolver for HeadersResolver {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn supports(&self, param: &ParamSpec, _role: Role) -> bool {
        matches!(param.kind(), ParamKind::Headers)
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        if let Some(headers) = conn.headers() {
            return Ok(ArgValue::Headers(headers));
        }
        match event {
            RawEvent::Request(req) => Ok(ArgValue::Headers(req.headers().clone())),
            _ => Err(BindError::PayloadKind("headers")),
        }
    }
}

pub(crate) struct TextResolver;

impl ArgumentResolver for TextResolver {
    fn name(&self) -> &'static str {
        "text"
    }

    fn supports(&self, param: &ParamSpec, role: Role) -> bool {
        matches!(param.kind(), ParamKind::Text) && role == Role::OnMessage
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        _conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        match event {
            RawEvent::Text(text) => Ok(ArgValue::Text((*text).to_owned())),
            _ => Err(BindError::PayloadKind("text")),
        }
    }
}

pub(crate) struct ThrowableResolver;

impl ArgumentResolver for ThrowableResolver {
    fn name(&self) -> &'static str {
        "throwable"
    }

    fn supports(&self, param: &ParamSpec, role: Role) -> bool {
        matches!(param.kind(), ParamKind::Error) && role == Role::OnError
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        _conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        match event {
            RawEvent::Error(err) => Ok(ArgValue::Error(Arc::clone(err))),
            _ => Err(BindError::PayloadKind("error")),
        }
    }
}

pub(crate) struct BinaryResolver;

impl ArgumentResolver for BinaryResolver {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn supports(&self, param: &ParamSpec, role: Role) -> bool {
        matches!(param.kind(), ParamKind::Binary) && role == Role::OnBinary
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        _conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        match event {
            RawEvent::Binary(data) => Ok(ArgValue::Binary((*data).clone())),
            _ => Err(BindError::PayloadKind("binary")),
        }
    }
}

pub(crate) struct PathParamResolver;

impl PathParamResolver {
    fn convert(name: &str, raw: &str, ty: ScalarType) -> Result<ArgValue, BindError> {
        let mismatch = || BindError::TypeMismatch {
            param: name.to_owned(),
            expected: ty.as_str(),
            value: raw.to_owned(),
        };
        match ty {
            ScalarType::Str => Ok(ArgValue::Str(raw.to_owned())),
            ScalarType::I64 => raw.parse().map(ArgValue::Int).map_err(|_| mismatch()),
            ScalarType::F64 => raw.parse().map(ArgValue::Float).map_err(|_| mismatch()),
            ScalarType::Bool => raw.parse().map(ArgValue::Bool).map_err(|_| mismatch()),
        }
    }
}

impl ArgumentResolver for PathParamResolver {
    fn name(&self) -> &'static str {
        "path-param"
    }

    fn supports(&self, param: &ParamSpec, _role: Role) -> bool {
        matches!(param.kind(), ParamKind::PathParam { .. })
    }

    fn resolve(
        &self,
        param: &ParamSpec,
        conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        let ParamKind::PathParam { name, default, ty, repeated } = param.kind() else {
            return Err(BindError::PayloadKind("path-param"));
        };

        // Query parameters are decoded once per connection and cached.
        if !conn.query_cached() {
            if let RawEvent::Request(req) = event {
                conn.cache_query(req.query_params());
            }
        }

        // Template variables extracted by the path matcher take priority.
        let values: Option<Vec<String>> = match conn.path_var(name) {
            Some(v) => Some(vec![v]),
            None => conn.query_values(name),
        };

        match values {
            None => match default {
                Some(fallback) => {
                    if *repeated {
                        Ok(ArgValue::StrList(vec![fallback.clone()]))
                    } else {
                        Self::convert(name, fallback, *ty)
                    }
                }
                None => Ok(ArgValue::None),
            },
            Some(values) if *repeated => Ok(ArgValue::StrList(values)),
            Some(values) => match values.first() {
                Some(first) => Self::convert(name, first, *ty),
                None => Ok(ArgValue::None),
            },
        }
    }
}

pub(crate) struct EventResolver;

impl ArgumentResolver for EventResolver {
    fn name(&self) -> &'static str {
        "event"
    }

    fn supports(&self, param: &ParamSpec, role: Role) -> bool {
        matches!(param.kind(), ParamKind::Event) && role == Role::OnEvent
    }

    fn resolve(
        &self,
        _param: &ParamSpec,
        _conn: &Connection,
        event: &RawEvent<'_>,
    ) -> Result<ArgValue, BindError> {
        match event {
            RawEvent::Event(payload) => Ok(ArgValue::Event((*payload).clone())),
            RawEvent::None => Ok(ArgValue::None),
            _ => Err(BindError::PayloadKind("event")),
        }
    }
}
