//! Parameter declarations and resolved argument values.
//!
//! A handler method declares its parameters as [`ParamSpec`]s at registration
//! time. Dispatch fills one [`ArgValue`] per declared slot; the [`Args`] view
//! hands them back to the invoke body with the expected type.

use std::sync::Arc;

use axum::http::HeaderMap;
use bytes::Bytes;

use crate::dispatch::{EventPayload, Session};

use super::resolver::BindError;

/// Target type of a named path/query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Str,
    I64,
    F64,
    Bool,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Str => "string",
            ScalarType::I64 => "i64",
            ScalarType::F64 => "f64",
            ScalarType::Bool => "bool",
        }
    }
}

/// What a declared parameter binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// The per-connection [`Session`] façade.
    Session,
    /// The upgrade request headers.
    Headers,
    /// The text payload of the current frame.
    Text,
    /// The binary payload of the current frame.
    Binary,
    /// The error that triggered an on-error dispatch.
    Error,
    /// A named path/query parameter, optionally with a declared default.
    PathParam {
        name: String,
        default: Option<String>,
        ty: ScalarType,
        repeated: bool,
    },
    /// The generic event payload of an on-event dispatch.
    Event,
}

/// Declaration of one method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    kind: ParamKind,
}

impl ParamSpec {
    pub fn session() -> Self {
        Self { kind: ParamKind::Session }
    }

    pub fn headers() -> Self {
        Self { kind: ParamKind::Headers }
    }

    pub fn text() -> Self {
        Self { kind: ParamKind::Text }
    }

    pub fn binary() -> Self {
        Self { kind: ParamKind::Binary }
    }

    pub fn error() -> Self {
        Self { kind: ParamKind::Error }
    }

    pub fn event() -> Self {
        Self { kind: ParamKind::Event }
    }

    /// A scalar string parameter bound to the named path/query value.
    pub fn path_param(name: impl Into<String>) -> Self {
        Self {
            kind: ParamKind::PathParam {
                name: name.into(),
                default: None,
                ty: ScalarType::Str,
                repeated: false,
            },
        }
    }

    /// Declare a fallback used when the named parameter is absent.
    ///
    /// Only meaningful on path parameters; ignored for other kinds.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        if let ParamKind::PathParam { default, .. } = &mut self.kind {
            *default = Some(value.into());
        }
        self
    }

    /// Narrow the target type of a path parameter. The resolver converts the
    /// raw value and reports a type mismatch if conversion fails.
    pub fn typed(mut self, scalar: ScalarType) -> Self {
        if let ParamKind::PathParam { ty, .. } = &mut self.kind {
            *ty = scalar;
        }
        self
    }

    /// Receive every value for a repeated key instead of the first one.
    pub fn repeated(mut self) -> Self {
        if let ParamKind::PathParam { ty, repeated, .. } = &mut self.kind {
            *ty = ScalarType::Str;
            *repeated = true;
        }
        self
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// The structural type of the parameter, as used for override comparison.
    ///
    /// Named path parameters collapse to their converted type: a plain text
    /// parameter and a string path parameter are structurally identical.
    pub(crate) fn sig_type(&self) -> SigType {
        match &self.kind {
            ParamKind::Session => SigType::Session,
            ParamKind::Headers => SigType::Headers,
            ParamKind::Text => SigType::Str,
            ParamKind::Binary => SigType::Bytes,
            ParamKind::Error => SigType::Error,
            ParamKind::Event => SigType::Event,
            ParamKind::PathParam { ty, repeated, .. } => {
                if *repeated {
                    SigType::StrList
                } else {
                    match ty {
                        ScalarType::Str => SigType::Str,
                        ScalarType::I64 => SigType::I64,
                        ScalarType::F64 => SigType::F64,
                        ScalarType::Bool => SigType::Bool,
                    }
                }
            }
        }
    }
}

/// Structural parameter type used when comparing method signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SigType {
    Session,
    Headers,
    Bytes,
    Error,
    Event,
    Str,
    StrList,
    I64,
    F64,
    Bool,
}

/// One resolved argument, ready to hand to the invoke body.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Session(Session),
    Headers(HeaderMap),
    Text(String),
    Binary(Bytes),
    Error(Arc<dyn std::error::Error + Send + Sync>),
    Str(String),
    StrList(Vec<String>),
    Int(i64),
    Float(f64),
    Bool(bool),
    Event(EventPayload),
    /// Absence marker for a path parameter with no value and no default.
    None,
}

impl ArgValue {
    fn expected(&self) -> &'static str {
        match self {
            ArgValue::Session(_) => "session",
            ArgValue::Headers(_) => "headers",
            ArgValue::Text(_) => "text",
            ArgValue::Binary(_) => "binary",
            ArgValue::Error(_) => "error",
            ArgValue::Str(_) => "string",
            ArgValue::StrList(_) => "string list",
            ArgValue::Int(_) => "i64",
            ArgValue::Float(_) => "f64",
            ArgValue::Bool(_) => "bool",
            ArgValue::Event(_) => "event",
            ArgValue::None => "none",
        }
    }
}

/// Positional view over the resolved arguments of one dispatch.
#[derive(Debug)]
pub struct Args(pub(crate) Vec<ArgValue>);

impl Args {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn slot(&self, index: usize, expected: &'static str) -> Result<&ArgValue, BindError> {
        self.0.get(index).ok_or(BindError::Slot { index, expected, found: "nothing" })
    }

    fn mismatch(&self, index: usize, expected: &'static str) -> BindError {
        let found = self.0.get(index).map(ArgValue::expected).unwrap_or("nothing");
        BindError::Slot { index, expected, found }
    }

    pub fn session(&self, index: usize) -> Result<Session, BindError> {
        match self.slot(index, "session")? {
            ArgValue::Session(s) => Ok(s.clone()),
            _ => Err(self.mismatch(index, "session")),
        }
    }

    pub fn headers(&self, index: usize) -> Result<&HeaderMap, BindError> {
        match self.slot(index, "headers")? {
            ArgValue::Headers(h) => Ok(h),
            _ => Err(self.mismatch(index, "headers")),
        }
    }

    pub fn text(&self, index: usize) -> Result<&str, BindError> {
        match self.slot(index, "text")? {
            ArgValue::Text(t) => Ok(t),
            _ => Err(self.mismatch(index, "text")),
        }
    }

    pub fn binary(&self, index: usize) -> Result<&Bytes, BindError> {
        match self.slot(index, "binary")? {
            ArgValue::Binary(b) => Ok(b),
            _ => Err(self.mismatch(index, "binary")),
        }
    }

    pub fn error(&self, index: usize) -> Result<&Arc<dyn std::error::Error + Send + Sync>, BindError> {
        match self.slot(index, "error")? {
            ArgValue::Error(e) => Ok(e),
            _ => Err(self.mismatch(index, "error")),
        }
    }

    /// A scalar string path parameter; `None` when absent with no default.
    pub fn str_opt(&self, index: usize) -> Result<Option<&str>, BindError> {
        match self.slot(index, "string")? {
            ArgValue::Str(s) => Ok(Some(s)),
            ArgValue::None => Ok(None),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    pub fn str_list(&self, index: usize) -> Result<Vec<String>, BindError> {
        match self.slot(index, "string list")? {
            ArgValue::StrList(v) => Ok(v.clone()),
            ArgValue::Str(s) => Ok(vec![s.clone()]),
            ArgValue::None => Ok(Vec::new()),
            _ => Err(self.mismatch(index, "string list")),
        }
    }

    pub fn int_opt(&self, index: usize) -> Result<Option<i64>, BindError> {
        match self.slot(index, "i64")? {
            ArgValue::Int(v) => Ok(Some(*v)),
            ArgValue::None => Ok(None),
            _ => Err(self.mismatch(index, "i64")),
        }
    }

    pub fn float_opt(&self, index: usize) -> Result<Option<f64>, BindError> {
        match self.slot(index, "f64")? {
            ArgValue::Float(v) => Ok(Some(*v)),
            ArgValue::None => Ok(None),
            _ => Err(self.mismatch(index, "f64")),
        }
    }

    pub fn bool_opt(&self, index: usize) -> Result<Option<bool>, BindError> {
        match self.slot(index, "bool")? {
            ArgValue::Bool(v) => Ok(Some(*v)),
            ArgValue::None => Ok(None),
            _ => Err(self.mismatch(index, "bool")),
        }
    }

    /// The generic event payload; `None` for events dispatched without one.
    pub fn event(&self, index: usize) -> Result<Option<&EventPayload>, BindError> {
        match self.slot(index, "event")? {
            ArgValue::Event(e) => Ok(Some(e)),
            ArgValue::None => Ok(None),
            _ => Err(self.mismatch(index, "event")),
        }
    }

    pub fn raw(&self, index: usize) -> Option<&ArgValue> {
        self.0.get(index)
    }
}
