//! Error and diagnostic types.
//!
//! Hard errors use `thiserror`. Soft gaps never fail the pipeline: they
//! produce `Unknown` locally and are reported as [`Diagnostic`]s next to the
//! result.

use std::fmt;

use thiserror::Error;

/// A schema that cannot be normalized. Every variant names the offending
/// path (`type`, `type.field`, `type.field[]`, ...).
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{path}: invalid name `{name}`, names may only contain letters, digits and underscores and may not start with a digit")]
    InvalidName { path: String, name: String },

    #[error("{path}: type `document` is only allowed at the top level")]
    NestedDocument { path: String },

    #[error("{path}: type `span` is only allowed in the `of` list of a block")]
    SpanOutsideBlock { path: String },

    #[error("{path}: `codegen.required` is set but the field has no validation")]
    RequiredWithoutValidation { path: String },

    #[error("{path}: missing `name`")]
    MissingName { path: String },

    #[error("{path}: missing `type`")]
    MissingType { path: String },

    #[error("{path}: duplicate type name `{name}`")]
    DuplicateName { path: String, name: String },

    #[error("{path}: arrays must declare at least one member type in `of`")]
    EmptyArray { path: String },

    #[error("{path}: reference targets must name a registered type, found inline `{found}`")]
    InlineReferenceTarget { path: String, found: String },

    #[error("{path}: reference has no targets in `to`")]
    EmptyReference { path: String },

    #[error("duplicate workspace `{name}`")]
    DuplicateWorkspace { name: String },
}

impl SchemaError {
    /// The path the error points at, if it has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            SchemaError::Json(_) | SchemaError::DuplicateWorkspace { .. } => None,
            SchemaError::InvalidName { path, .. }
            | SchemaError::NestedDocument { path }
            | SchemaError::SpanOutsideBlock { path }
            | SchemaError::RequiredWithoutValidation { path }
            | SchemaError::MissingName { path }
            | SchemaError::MissingType { path }
            | SchemaError::DuplicateName { path, .. }
            | SchemaError::EmptyArray { path }
            | SchemaError::InlineReferenceTarget { path, .. }
            | SchemaError::EmptyReference { path } => Some(path),
        }
    }
}

/// A GROQ syntax error. Lines and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A query that failed to parse. Other queries of the batch are unaffected.
#[derive(Debug, Clone, Error)]
#[error("query `{key}`: {source}")]
pub struct QueryError {
    pub key: String,
    #[source]
    pub source: ParseError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("type name `{name}` is generated by both `{first}` and `{second}` with different shapes")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
}

// =============================================================================
// Diagnostics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    UnknownFunction,
    UnknownPipeFunction,
    UnsupportedConstruct,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::UnknownFunction => "unknown-function",
            DiagnosticKind::UnknownPipeFunction => "unknown-pipe-function",
            DiagnosticKind::UnsupportedConstruct => "unsupported-construct",
        };
        f.write_str(label)
    }
}

/// A soft gap: the affected sub-expression was typed as `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}
