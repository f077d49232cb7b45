//! Error taxonomy shared by every component (spec §7).
//!
//! Each variant is a semantic bucket, not a type name: parse/config errors
//! are always fatal to a statement, backend/timeout/io errors are subject to
//! the `exec.error` policy (see [`crate::interpreters::invoke_with_policy`]),
//! cancellation is fatal but idempotent.

use std::fmt;

/// Stable discriminant every error reaches the statement with (spec §7: "a
/// stable `kind`").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Config,
    Backend,
    Timeout,
    ShapeMismatch,
    Io,
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "ParseError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Backend => "BackendError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::ShapeMismatch => "ShapeMismatchError",
            ErrorKind::Io => "IOError",
            ErrorKind::Cancelled => "CancelledError",
        };
        f.write_str(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error at byte {position}: {reason}")]
    Parse { position: usize, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("shape mismatch: blocks sharing id {id:?} produced sequences of length {a} and {b}")]
    ShapeMismatch { id: String, a: usize, b: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Config(_) => ErrorKind::Config,
            Error::Backend(_) => ErrorKind::Backend,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
            Error::Io(_) => ErrorKind::Io,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Error::Backend(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
}

/// A non-fatal warning chained onto a statement (spec §7:
/// `getNextWarning()`-style linked list, modeled here as a `Vec` the façade
/// appends to in order).
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: ErrorKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
