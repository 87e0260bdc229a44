#![forbid(unsafe_code)]

//! Error types shared by the observation engine.
//!
//! Structural mistakes (empty keys, bad indexes, unknown operator or
//! transformer names) are returned as [`KvoError`] to the immediate caller.
//! Domain validation is not an error: validators produce a [`Validation`]
//! value that callers inspect. Observer callbacks report failures through
//! [`ObserverError`]; those are caught at dispatch and logged.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use thiserror::Error;

use crate::value::Value;

/// Result alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, KvoError>;

/// Error returned by observer and binding callbacks.
pub type ObserverError = Box<dyn std::error::Error>;

/// Structural errors raised by the observation engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvoError {
    /// Empty key or key path, mismatched batch lengths, malformed binding
    /// strings, unknown operators or transformer names.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Single-index array operation outside `0..len` (or `0..=len` for inserts).
    #[error("index {index} out of range for array of length {len}")]
    Range { index: usize, len: usize },

    /// A configured comparison or transform did not resolve to something callable.
    #[error("type error: {message}")]
    Type { message: String },

    /// A binding with a forward-only transformer was asked to reverse a value.
    #[error("binding `{binding}` has a transformer without a reverse transformation")]
    IrreversibleTransformer { binding: String },
}

impl KvoError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type {
            message: message.into(),
        }
    }

    pub const fn range(index: usize, len: usize) -> Self {
        Self::Range { index, len }
    }
}

/// A rejected value, presentable to an end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    key: String,
    message: String,
}

impl ValidationError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of validating a proposed value.
///
/// An accepted value may differ from the proposal (validators can coerce).
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    Accepted(Value),
    Rejected(ValidationError),
}

impl Validation {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The accepted value, if any.
    #[must_use]
    pub fn accepted(&self) -> Option<&Value> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&ValidationError> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(err) => Some(err),
        }
    }
}

/// Why an isolated callback did not complete.
#[derive(Debug)]
pub enum CallbackFailure {
    Failed(ObserverError),
    Panicked(String),
}

impl fmt::Display for CallbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "{err}"),
            Self::Panicked(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// Run an observer callback so that neither its error nor its panic escapes.
///
/// Delivery loops call this per observer; a failure is reported to the
/// caller for logging and the loop moves on to the next observer.
pub fn call_isolated<F>(callback: F) -> std::result::Result<(), CallbackFailure>
where
    F: FnOnce() -> std::result::Result<(), ObserverError>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(CallbackFailure::Failed(err)),
        Err(payload) => Err(CallbackFailure::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
