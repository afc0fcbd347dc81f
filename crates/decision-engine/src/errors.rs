use gatekeeper_core_types::{ErrorKind, Operation};
use thiserror::Error;

/// Denial raised by the engine for the first operation that failed.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{reason}")]
pub struct Forbidden {
    pub reason: String,
    pub operation: Operation,
}

impl Forbidden {
    pub fn new(reason: impl Into<String>, operation: Operation) -> Self {
        Self {
            reason: reason.into(),
            operation,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Forbidden
    }
}
