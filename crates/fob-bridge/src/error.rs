//! Bridge contract violations.
//!
//! These are caller bugs, not build failures. Build failures travel as
//! diagnostics inside results and never show up here.

use thiserror::Error;

use crate::handle::Namespace;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Handle was never issued, or has been released.
    #[error("invalid {namespace} handle {handle:#x}")]
    InvalidHandle { namespace: Namespace, handle: u64 },

    /// Handle belongs to a different kind of object.
    #[error("handle {handle:#x} belongs to {found}, expected {expected}")]
    WrongNamespace {
        expected: Namespace,
        found: Namespace,
        handle: u64,
    },

    #[error("{0} callback must not be null")]
    NullCallback(&'static str),

    #[error("{0} pointer is null with a non-zero length")]
    NullPointer(&'static str),

    /// Foreign text that is not valid UTF-8.
    #[error("{what} is not valid UTF-8 (first bad byte at offset {offset})")]
    InvalidUtf8 { what: &'static str, offset: usize },

    #[error("invalid bridge configuration: {0}")]
    Config(String),

    #[error("failed to start bridge runtime: {0}")]
    Runtime(String),
}

impl From<figment::Error> for BridgeError {
    fn from(err: figment::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
