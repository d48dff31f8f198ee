//! Failure taxonomy for the three external calls: connect, discover, invoke.
//!
//! Each call returns its own error type so callers branch on the variant
//! instead of matching message text.

use std::time::Duration;

use thiserror::Error;

/// Opening a session failed. Fatal for the top-level operation.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("timed out after {}s waiting for {endpoint}", timeout.as_secs())]
    Timeout { endpoint: String, timeout: Duration },

    #[error("could not establish MCP session with {endpoint}: {cause}")]
    Handshake { endpoint: String, cause: String },
}

/// Listing capabilities failed. Never fatal; the registry keeps what it had.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("session is not ready")]
    NotReady,

    #[error("failed to list tools: {0}")]
    Request(String),

    #[error("failed to decode tool list: {0}")]
    Decode(String),
}

/// Discriminant of [`InvocationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationErrorKind {
    MalformedArguments,
    ExecutionFailed,
}

/// A single dispatch failed. The session is left as it was.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The argument payload was not a single JSON object. Carries the parse
    /// error text, which is shown to the user verbatim.
    #[error("{0}")]
    MalformedArguments(String),

    /// Transport failure or a provider-side rejection.
    #[error("{0}")]
    ExecutionFailed(String),
}

impl InvocationError {
    pub fn kind(&self) -> InvocationErrorKind {
        match self {
            InvocationError::MalformedArguments(_) => InvocationErrorKind::MalformedArguments,
            InvocationError::ExecutionFailed(_) => InvocationErrorKind::ExecutionFailed,
        }
    }
}
