//! Error types for the client driver.

use parley_core::{ConnectionError, SendError};
use thiserror::Error;

/// Socket errors reported by a [`crate::Connector`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The URL or request could not be built. Not retried.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection refused, DNS failure, handshake error.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Handshake did not finish in time.
    #[error("connection timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl TransportError {
    /// Returns true if a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::InvalidEndpoint(_))
    }
}

/// REST collaborator errors. Logged, never surfaced as a state change.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Request could not be sent or the response not read.
    #[error("request failed: {0}")]
    Request(String),

    /// Server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    /// Response body did not match the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Errors returned by [`crate::RoomSession`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Session reached a terminal state.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Send rejected, nothing was transmitted.
    #[error(transparent)]
    Send(#[from] SendError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_invalid_endpoint_is_permanent() {
        assert!(!TransportError::InvalidEndpoint("x".into()).is_transient());
        assert!(TransportError::Connect("refused".into()).is_transient());
        assert!(TransportError::Timeout(std::time::Duration::from_secs(1)).is_transient());
    }
}
