//! Error types for the connection core.
//!
//! Connection errors describe why a session ended up in a terminal state.
//! Send errors are returned synchronously to the caller, who is expected to
//! roll back any optimistic UI state.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Reasons a connection reached a terminal state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Transport could not be constructed at all
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Server closed with the authorization-failure code
    #[error("credential rejected by server")]
    Unauthorized,

    /// Reconnect budget used up without a successful open
    #[error("gave up after {attempts} reconnect attempts")]
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
    },
}

impl ConnectionError {
    /// Returns true if refreshing the credential is the remedy.
    pub fn needs_reauthentication(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors from send operations. Nothing was transmitted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Sends are only permitted while connected
    #[error("cannot send while {state}")]
    NotConnected {
        /// State at the time of the call
        state: ConnectionState,
    },

    /// Message text was empty or whitespace
    #[error("message is empty")]
    EmptyMessage,

    /// Socket went away before the frame could be handed over
    #[error("link closed")]
    LinkClosed,
}
