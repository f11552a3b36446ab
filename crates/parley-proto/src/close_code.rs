//! Close codes with protocol meaning.
//!
//! The server picks the code; the client only classifies it. Anything not
//! listed here is a transient failure and is retried with backoff.

/// Normal closure. The peer is done with this connection.
pub const NORMAL: u16 = 1000;

/// Close frame carried no status code (reserved, never sent on the wire).
pub const NO_STATUS: u16 = 1005;

/// Connection dropped without a close frame (reserved, never sent on the wire).
pub const ABNORMAL: u16 = 1006;

/// Local liveness check gave up waiting for `pong` frames.
pub const LIVENESS_TIMEOUT: u16 = 4000;

/// Credential rejected by the server.
pub const AUTH_FAILED: u16 = 4003;

/// How the client must react to a close code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// Orderly shutdown, do not reconnect
    Normal,
    /// Authorization failure, do not reconnect
    AuthFailed,
    /// Anything else, reconnect per backoff policy
    Transient,
}

impl CloseKind {
    /// Classify a close code.
    pub fn classify(code: u16) -> Self {
        match code {
            NORMAL => Self::Normal,
            AUTH_FAILED => Self::AuthFailed,
            _ => Self::Transient,
        }
    }
}
