//! Error types for the wire codec.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding frames.
///
/// None of these are fatal to a connection. The caller logs them and drops
/// the offending frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Text is not a JSON object with a string `type` field
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame has a recognized `type` but its fields do not match
    #[error("invalid payload for {frame_type}: {reason}")]
    InvalidPayload {
        /// Wire name of the frame type
        frame_type: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Frame could not be serialized
    #[error("encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
