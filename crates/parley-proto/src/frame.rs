//! Frame envelope and codec.
//!
//! Frames are internally tagged JSON objects. Decoding happens in two steps:
//! the `type` tag is read first so that unknown types can be skipped without
//! touching the rest of the object, then the full frame is parsed.
//!
//! # Invariants
//!
//! - Every [`WireFrame`] variant maps to exactly one [`FrameType`].
//! - An unrecognized `type` never produces an error.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::{
    Message, UserId,
    errors::{ProtocolError, Result},
};

/// Recognized frame types, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// `chat_message`
    ChatMessage,
    /// `typing`
    Typing,
    /// `ping`
    Ping,
    /// `pong`
    Pong,
    /// `chat_history`
    ChatHistory,
}

impl FrameType {
    /// Wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::Typing => "typing",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::ChatHistory => "chat_history",
        }
    }

    /// Look up a wire name. `None` for types this client does not know.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "chat_message" => Some(Self::ChatMessage),
            "typing" => Some(Self::Typing),
            "ping" => Some(Self::Ping),
            "pong" => Some(Self::Pong),
            "chat_history" => Some(Self::ChatHistory),
            _ => None,
        }
    }
}

/// Body of a `chat_message` frame.
///
/// Outbound frames carry the raw text; the server answers with the stored
/// message object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatBody {
    /// Stored message pushed by the server
    Delivered(Message),
    /// Text typed by the local user
    Text(String),
}

/// A single frame on the room socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireFrame {
    /// A chat message, outbound text or inbound stored message
    ChatMessage {
        /// Message body
        message: ChatBody,
    },

    /// Someone is typing
    Typing {
        /// Who is typing. Absent on outbound frames.
        #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
        sender_id: Option<UserId>,
    },

    /// Keep-alive request
    Ping,

    /// Keep-alive response
    Pong,

    /// Backlog of messages for the room
    ChatHistory {
        /// Messages in display order
        messages: Vec<Message>,
    },
}

/// Just enough of a frame to read its tag.
#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(rename = "type", borrow)]
    kind: Cow<'a, str>,
}

impl WireFrame {
    /// Outbound chat message.
    pub fn chat_message(text: impl Into<String>) -> Self {
        Self::ChatMessage { message: ChatBody::Text(text.into()) }
    }

    /// Outbound typing notification.
    pub fn typing() -> Self {
        Self::Typing { sender_id: None }
    }

    /// Type tag of this frame.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Self::ChatMessage { .. } => FrameType::ChatMessage,
            Self::Typing { .. } => FrameType::Typing,
            Self::Ping => FrameType::Ping,
            Self::Pong => FrameType::Pong,
            Self::ChatHistory { .. } => FrameType::ChatHistory,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Parse a JSON text frame.
    ///
    /// Returns `Ok(None)` for frames whose `type` is not recognized.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Malformed` if the text is not an object with a string
    ///   `type` field
    /// - `ProtocolError::InvalidPayload` if the type is known but the fields
    ///   do not match it
    pub fn decode(text: &str) -> Result<Option<Self>> {
        let envelope: Envelope<'_> = serde_json::from_str(text)?;

        let Some(frame_type) = FrameType::from_wire(&envelope.kind) else {
            return Ok(None);
        };

        serde_json::from_str(text).map(Some).map_err(|e| ProtocolError::InvalidPayload {
            frame_type: frame_type.as_str(),
            reason: e.to_string(),
        })
    }
}
