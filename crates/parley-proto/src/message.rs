//! Chat message model.

use serde::{Deserialize, Serialize};

use crate::{MessageId, UserId};

/// A chat message as displayed in a room.
///
/// Field names follow the backend's camelCase JSON; snake_case aliases are
/// accepted because the history endpoint and the socket disagree.
///
/// # Invariants
///
/// - `id` is unique within a room's displayed sequence.
/// - `is_pending` is only ever set locally, for messages this client sent
///   that the server has not echoed back yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message key
    pub id: MessageId,
    /// Author
    #[serde(alias = "sender_id")]
    pub sender_id: UserId,
    /// Message text
    pub content: String,
    /// Server-formatted timestamp, shown verbatim
    #[serde(default, alias = "timestamp_display")]
    pub timestamp_display: String,
    /// Seen by the recipient
    #[serde(default, alias = "is_read")]
    pub is_read: bool,
    /// Sent locally, not yet confirmed by the server
    #[serde(default, alias = "is_pending")]
    pub is_pending: bool,
}

impl Message {
    /// Build an unconfirmed local message.
    pub fn pending(id: MessageId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id,
            sender_id,
            content: content.into(),
            timestamp_display: String::new(),
            is_read: false,
            is_pending: true,
        }
    }
}
