//! REST collaborator used alongside the socket.
//!
//! The session calls [`RoomService::fetch_history`] after every successful
//! open and [`RoomService::mark_read`] after every remote message. Both run as
//! spawned tasks; their failures are logged and never change session state.

use std::future::Future;

use parley_core::{Credential, Message, RoomId};
use serde::Deserialize;

use crate::error::ServiceError;

/// One entry of the room list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room key
    pub id: RoomId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Messages the local user has not read
    #[serde(default, alias = "unread_count")]
    pub unread_count: u32,
    /// Preview of the newest message
    #[serde(default, alias = "last_message")]
    pub last_message: Option<String>,
}

/// History, read receipts and room enumeration.
pub trait RoomService: Send + Sync + 'static {
    /// Backlog for `room`, oldest first.
    fn fetch_history(
        &self,
        room: &RoomId,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Message>, ServiceError>> + Send;

    /// Mark everything in `room` as read by the credential's owner.
    fn mark_read(
        &self,
        room: &RoomId,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Rooms visible to the credential's owner.
    fn list_rooms(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<RoomSummary>, ServiceError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_accepts_numeric_ids_and_snake_case() {
        let json = r#"[{"id":3,"name":"Mentors","unread_count":2},{"id":"x","lastMessage":"hey"}]"#;
        let rooms: Vec<RoomSummary> = serde_json::from_str(json).unwrap();

        assert_eq!(rooms[0].id, RoomId::from(3u64));
        assert_eq!(rooms[0].unread_count, 2);
        assert_eq!(rooms[1].name, "");
        assert_eq!(rooms[1].last_message.as_deref(), Some("hey"));
    }
}
