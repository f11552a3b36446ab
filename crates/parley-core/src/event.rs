//! Inbound room events delivered to the caller.

use parley_proto::{Message, UserId};

/// Events pushed to the caller's event channel, in transport delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A message was posted to the room.
    Message(Message),

    /// Someone is typing. The caller decides how long to show it.
    Typing {
        /// Who is typing, if the server said.
        sender_id: Option<UserId>,
    },

    /// Room backlog, fetched after connecting or pushed by the server.
    History(Vec<Message>),
}
