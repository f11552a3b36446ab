//! Per-room message list with optimistic sends.
//!
//! The caller pushes a pending entry when the user sends, then feeds every
//! [`RoomEvent`] through [`Timeline::apply`]. The server echo of a local
//! message replaces the oldest pending entry with the same content. A failed
//! send is rolled back with [`Timeline::withdraw`].

use std::collections::HashSet;

use parley_proto::{Message, MessageId, UserId};

use crate::event::RoomEvent;

/// Ordered messages for one room.
#[derive(Debug, Clone)]
pub struct Timeline {
    local_user: UserId,
    messages: Vec<Message>,
    next_local: u64,
}

impl Timeline {
    /// Empty timeline for `local_user`.
    pub fn new(local_user: UserId) -> Self {
        Self { local_user, messages: Vec::new(), next_local: 0 }
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Sent but not yet echoed.
    pub fn pending_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_pending).count()
    }

    /// Append an optimistic entry and return its local ID.
    pub fn push_pending(&mut self, content: impl Into<String>) -> MessageId {
        let id = MessageId::new(format!("local-{}", self.next_local));
        self.next_local += 1;
        self.messages.push(Message::pending(id.clone(), self.local_user.clone(), content));
        id
    }

    /// Remove a pending entry whose send failed.
    pub fn withdraw(&mut self, id: &MessageId) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.is_pending && &m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Fold an event in. Returns true if the visible list changed.
    pub fn apply(&mut self, event: &RoomEvent) -> bool {
        match event {
            RoomEvent::Message(message) => self.merge(message.clone()),
            RoomEvent::History(history) => {
                self.replace_history(history);
                true
            },
            RoomEvent::Typing { .. } => false,
        }
    }

    fn merge(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| !m.is_pending && m.id == message.id) {
            return false;
        }

        if message.sender_id == self.local_user
            && let Some(pos) =
                self.messages.iter().position(|m| m.is_pending && m.content == message.content)
        {
            self.messages[pos] = message;
            return true;
        }

        self.messages.push(message);
        true
    }

    /// Replace confirmed messages with `history`, keeping pending entries at
    /// the end. Duplicate IDs in `history` keep their first occurrence.
    ///
    /// A pending entry is confirmed, and dropped, when `history` brings a
    /// local message with the same content that was not shown before. Each
    /// such message confirms at most one pending entry, oldest first.
    fn replace_history(&mut self, history: &[Message]) {
        let shown: HashSet<MessageId> =
            self.messages.iter().filter(|m| !m.is_pending).map(|m| m.id.clone()).collect();

        let mut seen = HashSet::new();
        let merged: Vec<Message> =
            history.iter().filter(|m| seen.insert(m.id.clone())).cloned().collect();

        let mut unclaimed: Vec<&Message> = merged
            .iter()
            .filter(|m| m.sender_id == self.local_user && !shown.contains(&m.id))
            .collect();

        let pending: Vec<Message> = self
            .messages
            .drain(..)
            .filter(|m| m.is_pending)
            .filter(|m| match unclaimed.iter().position(|c| c.content == m.content) {
                Some(pos) => {
                    unclaimed.remove(pos);
                    false
                },
                None => true,
            })
            .collect();

        self.messages = merged;
        self.messages.extend(pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmed(id: u64, sender: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            sender_id: UserId::from(sender),
            content: content.to_string(),
            timestamp_display: String::new(),
            is_read: false,
            is_pending: false,
        }
    }

    #[test]
    fn echo_replaces_pending_entry() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        timeline.push_pending("hello");
        assert_eq!(timeline.pending_count(), 1);

        assert!(timeline.apply(&RoomEvent::Message(confirmed(1, "alice", "hello"))));
        assert_eq!(timeline.pending_count(), 0);
        assert_eq!(timeline.messages(), &[confirmed(1, "alice", "hello")]);
    }

    #[test]
    fn duplicate_delivery_is_ignored() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        assert!(timeline.apply(&RoomEvent::Message(confirmed(1, "bob", "a"))));
        assert!(!timeline.apply(&RoomEvent::Message(confirmed(1, "bob", "a"))));
        assert_eq!(timeline.messages().len(), 1);
    }

    #[test]
    fn withdraw_rolls_back_failed_send() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        let id = timeline.push_pending("oops");

        assert_eq!(timeline.withdraw(&id).map(|m| m.content), Some("oops".to_string()));
        assert!(timeline.messages().is_empty());
        assert!(timeline.withdraw(&id).is_none());
    }

    #[test]
    fn history_keeps_pending_and_dedupes() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        timeline.apply(&RoomEvent::Message(confirmed(9, "bob", "stale")));
        timeline.push_pending("in flight");

        let history =
            vec![confirmed(1, "bob", "a"), confirmed(2, "alice", "b"), confirmed(1, "bob", "a")];
        timeline.apply(&RoomEvent::History(history));

        let contents: Vec<_> = timeline.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a", "b", "in flight"]);
    }

    #[test]
    fn history_confirms_pending_entry() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        timeline.push_pending("hello");
        timeline.push_pending("still sending");

        timeline.apply(&RoomEvent::History(vec![confirmed(1, "alice", "hello")]));

        assert_eq!(timeline.pending_count(), 1);
        let contents: Vec<_> = timeline.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "still sending"]);
        assert!(!timeline.messages()[0].is_pending);
    }

    #[test]
    fn history_does_not_confirm_with_an_already_shown_message() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        timeline.apply(&RoomEvent::Message(confirmed(1, "alice", "ok")));
        timeline.push_pending("ok");

        timeline.apply(&RoomEvent::History(vec![confirmed(1, "alice", "ok")]));
        assert_eq!(timeline.pending_count(), 1);

        timeline.apply(&RoomEvent::History(vec![
            confirmed(1, "alice", "ok"),
            confirmed(2, "alice", "ok"),
        ]));
        assert_eq!(timeline.pending_count(), 0);
        assert_eq!(timeline.messages().len(), 2);
    }

    #[test]
    fn typing_does_not_change_timeline() {
        let mut timeline = Timeline::new(UserId::from("alice"));
        assert!(!timeline.apply(&RoomEvent::Typing { sender_id: None }));
    }
}
