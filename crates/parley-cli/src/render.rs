//! Text rendering for the terminal.

use parley_client::{ConnectionState, Message, RoomSummary, UserId};

/// One message line: `[time] sender: text`, with `you` for the local user.
pub fn message(message: &Message, local_user: &UserId) -> String {
    let sender = if &message.sender_id == local_user { "you" } else { message.sender_id.as_str() };
    let mut line = if message.timestamp_display.is_empty() {
        format!("{sender}: {}", message.content)
    } else {
        format!("[{}] {sender}: {}", message.timestamp_display, message.content)
    };

    if message.is_pending {
        line.push_str(" (sending)");
    }
    line
}

/// Status banner.
pub fn status(state: ConnectionState) -> String {
    let hint = match state {
        ConnectionState::Connecting => " ...",
        ConnectionState::Failed => ", /connect to retry",
        ConnectionState::AuthError => ", /token <value> then /connect",
        ConnectionState::Disconnected | ConnectionState::Connected => "",
    };
    format!("-- {state}{hint} --")
}

/// Typing notice for `sender`, or an anonymous one.
pub fn typing(sender: Option<&UserId>) -> String {
    match sender {
        Some(sender) => format!("* {sender} is typing"),
        None => "* someone is typing".to_string(),
    }
}

/// Room list entry.
pub fn room(room: &RoomSummary) -> String {
    let name = if room.name.is_empty() { room.id.as_str() } else { room.name.as_str() };
    let mut line = format!("{:>6}  {name}", room.id.as_str());
    if room.unread_count > 0 {
        line.push_str(&format!(" ({} unread)", room.unread_count));
    }
    if let Some(last) = &room.last_message {
        line.push_str(&format!(": {last}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use parley_client::RoomId;

    use super::*;

    fn sample(sender: &str, pending: bool) -> Message {
        Message {
            id: 1u64.into(),
            sender_id: UserId::from(sender),
            content: "see you at 5".to_string(),
            timestamp_display: if pending { String::new() } else { "17:02".to_string() },
            is_read: false,
            is_pending: pending,
        }
    }

    #[test]
    fn message_lines() {
        let me = UserId::from("7");
        assert_snapshot!(message(&sample("9", false), &me), @"[17:02] 9: see you at 5");
        assert_snapshot!(message(&sample("7", true), &me), @"you: see you at 5 (sending)");
    }

    #[test]
    fn status_lines() {
        assert_snapshot!(status(ConnectionState::Connected), @"-- connected --");
        assert_snapshot!(
            status(ConnectionState::AuthError),
            @"-- auth error, /token <value> then /connect --"
        );
    }

    #[test]
    fn room_lines() {
        let room = RoomSummary {
            id: RoomId::from("12"),
            name: "Mentors".to_string(),
            unread_count: 2,
            last_message: Some("hey".to_string()),
        };
        assert_eq!(super::room(&room), "    12  Mentors (2 unread): hey");
        assert_eq!(typing(None), "* someone is typing");
    }
}
