use arbitrary::Arbitrary;
use parley_proto::close_code;

/// Inputs to a connection manager.
///
/// Link-scoped operations target the current link unless `stale` is set, in
/// which case they target the most recently retired link.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Caller connects.
    Connect,

    /// Caller disconnects.
    Disconnect,

    /// Caller rotates the credential.
    UpdateCredential {
        /// Token seed
        seed: u8,
    },

    /// Socket finished opening.
    Open {
        /// Target the retired link instead
        stale: bool,
    },

    /// Socket closed by the peer or the network.
    Close {
        /// Close code
        code: CloseCode,
        /// Target the retired link instead
        stale: bool,
    },

    /// Connector could not construct the socket.
    Unavailable,

    /// Frame arrived on the current link.
    Frame {
        /// What arrived
        kind: FrameKind,
        /// Target the retired link instead
        stale: bool,
    },

    /// History request for the current link returned.
    HistoryLoaded,

    /// Reconnect timer elapsed, if armed.
    ReconnectTimer,

    /// Heartbeat interval elapsed, if armed.
    Heartbeat,

    /// Caller sends a message.
    SendMessage {
        /// Message text
        text: SmallText,
    },

    /// Caller signals typing.
    SendTyping,
}

/// Close codes worth distinguishing.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub enum CloseCode {
    /// 1000
    Normal,
    /// 1006
    Abnormal,
    /// 4003
    AuthFailed,
    /// 4000
    LivenessTimeout,
    /// Any other code
    Other(u16),
}

impl CloseCode {
    /// Numeric code.
    pub fn code(self) -> u16 {
        match self {
            Self::Normal => close_code::NORMAL,
            Self::Abnormal => close_code::ABNORMAL,
            Self::AuthFailed => close_code::AUTH_FAILED,
            Self::LivenessTimeout => close_code::LIVENESS_TIMEOUT,
            Self::Other(code) => code,
        }
    }
}

/// Inbound frame shapes.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub enum FrameKind {
    /// `chat_message` from another user
    RemoteMessage,
    /// `chat_message` echoing the local user
    OwnMessage,
    /// `typing`
    Typing,
    /// `chat_history`
    History,
    /// `ping`
    Ping,
    /// `pong`
    Pong,
    /// Unrecognized `type`
    Unknown,
    /// Not JSON
    Garbage,
}

impl FrameKind {
    /// Wire text for this frame. `local_user` is the echoing sender.
    pub fn to_text(self, seq: u64, local_user: &str) -> String {
        match self {
            Self::RemoteMessage => format!(
                r#"{{"type":"chat_message","message":{{"id":{seq},"senderId":"remote","content":"m{seq}"}}}}"#
            ),
            Self::OwnMessage => format!(
                r#"{{"type":"chat_message","message":{{"id":{seq},"senderId":"{local_user}","content":"m{seq}"}}}}"#
            ),
            Self::Typing => r#"{"type":"typing","sender_id":"remote"}"#.to_string(),
            Self::History => r#"{"type":"chat_history","messages":[]}"#.to_string(),
            Self::Ping => r#"{"type":"ping"}"#.to_string(),
            Self::Pong => r#"{"type":"pong"}"#.to_string(),
            Self::Unknown => r#"{"type":"presence"}"#.to_string(),
            Self::Garbage => "\u{0}not json".to_string(),
        }
    }
}

/// Short message text.
///
/// Size classes keep generated cases small while still covering blank text.
#[derive(Debug, Clone, Arbitrary)]
pub struct SmallText {
    /// Content seed
    pub seed: u8,
    /// 0 = empty, 1 = whitespace, otherwise a word
    pub size_class: u8,
}

impl SmallText {
    /// Expand to message text.
    pub fn to_text(&self) -> String {
        match self.size_class % 3 {
            0 => String::new(),
            1 => "  ".to_string(),
            _ => format!("msg-{}", self.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use parley_proto::WireFrame;

    use super::*;

    #[test]
    fn generated_frames_decode_as_intended() {
        let decoded = WireFrame::decode(&FrameKind::RemoteMessage.to_text(3, "me")).unwrap();
        assert!(matches!(decoded, Some(WireFrame::ChatMessage { .. })));

        assert_eq!(WireFrame::decode(&FrameKind::Unknown.to_text(0, "me")), Ok(None));
        assert!(WireFrame::decode(&FrameKind::Garbage.to_text(0, "me")).is_err());
    }

    #[test]
    fn small_text_covers_blank_input() {
        assert!(SmallText { seed: 0, size_class: 0 }.to_text().is_empty());
        assert!(SmallText { seed: 0, size_class: 1 }.to_text().trim().is_empty());
        assert_eq!(SmallText { seed: 7, size_class: 2 }.to_text(), "msg-7");
    }
}
