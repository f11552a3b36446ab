//! Property-based tests for the wire codec.
//!
//! The decoder sits directly behind the network, so it must tolerate any text
//! a server (or an attacker) can put in a frame.

use parley_proto::{ChatBody, FrameType, ProtocolError, WireFrame};
use proptest::prelude::*;

/// Wire names that are not part of the protocol.
fn unknown_type_name() -> impl Strategy<Value = String> {
    "[a-z_]{0,24}".prop_filter("must not be a known frame type", |name| {
        FrameType::from_wire(name).is_none()
    })
}

proptest! {
    #[test]
    fn prop_decode_never_panics(text in ".{0,512}") {
        let _ = WireFrame::decode(&text);
    }

    #[test]
    fn prop_unknown_types_are_ignored(name in unknown_type_name(), extra in any::<i64>()) {
        let text = serde_json::json!({ "type": name, "payload": extra }).to_string();

        prop_assert_eq!(WireFrame::decode(&text), Ok(None));
    }

    #[test]
    fn prop_outbound_chat_text_survives_encoding(text in any::<String>()) {
        let frame = WireFrame::chat_message(text.clone());
        let encoded = frame.encode().expect("encode should succeed");

        // Raw text never parses as a stored message object
        let decoded = WireFrame::decode(&encoded).expect("decode should succeed");
        prop_assert_eq!(
            decoded,
            Some(WireFrame::ChatMessage { message: ChatBody::Text(text) })
        );
    }

    #[test]
    fn prop_non_object_json_is_malformed(n in any::<i64>()) {
        let result = WireFrame::decode(&n.to_string());
        prop_assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
