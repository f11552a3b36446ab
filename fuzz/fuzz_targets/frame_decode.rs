//! Fuzz target for WireFrame::decode
//!
//! Feeds arbitrary text to the socket frame decoder to find:
//! - Panics on malformed or truncated JSON
//! - Frames that decode but cannot be encoded again
//! - Known frame types whose payload round trip changes meaning
//!
//! The decoder should NEVER panic. Invalid input returns an error, unknown
//! types return `None`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::WireFrame;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(Some(frame)) = WireFrame::decode(text) {
        let encoded = frame.encode().expect("decoded frame must encode");
        let again = WireFrame::decode(&encoded).expect("encoded frame must decode");
        assert_eq!(again, Some(frame), "frame changed across encode/decode");
    }
});
