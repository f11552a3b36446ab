//! Opaque identifiers.
//!
//! The backend is inconsistent about whether keys are JSON strings or
//! numbers, so every identifier accepts both and normalizes to a string.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Raw key as it may appear on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Unsigned(u64),
    Signed(i64),
}

impl RawKey {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Unsigned(n) => n.to_string(),
            Self::Signed(n) => n.to_string(),
        }
    }
}

macro_rules! opaque_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string-like key.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Key as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl From<u64> for $name {
            fn from(key: u64) -> Self {
                Self(key.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                RawKey::deserialize(deserializer).map(|raw| Self(raw.into_string()))
            }
        }
    };
}

opaque_key!(
    /// Conversation room key. Immutable for the lifetime of a session.
    RoomId
);

opaque_key!(
    /// User key, used to tell local messages from remote ones.
    UserId
);

opaque_key!(
    /// Message key, unique within a room's displayed sequence.
    MessageId
);
