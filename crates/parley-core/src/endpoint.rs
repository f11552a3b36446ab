//! Room socket endpoint.
//!
//! The server exposes one socket per room at `{base}/{room}/?token={token}`.
//! Only `ws` and `wss` bases are accepted.

use parley_proto::RoomId;
use url::Url;

use crate::{credential::Credential, error::ConnectionError};

/// Validated socket base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Parse and validate a socket base URL such as `wss://host/ws/chat`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidEndpoint` if the URL does not parse, uses a
    ///   scheme other than `ws`/`wss`, or cannot carry a path
    pub fn parse(base: &str) -> Result<Self, ConnectionError> {
        let base = Url::parse(base).map_err(|e| ConnectionError::InvalidEndpoint(e.to_string()))?;

        match base.scheme() {
            "ws" | "wss" => {},
            other => {
                return Err(ConnectionError::InvalidEndpoint(format!(
                    "unsupported scheme '{other}'"
                )));
            },
        }

        if base.cannot_be_a_base() {
            return Err(ConnectionError::InvalidEndpoint("endpoint cannot carry a path".into()));
        }

        Ok(Self { base })
    }

    /// Base URL as given.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Socket URL for `room`, carrying `credential` as the `token` query
    /// parameter.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::InvalidEndpoint` if the room ID is empty
    pub fn room_url(&self, room: &RoomId, credential: &Credential) -> Result<Url, ConnectionError> {
        if room.as_str().is_empty() {
            return Err(ConnectionError::InvalidEndpoint("room id is empty".into()));
        }

        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| ConnectionError::InvalidEndpoint("endpoint cannot carry a path".into()))?
            .pop_if_empty()
            .push(room.as_str())
            .push("");
        url.query_pairs_mut().append_pair("token", credential.expose());

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_url_appends_room_and_token() {
        let endpoint = Endpoint::parse("wss://chat.example.com/ws/chat").unwrap();
        let url = endpoint.room_url(&RoomId::from(42u64), &Credential::new("abc")).unwrap();
        assert_eq!(url.as_str(), "wss://chat.example.com/ws/chat/42/?token=abc");
    }

    #[test]
    fn trailing_slash_on_base_is_not_doubled() {
        let endpoint = Endpoint::parse("ws://localhost:8000/ws/chat/").unwrap();
        let url = endpoint.room_url(&RoomId::from("lobby"), &Credential::new("t")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/chat/lobby/?token=t");
    }

    #[test]
    fn token_is_percent_encoded() {
        let endpoint = Endpoint::parse("ws://localhost/ws/chat").unwrap();
        let url = endpoint.room_url(&RoomId::from("r"), &Credential::new("a b&c")).unwrap();
        assert_eq!(url.query(), Some("token=a+b%26c"));
    }

    #[test]
    fn rejects_non_socket_schemes() {
        assert!(matches!(
            Endpoint::parse("https://example.com/ws"),
            Err(ConnectionError::InvalidEndpoint(_))
        ));
        assert!(matches!(Endpoint::parse("not a url"), Err(ConnectionError::InvalidEndpoint(_))));
    }

    #[test]
    fn empty_room_is_rejected() {
        let endpoint = Endpoint::parse("ws://localhost/ws/chat").unwrap();
        let result = endpoint.room_url(&RoomId::from(""), &Credential::new("t"));
        assert!(matches!(result, Err(ConnectionError::InvalidEndpoint(_))));
    }
}
