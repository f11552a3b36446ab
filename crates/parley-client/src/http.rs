//! REST room service over `reqwest`.
//!
//! Endpoints, relative to the API base:
//!
//! - `GET  chat/rooms/` lists rooms
//! - `GET  chat/rooms/{room}/messages/` returns `{ "messages": [...] }`
//! - `POST chat/rooms/{room}/mark-read/`

use parley_core::{Credential, Message, RoomId};
use serde::Deserialize;
use url::Url;

use crate::{
    error::ServiceError,
    service::{RoomService, RoomSummary},
};

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

/// [`RoomService`] backed by the chat REST API.
#[derive(Debug, Clone)]
pub struct HttpRoomService {
    client: reqwest::Client,
    api_base: Url,
}

impl HttpRoomService {
    /// Service rooted at `api_base`, e.g. `https://host/api`.
    ///
    /// # Errors
    ///
    /// - `ServiceError::Request` if `api_base` is not an absolute URL
    pub fn new(api_base: &str) -> Result<Self, ServiceError> {
        let mut api_base = Url::parse(api_base).map_err(|e| ServiceError::Request(e.to_string()))?;
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        Ok(Self { client: reqwest::Client::new(), api_base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| ServiceError::Request("api base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments)
            .push("");
        Ok(url)
    }
}

fn map_error(error: reqwest::Error) -> ServiceError {
    if let Some(status) = error.status() {
        ServiceError::Status(status.as_u16())
    } else if error.is_decode() {
        ServiceError::Decode(error.to_string())
    } else {
        ServiceError::Request(error.to_string())
    }
}

impl RoomService for HttpRoomService {
    async fn fetch_history(
        &self,
        room: &RoomId,
        credential: &Credential,
    ) -> Result<Vec<Message>, ServiceError> {
        let url = self.url(&["chat", "rooms", room.as_str(), "messages"])?;
        let body: HistoryResponse = self
            .client
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(map_error)?
            .json()
            .await
            .map_err(map_error)?;

        Ok(body.messages)
    }

    async fn mark_read(&self, room: &RoomId, credential: &Credential) -> Result<(), ServiceError> {
        let url = self.url(&["chat", "rooms", room.as_str(), "mark-read"])?;
        self.client
            .post(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(map_error)?;

        Ok(())
    }

    async fn list_rooms(&self, credential: &Credential) -> Result<Vec<RoomSummary>, ServiceError> {
        let url = self.url(&["chat", "rooms"])?;
        self.client
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(map_error)?
            .json()
            .await
            .map_err(map_error)
    }
}
