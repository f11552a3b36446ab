//! In-memory room service.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_client::{RoomService, RoomSummary, ServiceError};
use parley_core::{Credential, Message, RoomId};

#[derive(Default)]
struct ServiceState {
    history: Vec<Message>,
    rooms: Vec<RoomSummary>,
    fail_history: bool,
    fail_mark_read: bool,
    history_calls: usize,
    mark_read_calls: Vec<RoomId>,
    tokens_seen: Vec<String>,
}

/// Canned history and recorded calls. Clones share state, so a test can keep
/// one while the session owns another.
#[derive(Clone, Default)]
pub struct SimRoomService {
    state: Arc<Mutex<ServiceState>>,
}

impl SimRoomService {
    /// Service with no history.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Backlog returned by `fetch_history`.
    pub fn set_history(&self, history: Vec<Message>) {
        self.lock().history = history;
    }

    /// Rooms returned by `list_rooms`.
    pub fn set_rooms(&self, rooms: Vec<RoomSummary>) {
        self.lock().rooms = rooms;
    }

    /// Make `fetch_history` fail.
    pub fn fail_history(&self, fail: bool) {
        self.lock().fail_history = fail;
    }

    /// Make `mark_read` fail.
    pub fn fail_mark_read(&self, fail: bool) {
        self.lock().fail_mark_read = fail;
    }

    /// `fetch_history` calls so far.
    pub fn history_calls(&self) -> usize {
        self.lock().history_calls
    }

    /// Rooms passed to `mark_read`, in call order.
    pub fn mark_read_calls(&self) -> Vec<RoomId> {
        self.lock().mark_read_calls.clone()
    }

    /// Tokens presented, in call order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.lock().tokens_seen.clone()
    }
}

impl RoomService for SimRoomService {
    async fn fetch_history(
        &self,
        _room: &RoomId,
        credential: &Credential,
    ) -> Result<Vec<Message>, ServiceError> {
        let mut state = self.lock();
        state.history_calls += 1;
        state.tokens_seen.push(credential.expose().to_string());
        if state.fail_history {
            return Err(ServiceError::Status(503));
        }
        Ok(state.history.clone())
    }

    async fn mark_read(&self, room: &RoomId, credential: &Credential) -> Result<(), ServiceError> {
        let mut state = self.lock();
        state.mark_read_calls.push(room.clone());
        state.tokens_seen.push(credential.expose().to_string());
        if state.fail_mark_read {
            return Err(ServiceError::Request("simulated outage".to_string()));
        }
        Ok(())
    }

    async fn list_rooms(&self, credential: &Credential) -> Result<Vec<RoomSummary>, ServiceError> {
        let mut state = self.lock();
        state.tokens_seen.push(credential.expose().to_string());
        Ok(state.rooms.clone())
    }
}
