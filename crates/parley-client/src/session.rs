//! Room session.
//!
//! [`RoomSession`] owns a [`ConnectionManager`] behind a synchronous lock and
//! executes its actions with tokio tasks: one per opening socket, one reader
//! per open socket, the heartbeat ticker, the reconnect timer and short-lived
//! REST calls. The lock is never held across an `.await`; every task takes it
//! only to feed an event into the manager and execute the resulting actions.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_core::{
    ConnectionAction, ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState,
    Credential, Endpoint, LinkId, RoomEvent, RoomId, SendError, UserId,
};
use parley_proto::{WireFrame, close_code};
use tokio::{sync::mpsc, task::AbortHandle, time};
use url::Url;

use crate::{
    error::{SessionError, TransportError},
    service::RoomService,
    transport::{Connector, Inbound, LinkWriter},
};

/// Receivers handed to the caller when a session opens.
#[derive(Debug)]
pub struct SessionStreams {
    /// Inbound room events in delivery order
    pub events: mpsc::UnboundedReceiver<RoomEvent>,
    /// Every status transition in order
    pub status: mpsc::UnboundedReceiver<ConnectionState>,
}

/// Resources the session currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionResources {
    /// Published state
    pub state: ConnectionState,
    /// Sockets opening or open
    pub live_links: usize,
    /// Reconnect timer armed
    pub reconnect_timer: bool,
    /// Heartbeat timer armed
    pub heartbeat_timer: bool,
    /// Reconnects scheduled since the last open
    pub attempt_count: u32,
    /// Reconnect budget
    pub max_attempts: u32,
}

struct Inner {
    manager: ConnectionManager,
    writer: Option<(LinkId, LinkWriter)>,
    opening: Option<(LinkId, AbortHandle)>,
    reader: Option<AbortHandle>,
    heartbeat: Option<AbortHandle>,
    reconnect: Option<ReconnectTimer>,
    timer_generation: u64,
    side_tasks: Vec<AbortHandle>,
}

/// Armed reconnect timer. The generation lets a timer task that lost the
/// race with a cancel tell that the slot now belongs to a newer timer.
struct ReconnectTimer {
    generation: u64,
    task: AbortHandle,
}

struct Shared<C, S> {
    connector: C,
    service: S,
    events: mpsc::UnboundedSender<RoomEvent>,
    status: mpsc::UnboundedSender<ConnectionState>,
    inner: Mutex<Inner>,
}

impl<C: Connector, S: RoomService> Shared<C, S> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute(self: &Arc<Self>, inner: &mut Inner, actions: Vec<ConnectionAction>) {
        for action in actions {
            match action {
                ConnectionAction::Open { link, url } => self.open_link(inner, link, url),
                ConnectionAction::Close { link, code, reason } => {
                    if let Some((_, writer)) = inner.writer.take_if(|(id, _)| *id == link) {
                        writer.close(code, reason);
                        if let Some(reader) = inner.reader.take() {
                            reader.abort();
                        }
                    }
                    if let Some((_, task)) = inner.opening.take_if(|(id, _)| *id == link) {
                        task.abort();
                    }
                },
                ConnectionAction::Send(frame) => {
                    if let Err(error) = transmit(inner, &frame) {
                        let frame = frame.frame_type().as_str();
                        tracing::debug!(%error, frame, "frame not sent");
                    }
                },
                ConnectionAction::StartHeartbeat { interval } => {
                    let shared = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        let start = time::Instant::now() + interval;
                        let mut ticker = time::interval_at(start, interval);
                        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
                        loop {
                            ticker.tick().await;
                            let mut inner = shared.lock();
                            let actions = inner.manager.heartbeat_fired();
                            shared.execute(&mut inner, actions);
                        }
                    });
                    replace_task(&mut inner.heartbeat, task.abort_handle());
                },
                ConnectionAction::StopHeartbeat => {
                    if let Some(task) = inner.heartbeat.take() {
                        task.abort();
                    }
                },
                ConnectionAction::ScheduleReconnect { delay, attempt } => {
                    tracing::debug!(attempt, ?delay, "arming reconnect timer");
                    let generation = inner.timer_generation;
                    inner.timer_generation = generation.wrapping_add(1);

                    let shared = Arc::clone(self);
                    let task = tokio::spawn(async move {
                        time::sleep(delay).await;
                        let mut inner = shared.lock();
                        if !claim_timer(&mut inner.reconnect, generation) {
                            tracing::debug!(attempt, "ignoring superseded reconnect timer");
                            return;
                        }
                        let actions = inner.manager.reconnect_timer_fired();
                        shared.execute(&mut inner, actions);
                    });

                    let timer = ReconnectTimer { generation, task: task.abort_handle() };
                    if let Some(previous) = inner.reconnect.replace(timer) {
                        previous.task.abort();
                    }
                },
                ConnectionAction::CancelReconnect => {
                    if let Some(timer) = inner.reconnect.take() {
                        timer.task.abort();
                    }
                },
                ConnectionAction::FetchHistory { link } => self.fetch_history(inner, link),
                ConnectionAction::MarkRead => self.mark_read(inner),
                ConnectionAction::Deliver(event) => {
                    if self.events.send(event).is_err() {
                        tracing::debug!("event receiver dropped");
                    }
                },
                ConnectionAction::StatusChanged(state) => {
                    if self.status.send(state).is_err() {
                        tracing::debug!("status receiver dropped");
                    }
                },
            }
        }
    }

    fn open_link(self: &Arc<Self>, inner: &mut Inner, link: LinkId, url: Url) {
        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let result = shared.connector.connect(url).await;

            let mut inner = shared.lock();
            if inner.opening.as_ref().is_some_and(|(id, _)| *id == link) {
                inner.opening = None;
            }

            let actions = match result {
                Ok(socket) => {
                    let (writer, receiver) = socket.into_parts();
                    let actions = inner.manager.handle_open(link);
                    if actions.is_empty() {
                        writer.close(close_code::NORMAL, "superseded".to_string());
                        return;
                    }
                    inner.writer = Some((link, writer));
                    let reader = shared.spawn_reader(link, receiver);
                    replace_task(&mut inner.reader, reader);
                    actions
                },
                Err(TransportError::InvalidEndpoint(reason)) => {
                    inner.manager.handle_unavailable(link, reason)
                },
                Err(error) => {
                    tracing::info!(%error, %link, "open failed");
                    inner.manager.handle_close(link, close_code::ABNORMAL)
                },
            };
            shared.execute(&mut inner, actions);
        });

        inner.opening = Some((link, task.abort_handle()));
    }

    fn spawn_reader(
        self: &Arc<Self>,
        link: LinkId,
        mut receiver: mpsc::UnboundedReceiver<Inbound>,
    ) -> AbortHandle {
        let shared = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut code = close_code::ABNORMAL;
            while let Some(item) = receiver.recv().await {
                match item {
                    Inbound::Text(text) => {
                        let mut inner = shared.lock();
                        let actions = inner.manager.handle_frame(link, &text);
                        shared.execute(&mut inner, actions);
                    },
                    Inbound::Closed { code: closed } => {
                        code = closed;
                        break;
                    },
                }
            }

            let mut inner = shared.lock();
            // Clear the slot first so aborting it cannot cancel this task.
            if inner.writer.as_ref().is_some_and(|(id, _)| *id == link) {
                inner.writer = None;
                inner.reader = None;
            }
            let actions = inner.manager.handle_close(link, code);
            shared.execute(&mut inner, actions);
        });
        task.abort_handle()
    }

    fn fetch_history(self: &Arc<Self>, inner: &mut Inner, link: LinkId) {
        let shared = Arc::clone(self);
        let room = inner.manager.room_id().clone();
        let credential = inner.manager.credential().clone();

        let task = tokio::spawn(async move {
            match shared.service.fetch_history(&room, &credential).await {
                Ok(messages) => {
                    let mut inner = shared.lock();
                    let actions = inner.manager.history_loaded(link, messages);
                    shared.execute(&mut inner, actions);
                },
                Err(error) => tracing::warn!(%room, %error, "history fetch failed"),
            }
        });
        track_side_task(inner, task.abort_handle());
    }

    fn mark_read(self: &Arc<Self>, inner: &mut Inner) {
        let shared = Arc::clone(self);
        let room = inner.manager.room_id().clone();
        let credential = inner.manager.credential().clone();

        let task = tokio::spawn(async move {
            if let Err(error) = shared.service.mark_read(&room, &credential).await {
                tracing::warn!(%room, %error, "mark read failed");
            }
        });
        track_side_task(inner, task.abort_handle());
    }
}

fn replace_task(slot: &mut Option<AbortHandle>, task: AbortHandle) {
    if let Some(previous) = slot.replace(task) {
        previous.abort();
    }
}

/// Take the reconnect slot if it still holds the timer of `generation`.
fn claim_timer(slot: &mut Option<ReconnectTimer>, generation: u64) -> bool {
    slot.take_if(|timer| timer.generation == generation).is_some()
}

fn track_side_task(inner: &mut Inner, task: AbortHandle) {
    inner.side_tasks.retain(|t| !t.is_finished());
    inner.side_tasks.push(task);
}

fn transmit(inner: &Inner, frame: &WireFrame) -> Result<(), SendError> {
    let Some((_, writer)) = &inner.writer else {
        return Err(SendError::LinkClosed);
    };

    let text = frame.encode().map_err(|error| {
        tracing::warn!(%error, "cannot encode frame");
        SendError::LinkClosed
    })?;

    if writer.send_text(text) { Ok(()) } else { Err(SendError::LinkClosed) }
}

/// One room's live session.
///
/// Dropping the handle disconnects: timers are cancelled and the socket is
/// closed with code 1000.
///
/// Must be created and used inside a tokio runtime.
pub struct RoomSession<C: Connector, S: RoomService> {
    shared: Arc<Shared<C, S>>,
}

impl<C: Connector, S: RoomService> RoomSession<C, S> {
    /// Create a disconnected session for `room`. Call [`Self::connect`] to
    /// start.
    pub fn open(
        room: RoomId,
        local_user: UserId,
        credential: Credential,
        endpoint: Endpoint,
        config: ConnectionConfig,
        connector: C,
        service: S,
    ) -> (Self, SessionStreams) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        let manager = ConnectionManager::new(room, local_user, credential, endpoint, config);
        let inner = Inner {
            manager,
            writer: None,
            opening: None,
            reader: None,
            heartbeat: None,
            reconnect: None,
            timer_generation: 0,
            side_tasks: Vec::new(),
        };

        let shared = Arc::new(Shared {
            connector,
            service,
            events: events_tx,
            status: status_tx,
            inner: Mutex::new(inner),
        });

        (Self { shared }, SessionStreams { events: events_rx, status: status_rx })
    }

    /// Start connecting. Does nothing if already connecting or connected.
    ///
    /// # Errors
    ///
    /// - `SessionError::Connection` if the socket URL cannot be built; the
    ///   session is then `Failed`
    pub fn connect(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        let actions = inner.manager.connect();
        self.shared.execute(&mut inner, actions);

        match inner.manager.failure() {
            Some(error) if inner.manager.state() == ConnectionState::Failed => {
                Err(SessionError::Connection(error.clone()))
            },
            _ => Ok(()),
        }
    }

    /// Stop the session. Idempotent.
    pub fn disconnect(&self) {
        let mut inner = self.shared.lock();
        let actions = inner.manager.disconnect();
        self.shared.execute(&mut inner, actions);

        for task in inner.side_tasks.drain(..) {
            task.abort();
        }
    }

    /// Send a chat message.
    ///
    /// # Errors
    ///
    /// - `SessionError::Send` if not connected, the text is blank or the
    ///   socket is gone. Nothing was transmitted.
    pub fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        let actions = inner.manager.send_message(text)?;
        self.send_all(&mut inner, actions)
    }

    /// Tell the room the local user is typing. Returns false if nothing was
    /// sent.
    pub fn send_typing(&self) -> bool {
        let mut inner = self.shared.lock();
        match inner.manager.send_typing() {
            Ok(actions) => self.send_all(&mut inner, actions).is_ok(),
            Err(error) => {
                tracing::debug!(%error, "typing not sent");
                false
            },
        }
    }

    fn send_all(
        &self,
        inner: &mut Inner,
        actions: Vec<ConnectionAction>,
    ) -> Result<(), SessionError> {
        for action in actions {
            match action {
                ConnectionAction::Send(frame) => transmit(inner, &frame)?,
                other => self.shared.execute(inner, vec![other]),
            }
        }
        Ok(())
    }

    /// Replace the credential, reconnecting if connected.
    pub fn update_credential(&self, credential: Credential) {
        let mut inner = self.shared.lock();
        let actions = inner.manager.update_credential(credential);
        self.shared.execute(&mut inner, actions);
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().manager.state()
    }

    /// Room this session serves.
    pub fn room_id(&self) -> RoomId {
        self.shared.lock().manager.room_id().clone()
    }

    /// Reconnects scheduled since the last open.
    pub fn attempt_count(&self) -> u32 {
        self.shared.lock().manager.attempt_count()
    }

    /// Why the session is in a terminal state.
    pub fn failure(&self) -> Option<ConnectionError> {
        self.shared.lock().manager.failure().cloned()
    }

    /// Sockets and timers currently held.
    pub fn resources(&self) -> SessionResources {
        let inner = self.shared.lock();
        let live = |task: &Option<AbortHandle>| task.as_ref().is_some_and(|t| !t.is_finished());

        SessionResources {
            state: inner.manager.state(),
            live_links: usize::from(inner.writer.is_some())
                + usize::from(inner.opening.as_ref().is_some_and(|(_, t)| !t.is_finished())),
            reconnect_timer: inner.reconnect.as_ref().is_some_and(|t| !t.task.is_finished()),
            heartbeat_timer: live(&inner.heartbeat),
            attempt_count: inner.manager.attempt_count(),
            max_attempts: inner.manager.reconnect_policy().max_attempts,
        }
    }
}

impl<C: Connector, S: RoomService> Drop for RoomSession<C, S> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn superseded_timer_cannot_claim_newer_slot() {
        let newer = tokio::spawn(std::future::pending::<()>());
        let mut slot = Some(ReconnectTimer { generation: 1, task: newer.abort_handle() });

        assert!(!claim_timer(&mut slot, 0));
        assert!(slot.is_some());

        assert!(claim_timer(&mut slot, 1));
        assert!(slot.is_none());
        assert!(!claim_timer(&mut slot, 1));

        newer.abort();
    }
}
