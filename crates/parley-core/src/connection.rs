//! Room connection state machine.
//!
//! Owns the lifecycle of one room's socket: opening, heartbeats, reconnect
//! backoff, frame dispatch and credential rotation. Uses the action pattern:
//! methods take events as input and return [`ConnectionAction`]s for the
//! driver to execute. Timers and sockets live in the driver; the manager only
//! records which of them should exist.
//!
//! # State Machine
//!
//! ```text
//!                 connect()
//! ┌──────────────┐────────>┌────────────┐  open   ┌───────────┐
//! │ Disconnected │         │ Connecting │────────>│ Connected │
//! └──────────────┘<────────└────────────┘<────────└───────────┘
//!        ↑     disconnect()   │  │  ↑  close(transient)  │
//!        │                    │  │  └─ timer ─┘          │
//!        │ close(1000)        │  │                       │ close(4003)
//!        └────────────────────│──│───────────────────────┤
//!                 exhausted / │  │ close(4003)           ↓
//!              invalid URL    ↓  └───────────────>┌───────────┐
//!                       ┌────────┐                │ AuthError │
//!                       │ Failed │                └───────────┘
//!                       └────────┘
//! ```
//!
//! Each socket gets a fresh [`LinkId`]. Events carrying any other link ID
//! belong to a socket that was already replaced or closed, and are ignored.

use std::{fmt, time::Duration};

use parley_proto::{
    ChatBody, RoomId, UserId, WireFrame,
    close_code::{self, CloseKind},
};
use url::Url;

use crate::{
    credential::Credential,
    endpoint::Endpoint,
    error::{ConnectionError, SendError},
    event::RoomEvent,
    heartbeat::{Beat, DEFAULT_HEARTBEAT_INTERVAL, HeartbeatMonitor},
    reconnect::{ReconnectPolicy, ReconnectState},
};

/// Identifies one socket within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(u64);

impl LinkId {
    /// Raw generation number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

/// Actions returned by the connection state machine.
///
/// The driver (test harness or the tokio session) executes these in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a socket to `url` and report its events under `link`
    Open {
        /// Generation for the new socket
        link: LinkId,
        /// Room URL including the credential
        url: Url,
    },

    /// Close the socket for `link`
    Close {
        /// Socket to close
        link: LinkId,
        /// Close code to send
        code: u16,
        /// Close reason to send
        reason: String,
    },

    /// Encode and send this frame on the open socket
    Send(WireFrame),

    /// Fire [`ConnectionManager::heartbeat_fired`] every `interval`
    StartHeartbeat {
        /// Ping interval
        interval: Duration,
    },

    /// Cancel the heartbeat timer
    StopHeartbeat,

    /// Fire [`ConnectionManager::reconnect_timer_fired`] once after `delay`
    ScheduleReconnect {
        /// Backoff delay
        delay: Duration,
        /// 1-based attempt number
        attempt: u32,
    },

    /// Cancel the pending reconnect timer
    CancelReconnect,

    /// Fetch the room backlog and report it via
    /// [`ConnectionManager::history_loaded`]
    FetchHistory {
        /// Socket the backlog is for
        link: LinkId,
    },

    /// Mark the room as read on the server. Failures are not reported back.
    MarkRead,

    /// Push an event to the caller
    Deliver(RoomEvent),

    /// Publish a status change to the caller
    StatusChanged(ConnectionState),
}

/// Connection state as published to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected and not trying
    Disconnected,
    /// Socket opening or reconnect scheduled
    Connecting,
    /// Socket open
    Connected,
    /// Gave up; requires an explicit `connect()`
    Failed,
    /// Server rejected the credential; requires a new credential or `connect()`
    AuthError,
}

impl ConnectionState {
    /// Lowercase name used in logs and UI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::AuthError => "auth error",
        }
    }

    /// Terminal states are only left through caller action.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::AuthError)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Interval between pings while connected
    pub heartbeat_interval: Duration,
    /// Close with [`close_code::LIVENESS_TIMEOUT`] after this many unanswered
    /// pings. `None` never closes on missing pongs.
    pub missed_pong_limit: Option<u32>,
    /// Reconnect schedule
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            missed_pong_limit: None,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkPhase {
    Idle,
    Opening(LinkId),
    Open(LinkId),
}

impl LinkPhase {
    fn id(self) -> Option<LinkId> {
        match self {
            Self::Idle => None,
            Self::Opening(link) | Self::Open(link) => Some(link),
        }
    }
}

/// Connection state machine for one room.
///
/// # Invariants
///
/// - At most one socket is opening or open at any time
/// - A reconnect is never pending while a socket is opening or open
/// - The heartbeat runs if and only if the state is `Connected`
/// - Terminal states hold neither a socket nor a timer
/// - `attempt_count() <= config.reconnect.max_attempts`
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    room_id: RoomId,
    local_user: UserId,
    credential: Credential,
    endpoint: Endpoint,
    state: ConnectionState,
    link: LinkPhase,
    next_link: u64,
    heartbeat: HeartbeatMonitor,
    reconnect: ReconnectState,
    reconnect_pending: bool,
    disconnect_requested: bool,
    failure: Option<ConnectionError>,
}

impl ConnectionManager {
    /// Create a manager in [`ConnectionState::Disconnected`].
    pub fn new(
        room_id: RoomId,
        local_user: UserId,
        credential: Credential,
        endpoint: Endpoint,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            room_id,
            local_user,
            credential,
            endpoint,
            state: ConnectionState::Disconnected,
            link: LinkPhase::Idle,
            next_link: 0,
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval, config.missed_pong_limit),
            reconnect: ReconnectState::new(config.reconnect),
            reconnect_pending: false,
            disconnect_requested: false,
            failure: None,
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Room this manager serves
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Local user, used to tell own messages from remote ones
    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Credential used for the next socket and REST call
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Reconnects scheduled since the last successful open
    pub fn attempt_count(&self) -> u32 {
        self.reconnect.attempt_count()
    }

    /// Reconnect schedule in use
    pub fn reconnect_policy(&self) -> &ReconnectPolicy {
        self.reconnect.policy()
    }

    /// Socket currently opening or open
    pub fn link(&self) -> Option<LinkId> {
        self.link.id()
    }

    /// True if the current socket has opened
    pub fn is_link_open(&self) -> bool {
        matches!(self.link, LinkPhase::Open(_))
    }

    /// True while a reconnect timer should be armed
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// True while the heartbeat timer should be armed
    pub fn heartbeat_running(&self) -> bool {
        self.heartbeat.is_running()
    }

    /// Why the manager is in a terminal state
    pub fn failure(&self) -> Option<&ConnectionError> {
        self.failure.as_ref()
    }

    /// Start connecting.
    ///
    /// Resets the reconnect budget. Does nothing while a socket is opening or
    /// open, or while a reconnect is already scheduled. If the room URL
    /// cannot be built the manager moves straight to `Failed`.
    pub fn connect(&mut self) -> Vec<ConnectionAction> {
        if self.link != LinkPhase::Idle || self.reconnect_pending {
            tracing::debug!(room = %self.room_id, state = %self.state, "connect ignored");
            return Vec::new();
        }

        self.reconnect.reset();
        self.begin_attempt()
    }

    /// Stop the session: cancel timers, close the socket with code 1000 and
    /// move to `Disconnected`.
    ///
    /// Terminal states are kept so the caller can still see why the session
    /// ended. Calling this twice is harmless.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.disconnect_requested = true;

        let mut actions = Vec::new();

        if std::mem::take(&mut self.reconnect_pending) {
            actions.push(ConnectionAction::CancelReconnect);
        }

        self.stop_heartbeat(&mut actions);

        if let Some(link) = self.link.id() {
            self.link = LinkPhase::Idle;
            actions.push(ConnectionAction::Close {
                link,
                code: close_code::NORMAL,
                reason: "client disconnect".to_string(),
            });
        }

        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            self.transition(ConnectionState::Disconnected, &mut actions);
        }

        actions
    }

    /// Replace the credential. If connected, the socket is recycled so the
    /// server sees the new token.
    pub fn update_credential(&mut self, credential: Credential) -> Vec<ConnectionAction> {
        self.credential = credential;

        if self.state != ConnectionState::Connected {
            return Vec::new();
        }

        tracing::info!(room = %self.room_id, "credential rotated, reconnecting");

        let mut actions = self.disconnect();
        actions.extend(self.connect());
        actions
    }

    /// Socket `link` finished its handshake.
    pub fn handle_open(&mut self, link: LinkId) -> Vec<ConnectionAction> {
        if self.link != LinkPhase::Opening(link) {
            tracing::debug!(room = %self.room_id, %link, "ignoring open of stale link");
            return Vec::new();
        }

        self.link = LinkPhase::Open(link);
        self.reconnect.reset();
        self.failure = None;

        let mut actions = Vec::new();
        self.transition(ConnectionState::Connected, &mut actions);

        self.heartbeat.start();
        actions.push(ConnectionAction::StartHeartbeat { interval: self.heartbeat.interval() });
        actions.push(ConnectionAction::FetchHistory { link });

        actions
    }

    /// Socket `link` closed with `code`. A transport failure without a close
    /// frame is reported as [`close_code::ABNORMAL`].
    pub fn handle_close(&mut self, link: LinkId, code: u16) -> Vec<ConnectionAction> {
        if self.link.id() != Some(link) {
            tracing::debug!(room = %self.room_id, %link, code, "ignoring close of stale link");
            return Vec::new();
        }

        self.link = LinkPhase::Idle;

        let mut actions = Vec::new();
        self.stop_heartbeat(&mut actions);

        match CloseKind::classify(code) {
            CloseKind::Normal => {
                tracing::info!(room = %self.room_id, "server closed normally");
                self.transition(ConnectionState::Disconnected, &mut actions);
            },
            CloseKind::AuthFailed => {
                tracing::warn!(room = %self.room_id, "credential rejected");
                self.failure = Some(ConnectionError::Unauthorized);
                self.transition(ConnectionState::AuthError, &mut actions);
            },
            CloseKind::Transient => {
                tracing::info!(room = %self.room_id, code, "link dropped");
                self.schedule_reconnect(&mut actions);
            },
        }

        actions
    }

    /// The transport could not be constructed for `link` at all, for example
    /// because the URL was rejected. Moves to `Failed` without retrying.
    pub fn handle_unavailable(&mut self, link: LinkId, reason: String) -> Vec<ConnectionAction> {
        if self.link != LinkPhase::Opening(link) {
            tracing::debug!(room = %self.room_id, %link, "ignoring failure of stale link");
            return Vec::new();
        }

        self.link = LinkPhase::Idle;

        let mut actions = Vec::new();
        tracing::warn!(room = %self.room_id, %reason, "cannot construct transport");
        self.fail(ConnectionError::InvalidEndpoint(reason), &mut actions);
        actions
    }

    /// Text frame received on `link`.
    ///
    /// Undecodable frames are logged and dropped; unknown frame types are
    /// ignored. Neither affects the connection.
    pub fn handle_frame(&mut self, link: LinkId, text: &str) -> Vec<ConnectionAction> {
        if self.link != LinkPhase::Open(link) {
            tracing::debug!(room = %self.room_id, %link, "ignoring frame from stale link");
            return Vec::new();
        }

        match WireFrame::decode(text) {
            Ok(Some(frame)) => self.handle_wire_frame(frame),
            Ok(None) => {
                tracing::debug!(room = %self.room_id, "ignoring frame of unknown type");
                Vec::new()
            },
            Err(error) => {
                tracing::warn!(room = %self.room_id, %error, "dropping undecodable frame");
                Vec::new()
            },
        }
    }

    fn handle_wire_frame(&mut self, frame: WireFrame) -> Vec<ConnectionAction> {
        match frame {
            WireFrame::ChatMessage { message: ChatBody::Delivered(message) } => {
                let remote = message.sender_id != self.local_user;
                let mut actions = vec![ConnectionAction::Deliver(RoomEvent::Message(message))];
                if remote {
                    actions.push(ConnectionAction::MarkRead);
                }
                actions
            },
            WireFrame::ChatMessage { message: ChatBody::Text(_) } => {
                tracing::debug!(room = %self.room_id, "ignoring chat_message without a stored message");
                Vec::new()
            },
            WireFrame::Typing { sender_id } => {
                vec![ConnectionAction::Deliver(RoomEvent::Typing { sender_id })]
            },
            WireFrame::ChatHistory { messages } => {
                vec![ConnectionAction::Deliver(RoomEvent::History(messages))]
            },
            WireFrame::Pong => {
                self.heartbeat.pong_received();
                Vec::new()
            },
            WireFrame::Ping => Vec::new(),
        }
    }

    /// Backlog fetched for `link`. Dropped unless that socket is still the
    /// open one.
    pub fn history_loaded(
        &mut self,
        link: LinkId,
        messages: Vec<parley_proto::Message>,
    ) -> Vec<ConnectionAction> {
        if self.link != LinkPhase::Open(link) {
            tracing::debug!(room = %self.room_id, %link, "dropping history for stale link");
            return Vec::new();
        }

        vec![ConnectionAction::Deliver(RoomEvent::History(messages))]
    }

    /// Reconnect delay elapsed.
    pub fn reconnect_timer_fired(&mut self) -> Vec<ConnectionAction> {
        if !self.reconnect_pending || self.disconnect_requested {
            tracing::debug!(room = %self.room_id, "ignoring stale reconnect timer");
            return Vec::new();
        }

        self.reconnect_pending = false;
        tracing::info!(
            room = %self.room_id,
            attempt = self.reconnect.attempt_count(),
            "reconnecting"
        );
        self.begin_attempt()
    }

    /// Heartbeat interval elapsed.
    pub fn heartbeat_fired(&mut self) -> Vec<ConnectionAction> {
        let LinkPhase::Open(link) = self.link else {
            return Vec::new();
        };

        match self.heartbeat.beat() {
            Beat::Idle => Vec::new(),
            Beat::Ping => vec![ConnectionAction::Send(WireFrame::Ping)],
            Beat::Expired { unanswered } => {
                tracing::warn!(room = %self.room_id, unanswered, "peer stopped answering pings");

                let mut actions = vec![ConnectionAction::Close {
                    link,
                    code: close_code::LIVENESS_TIMEOUT,
                    reason: "heartbeat timeout".to_string(),
                }];
                actions.extend(self.handle_close(link, close_code::LIVENESS_TIMEOUT));
                actions
            },
        }
    }

    /// Send a chat message.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected` unless `Connected`
    /// - `SendError::EmptyMessage` if `text` is blank
    pub fn send_message(&self, text: &str) -> Result<Vec<ConnectionAction>, SendError> {
        self.ensure_connected()?;

        if text.trim().is_empty() {
            return Err(SendError::EmptyMessage);
        }

        Ok(vec![ConnectionAction::Send(WireFrame::chat_message(text))])
    }

    /// Tell the room the local user is typing.
    ///
    /// # Errors
    ///
    /// - `SendError::NotConnected` unless `Connected`
    pub fn send_typing(&self) -> Result<Vec<ConnectionAction>, SendError> {
        self.ensure_connected()?;
        Ok(vec![ConnectionAction::Send(WireFrame::typing())])
    }

    fn ensure_connected(&self) -> Result<(), SendError> {
        if self.state == ConnectionState::Connected && self.is_link_open() {
            Ok(())
        } else {
            Err(SendError::NotConnected { state: self.state })
        }
    }

    fn begin_attempt(&mut self) -> Vec<ConnectionAction> {
        let mut actions = Vec::new();
        self.disconnect_requested = false;

        match self.endpoint.room_url(&self.room_id, &self.credential) {
            Ok(url) => {
                let link = LinkId(self.next_link);
                self.next_link += 1;
                self.link = LinkPhase::Opening(link);

                self.transition(ConnectionState::Connecting, &mut actions);
                tracing::debug!(room = %self.room_id, %link, "opening link");
                actions.push(ConnectionAction::Open { link, url });
            },
            Err(error) => {
                tracing::warn!(room = %self.room_id, %error, "cannot construct transport");
                self.fail(error, &mut actions);
            },
        }

        actions
    }

    fn schedule_reconnect(&mut self, actions: &mut Vec<ConnectionAction>) {
        match self.reconnect.next_attempt() {
            Some((attempt, delay)) => {
                self.reconnect_pending = true;
                self.transition(ConnectionState::Connecting, actions);
                tracing::info!(room = %self.room_id, attempt, ?delay, "reconnect scheduled");
                actions.push(ConnectionAction::ScheduleReconnect { delay, attempt });
            },
            None => {
                let attempts = self.reconnect.policy().max_attempts;
                tracing::warn!(room = %self.room_id, attempts, "reconnect budget exhausted");
                self.fail(ConnectionError::RetriesExhausted { attempts }, actions);
            },
        }
    }

    fn stop_heartbeat(&mut self, actions: &mut Vec<ConnectionAction>) {
        if self.heartbeat.stop() {
            actions.push(ConnectionAction::StopHeartbeat);
        }
    }

    fn fail(&mut self, error: ConnectionError, actions: &mut Vec<ConnectionAction>) {
        self.failure = Some(error);
        self.transition(ConnectionState::Failed, actions);
    }

    fn transition(&mut self, next: ConnectionState, actions: &mut Vec<ConnectionAction>) {
        if self.state == next {
            return;
        }

        tracing::info!(room = %self.room_id, from = %self.state, to = %next, "connection state changed");
        self.state = next;
        actions.push(ConnectionAction::StatusChanged(next));
    }
}
