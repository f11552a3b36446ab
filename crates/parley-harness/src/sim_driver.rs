//! Synchronous driver for a connection manager.
//!
//! `SimDriver` executes [`ConnectionAction`]s the way the tokio session does,
//! but records resources as plain flags instead of spawning tasks. Timers
//! fire only when an [`Operation`] says so, which makes every interleaving
//! reachable from a generated operation sequence.

use std::collections::BTreeSet;

use parley_core::{
    ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, Credential, Endpoint,
    LinkId, RoomEvent, RoomId, SendError, UserId,
};
use parley_proto::WireFrame;

use crate::{
    invariants::{InvariantRegistry, SessionSnapshot},
    model::Operation,
};

/// Local user of simulated sessions.
pub const SIM_LOCAL_USER: &str = "local";

/// Socket base of simulated sessions.
pub const SIM_ENDPOINT: &str = "ws://sim.invalid/ws/chat";

/// Manager plus the resources a driver would hold for it.
pub struct SimDriver {
    manager: ConnectionManager,
    links: BTreeSet<LinkId>,
    retired: Option<LinkId>,
    heartbeat_armed: bool,
    reconnect_armed: bool,
    history_for: Option<LinkId>,
    frame_seq: u64,
    sent: Vec<WireFrame>,
    orphan_sends: usize,
    delivered: Vec<RoomEvent>,
    statuses: Vec<ConnectionState>,
    mark_reads: usize,
    send_errors: Vec<SendError>,
    invariants: Option<InvariantRegistry>,
}

impl SimDriver {
    /// Driver for a fresh manager in room `lobby`.
    #[allow(clippy::expect_used)]
    pub fn new(config: ConnectionConfig) -> Self {
        let endpoint = Endpoint::parse(SIM_ENDPOINT)
            .expect("invariant: simulated endpoint literal is a valid ws URL");
        let manager = ConnectionManager::new(
            RoomId::from("lobby"),
            UserId::from(SIM_LOCAL_USER),
            Credential::new("token"),
            endpoint,
            config,
        );
        Self::with_manager(manager)
    }

    /// Driver for an existing manager.
    pub fn with_manager(manager: ConnectionManager) -> Self {
        Self {
            manager,
            links: BTreeSet::new(),
            retired: None,
            heartbeat_armed: false,
            reconnect_armed: false,
            history_for: None,
            frame_seq: 0,
            sent: Vec::new(),
            orphan_sends: 0,
            delivered: Vec::new(),
            statuses: Vec::new(),
            mark_reads: 0,
            send_errors: Vec::new(),
            invariants: None,
        }
    }

    /// Check invariants after every operation.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Manager under test.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Sockets opened and not yet closed.
    pub fn open_links(&self) -> usize {
        self.links.len()
    }

    /// Reconnect timer armed.
    pub fn reconnect_armed(&self) -> bool {
        self.reconnect_armed
    }

    /// Heartbeat timer armed.
    pub fn heartbeat_armed(&self) -> bool {
        self.heartbeat_armed
    }

    /// Frames written to a socket.
    pub fn sent(&self) -> &[WireFrame] {
        &self.sent
    }

    /// Frames the manager asked to send with no socket to carry them.
    pub fn orphan_sends(&self) -> usize {
        self.orphan_sends
    }

    /// Events pushed to the caller.
    pub fn delivered(&self) -> &[RoomEvent] {
        &self.delivered
    }

    /// Status changes pushed to the caller.
    pub fn statuses(&self) -> &[ConnectionState] {
        &self.statuses
    }

    /// Mark-read calls issued.
    pub fn mark_reads(&self) -> usize {
        self.mark_reads
    }

    /// Send operations the manager rejected.
    pub fn send_errors(&self) -> &[SendError] {
        &self.send_errors
    }

    /// Feed one operation to the manager and execute the resulting actions.
    pub fn apply(&mut self, op: &Operation) {
        let actions = match op {
            Operation::Connect => self.manager.connect(),
            Operation::Disconnect => self.manager.disconnect(),
            Operation::UpdateCredential { seed } => {
                self.manager.update_credential(Credential::new(format!("token-{seed}")))
            },
            Operation::Open { stale } => match self.target(*stale) {
                Some(link) => self.manager.handle_open(link),
                None => Vec::new(),
            },
            Operation::Close { code, stale } => match self.target(*stale) {
                Some(link) => {
                    self.retire(link);
                    self.manager.handle_close(link, code.code())
                },
                None => Vec::new(),
            },
            Operation::Unavailable => match self.manager.link() {
                Some(link) if !self.manager.is_link_open() => {
                    self.retire(link);
                    self.manager.handle_unavailable(link, "simulated".to_string())
                },
                _ => Vec::new(),
            },
            Operation::Frame { kind, stale } => match self.target(*stale) {
                Some(link) => {
                    self.frame_seq += 1;
                    let text = kind.to_text(self.frame_seq, SIM_LOCAL_USER);
                    self.manager.handle_frame(link, &text)
                },
                None => Vec::new(),
            },
            Operation::HistoryLoaded => match self.history_for.take() {
                Some(link) => self.manager.history_loaded(link, Vec::new()),
                None => Vec::new(),
            },
            Operation::ReconnectTimer => {
                if std::mem::take(&mut self.reconnect_armed) {
                    self.manager.reconnect_timer_fired()
                } else {
                    Vec::new()
                }
            },
            Operation::Heartbeat => {
                if self.heartbeat_armed {
                    self.manager.heartbeat_fired()
                } else {
                    Vec::new()
                }
            },
            Operation::SendMessage { text } => {
                let result = self.manager.send_message(&text.to_text());
                self.accept_send(result)
            },
            Operation::SendTyping => {
                let result = self.manager.send_typing();
                self.accept_send(result)
            },
        };

        self.execute(actions);

        if let Some(registry) = &self.invariants {
            registry.assert_all(&SessionSnapshot::from_driver(self), &format!("after {op:?}"));
        }
    }

    fn accept_send(&mut self, result: Result<Vec<ConnectionAction>, SendError>) -> Vec<ConnectionAction> {
        result.unwrap_or_else(|error| {
            self.send_errors.push(error);
            Vec::new()
        })
    }

    fn target(&self, stale: bool) -> Option<LinkId> {
        if stale { self.retired } else { self.manager.link() }
    }

    fn retire(&mut self, link: LinkId) {
        self.links.remove(&link);
        self.retired = Some(link);
    }

    fn execute(&mut self, actions: Vec<ConnectionAction>) {
        for action in actions {
            tracing::trace!(?action, "sim execute");
            match action {
                ConnectionAction::Open { link, .. } => {
                    self.links.insert(link);
                },
                ConnectionAction::Close { link, .. } => self.retire(link),
                ConnectionAction::Send(frame) => {
                    let carried = self.manager.link().is_some_and(|link| self.links.contains(&link))
                        && self.manager.is_link_open();
                    if carried {
                        self.sent.push(frame);
                    } else {
                        self.orphan_sends += 1;
                    }
                },
                ConnectionAction::StartHeartbeat { .. } => self.heartbeat_armed = true,
                ConnectionAction::StopHeartbeat => self.heartbeat_armed = false,
                ConnectionAction::ScheduleReconnect { .. } => self.reconnect_armed = true,
                ConnectionAction::CancelReconnect => self.reconnect_armed = false,
                ConnectionAction::FetchHistory { link } => self.history_for = Some(link),
                ConnectionAction::MarkRead => self.mark_reads += 1,
                ConnectionAction::Deliver(event) => self.delivered.push(event),
                ConnectionAction::StatusChanged(state) => self.statuses.push(state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CloseCode, FrameKind};

    fn driver() -> SimDriver {
        SimDriver::new(ConnectionConfig::default()).with_invariants(InvariantRegistry::standard())
    }

    #[test]
    fn connect_open_close_cycle() {
        let mut driver = driver();
        driver.apply(&Operation::Connect);
        driver.apply(&Operation::Open { stale: false });
        assert_eq!(driver.manager().state(), ConnectionState::Connected);
        assert_eq!(driver.open_links(), 1);

        driver.apply(&Operation::Close { code: CloseCode::Abnormal, stale: false });
        assert!(driver.reconnect_armed());
        assert_eq!(driver.open_links(), 0);

        driver.apply(&Operation::ReconnectTimer);
        driver.apply(&Operation::Open { stale: false });
        assert_eq!(driver.statuses(), &[
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
        ]);
    }

    #[test]
    fn remote_messages_mark_read_once_each() {
        let mut driver = driver();
        driver.apply(&Operation::Connect);
        driver.apply(&Operation::Open { stale: false });

        driver.apply(&Operation::Frame { kind: FrameKind::RemoteMessage, stale: false });
        driver.apply(&Operation::Frame { kind: FrameKind::OwnMessage, stale: false });
        driver.apply(&Operation::Frame { kind: FrameKind::RemoteMessage, stale: false });

        assert_eq!(driver.mark_reads(), 2);
        assert_eq!(driver.delivered().len(), 3);
    }

    #[test]
    fn pings_only_while_connected() {
        let mut driver = driver();
        driver.apply(&Operation::Heartbeat);
        driver.apply(&Operation::Connect);
        driver.apply(&Operation::Heartbeat);
        assert!(driver.sent().is_empty());

        driver.apply(&Operation::Open { stale: false });
        driver.apply(&Operation::Heartbeat);
        driver.apply(&Operation::Heartbeat);
        assert_eq!(driver.sent(), &[WireFrame::Ping, WireFrame::Ping]);
    }
}
