//! Room session tests against the in-memory connector.
//!
//! Every test runs on a paused clock, so timer-driven behaviour (backoff,
//! heartbeats) is observed at exact virtual times.

use std::time::Duration;

use parley_client::{
    ConnectionConfig, ConnectionState, Credential, Endpoint, Message, Outbound, RoomEvent, RoomId,
    RoomSession, SessionError, SessionStreams, UserId,
};
use parley_core::{ConnectionError, SendError};
use parley_harness::{
    Dial, InvariantRegistry, SessionSnapshot, SimConnector, SimLink, SimNetwork, SimRoomService,
};
use parley_proto::WireFrame;
use tokio::time::{self, Instant};

struct Fixture {
    session: RoomSession<SimConnector, SimRoomService>,
    streams: SessionStreams,
    network: SimNetwork,
    service: SimRoomService,
    last_status: Option<ConnectionState>,
    registry: InvariantRegistry,
}

fn fixture() -> Fixture {
    fixture_with("42", ConnectionConfig::default())
}

fn fixture_with(room: &str, config: ConnectionConfig) -> Fixture {
    let (connector, network) = SimConnector::new();
    let service = SimRoomService::new();
    let (session, streams) = RoomSession::open(
        RoomId::from(room),
        UserId::from("alice"),
        Credential::new("token-1"),
        Endpoint::parse("ws://chat.test/ws/chat").unwrap(),
        config,
        connector,
        service.clone(),
    );

    Fixture {
        session,
        streams,
        network,
        service,
        last_status: None,
        registry: InvariantRegistry::standard(),
    }
}

impl Fixture {
    async fn next_status(&mut self) -> ConnectionState {
        let status = self.streams.status.recv().await.unwrap();
        self.last_status = Some(status);
        status
    }

    async fn next_event(&mut self) -> RoomEvent {
        self.streams.events.recv().await.unwrap()
    }

    fn check(&self, context: &str) {
        let snapshot = SessionSnapshot::from_resources(self.session.resources(), self.last_status);
        self.registry.assert_all(&snapshot, context);
    }

    async fn connected(&mut self) -> SimLink {
        self.session.connect().unwrap();
        assert_eq!(self.next_status().await, ConnectionState::Connecting);
        self.check("connecting");

        let link = self.network.accept().await.unwrap();
        assert_eq!(self.next_status().await, ConnectionState::Connected);
        self.check("connected");
        link
    }
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn chat_frame(id: u64, sender: &str) -> String {
    format!(
        r#"{{"type":"chat_message","message":{{"id":{id},"senderId":"{sender}","content":"hi","timestampDisplay":"09:30"}}}}"#
    )
}

#[tokio::test(start_paused = true)]
async fn connect_opens_room_socket_and_loads_history() {
    let mut f = fixture();
    let backlog = vec![Message::pending(7u64.into(), UserId::from("bob"), "earlier")];
    f.service.set_history(backlog.clone());

    let link = f.connected().await;
    assert_eq!(link.url.as_str(), "ws://chat.test/ws/chat/42/?token=token-1");
    assert_eq!(f.next_event().await, RoomEvent::History(backlog));
    assert_eq!(f.service.tokens_seen(), vec!["token-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn abnormal_close_reconnects_after_base_interval() {
    let mut f = fixture();
    let link = f.connected().await;

    let dropped = Instant::now();
    link.close(1006);
    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    assert_eq!(f.session.attempt_count(), 1);
    f.check("backing off");

    let _link = f.network.accept().await.unwrap();
    let waited = dropped.elapsed();
    assert!(waited >= Duration::from_millis(3000), "reconnected after {waited:?}");
    assert!(waited < Duration::from_millis(3100), "reconnected after {waited:?}");

    assert_eq!(f.next_status().await, ConnectionState::Connected);
    assert_eq!(f.session.attempt_count(), 0);
    f.check("reconnected");
}

#[tokio::test(start_paused = true)]
async fn severed_link_counts_as_abnormal_close() {
    let mut f = fixture();
    let link = f.connected().await;

    link.sever();
    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    assert_eq!(f.session.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn auth_failure_is_terminal() {
    let mut f = fixture();
    let link = f.connected().await;

    link.close(4003);
    assert_eq!(f.next_status().await, ConnectionState::AuthError);
    f.check("auth error");

    time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.network.dial_count(), 1);
    assert_eq!(f.session.attempt_count(), 0);
    assert_eq!(f.session.failure(), Some(ConnectionError::Unauthorized));
    f.check("auth error after wait");
}

#[tokio::test(start_paused = true)]
async fn normal_close_disconnects_without_retry() {
    let mut f = fixture();
    let link = f.connected().await;

    link.close(1000);
    assert_eq!(f.next_status().await, ConnectionState::Disconnected);

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.network.dial_count(), 1);
    f.check("closed normally");
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_five_failed_reconnects() {
    let mut f = fixture();
    f.network.script([Dial::Refuse; 5]);
    let link = f.connected().await;

    let dropped = Instant::now();
    link.close(1006);
    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    assert_eq!(f.next_status().await, ConnectionState::Failed);

    // 3 + 6 + 9 + 12 + 15 seconds of backoff
    assert_eq!(dropped.elapsed().as_secs(), 45);
    assert_eq!(f.network.dial_count(), 6);
    assert_eq!(f.session.failure(), Some(ConnectionError::RetriesExhausted { attempts: 5 }));
    f.check("failed");

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.network.dial_count(), 6);

    let _link = f.connected().await;
    assert_eq!(f.session.attempt_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn remote_message_is_marked_read_once() {
    let mut f = fixture();
    let link = f.connected().await;
    assert_eq!(f.next_event().await, RoomEvent::History(Vec::new()));

    link.push_text(chat_frame(1, "bob"));
    let RoomEvent::Message(message) = f.next_event().await else {
        panic!("expected a message");
    };
    assert_eq!(message.sender_id, UserId::from("bob"));
    assert_eq!(message.timestamp_display, "09:30");

    settle().await;
    assert_eq!(f.service.mark_read_calls(), vec![RoomId::from("42")]);

    link.push_text(chat_frame(2, "alice"));
    assert!(matches!(f.next_event().await, RoomEvent::Message(_)));
    settle().await;
    assert_eq!(f.service.mark_read_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn mark_read_failure_is_only_logged() {
    let mut f = fixture();
    f.service.fail_mark_read(true);
    let link = f.connected().await;
    f.next_event().await;

    link.push_text(chat_frame(1, "bob"));
    f.next_event().await;
    settle().await;

    assert_eq!(f.service.mark_read_calls().len(), 1);
    assert_eq!(f.session.state(), ConnectionState::Connected);
    assert!(f.streams.status.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn history_failure_is_only_logged() {
    let mut f = fixture();
    f.service.fail_history(true);
    let _link = f.connected().await;

    settle().await;
    assert_eq!(f.service.history_calls(), 1);
    assert!(f.streams.events.try_recv().is_err());
    assert_eq!(f.session.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn typing_and_pushed_history_are_forwarded() {
    let mut f = fixture();
    let link = f.connected().await;
    f.next_event().await;

    link.push_text(r#"{"type":"typing","sender_id":"bob"}"#);
    assert_eq!(f.next_event().await, RoomEvent::Typing { sender_id: Some(UserId::from("bob")) });

    link.push_text("garbage");
    link.push_text(r#"{"type":"presence"}"#);
    link.push_frame(&WireFrame::ChatHistory { messages: Vec::new() });
    assert_eq!(f.next_event().await, RoomEvent::History(Vec::new()));
    assert_eq!(f.session.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn send_while_connecting_fails_and_transmits_nothing() {
    let mut f = fixture();
    f.session.connect().unwrap();
    assert_eq!(f.next_status().await, ConnectionState::Connecting);

    assert_eq!(
        f.session.send_message("hi"),
        Err(SessionError::Send(SendError::NotConnected { state: ConnectionState::Connecting }))
    );
    assert!(!f.session.send_typing());

    let mut link = f.network.accept().await.unwrap();
    assert_eq!(f.next_status().await, ConnectionState::Connected);
    assert!(link.drain().is_empty());

    f.session.send_message("hello").unwrap();
    assert!(f.session.send_typing());
    assert_eq!(link.drain_frames(), vec![WireFrame::chat_message("hello"), WireFrame::typing()]);

    assert_eq!(f.session.send_message(" \n"), Err(SessionError::Send(SendError::EmptyMessage)));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_every_interval_while_connected() {
    let mut f = fixture();
    let mut link = f.connected().await;
    let opened = Instant::now();

    for beat in 1..=3 {
        assert_eq!(link.next_outbound().await, Some(Outbound::Text(r#"{"type":"ping"}"#.to_string())));
        assert_eq!(opened.elapsed().as_secs(), 30 * beat);
    }

    f.session.disconnect();
    assert_eq!(
        link.next_outbound().await,
        Some(Outbound::Close { code: 1000, reason: "client disconnect".to_string() })
    );
    assert_eq!(link.next_outbound().await, None);
    assert_eq!(f.next_status().await, ConnectionState::Disconnected);
    f.check("disconnected");
}

#[tokio::test(start_paused = true)]
async fn missed_pongs_close_and_reconnect() {
    let config = ConnectionConfig { missed_pong_limit: Some(2), ..ConnectionConfig::default() };
    let mut f = fixture_with("42", config);
    let mut link = f.connected().await;

    assert!(matches!(link.next_outbound().await, Some(Outbound::Text(_))));
    assert!(matches!(link.next_outbound().await, Some(Outbound::Text(_))));
    assert!(matches!(link.next_outbound().await, Some(Outbound::Close { code: 4000, .. })));

    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    let _link = f.network.accept().await.unwrap();
    assert_eq!(f.next_status().await, ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn pongs_keep_the_link_alive() {
    let config = ConnectionConfig { missed_pong_limit: Some(1), ..ConnectionConfig::default() };
    let mut f = fixture_with("42", config);
    let mut link = f.connected().await;

    for _ in 0..4 {
        assert!(matches!(link.next_outbound().await, Some(Outbound::Text(_))));
        link.push_frame(&WireFrame::Pong);
    }
    assert_eq!(f.session.state(), ConnectionState::Connected);
    assert_eq!(f.network.dial_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_backoff_cancels_reconnect() {
    let mut f = fixture();
    let link = f.connected().await;

    link.close(1006);
    assert_eq!(f.next_status().await, ConnectionState::Connecting);

    f.session.disconnect();
    assert_eq!(f.next_status().await, ConnectionState::Disconnected);
    f.check("disconnected during backoff");

    f.session.disconnect();
    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.network.dial_count(), 1);
    assert!(f.streams.status.try_recv().is_err());
    f.check("after second disconnect");
}

#[tokio::test(start_paused = true)]
async fn disconnect_while_opening_abandons_the_dial() {
    let mut f = fixture();
    f.session.connect().unwrap();
    assert_eq!(f.next_status().await, ConnectionState::Connecting);

    f.session.disconnect();
    assert_eq!(f.next_status().await, ConnectionState::Disconnected);
    f.check("disconnected while opening");

    settle().await;
    assert_eq!(f.session.state(), ConnectionState::Disconnected);
    assert!(f.streams.status.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_closes_the_socket() {
    let mut f = fixture();
    let mut link = f.connected().await;

    let Fixture { session, mut streams, .. } = f;
    drop(session);

    assert!(matches!(link.next_outbound().await, Some(Outbound::Close { code: 1000, .. })));
    assert_eq!(streams.status.recv().await, Some(ConnectionState::Disconnected));
}

#[tokio::test(start_paused = true)]
async fn credential_update_reconnects_with_new_token() {
    let mut f = fixture();
    let mut link = f.connected().await;

    f.session.update_credential(Credential::new("token-2"));
    assert_eq!(f.next_status().await, ConnectionState::Disconnected);
    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    assert!(matches!(link.next_outbound().await, Some(Outbound::Close { code: 1000, .. })));

    let fresh = f.network.accept().await.unwrap();
    assert_eq!(fresh.url.query(), Some("token=token-2"));
    assert_eq!(f.next_status().await, ConnectionState::Connected);
    f.check("reconnected with new token");
}

#[tokio::test(start_paused = true)]
async fn credential_update_after_auth_error_then_connect() {
    let mut f = fixture();
    let link = f.connected().await;
    link.close(4003);
    assert_eq!(f.next_status().await, ConnectionState::AuthError);

    f.session.update_credential(Credential::new("token-2"));
    assert!(f.streams.status.try_recv().is_err());

    let fresh = f.connected().await;
    assert_eq!(fresh.url.query(), Some("token=token-2"));
}

#[tokio::test(start_paused = true)]
async fn unusable_endpoint_fails_without_retry() {
    let mut f = fixture();
    f.network.script([Dial::Unavailable]);

    f.session.connect().unwrap();
    assert_eq!(f.next_status().await, ConnectionState::Connecting);
    assert_eq!(f.next_status().await, ConnectionState::Failed);

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(f.network.dial_count(), 1);
    assert!(matches!(f.session.failure(), Some(ConnectionError::InvalidEndpoint(_))));
    f.check("unusable endpoint");
}

#[tokio::test(start_paused = true)]
async fn empty_room_fails_synchronously() {
    let mut f = fixture_with("", ConnectionConfig::default());

    let result = f.session.connect();
    assert!(matches!(result, Err(SessionError::Connection(ConnectionError::InvalidEndpoint(_)))));
    assert_eq!(f.next_status().await, ConnectionState::Failed);
    assert_eq!(f.network.dial_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn second_connect_is_a_no_op() {
    let mut f = fixture();
    let _link = f.connected().await;

    f.session.connect().unwrap();
    settle().await;
    assert_eq!(f.network.dial_count(), 1);
    assert!(f.streams.status.try_recv().is_err());
}
