//! In-memory connector.
//!
//! [`SimConnector`] hands the session channel-backed links. The test keeps
//! the paired [`SimNetwork`] and plays the server: it accepts each link as a
//! [`SimLink`], pushes frames, closes with chosen codes and inspects what the
//! client wrote. Dial outcomes can be scripted ahead of time.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use parley_client::{Connector, Inbound, Link, Outbound, TransportError};
use parley_proto::WireFrame;
use tokio::sync::mpsc;
use url::Url;

/// Outcome of one dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dial {
    /// Open a link
    Accept,
    /// Fail with a transient connect error
    Refuse,
    /// Fail as if the URL could not be used at all
    Unavailable,
}

#[derive(Default)]
struct NetworkState {
    script: VecDeque<Dial>,
    dialed: Vec<Url>,
}

fn lock(state: &Mutex<NetworkState>) -> MutexGuard<'_, NetworkState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector side, owned by the session.
pub struct SimConnector {
    state: Arc<Mutex<NetworkState>>,
    accepted: mpsc::UnboundedSender<SimLink>,
}

/// Server side, kept by the test.
pub struct SimNetwork {
    state: Arc<Mutex<NetworkState>>,
    accepted: mpsc::UnboundedReceiver<SimLink>,
}

impl SimConnector {
    /// Create a connector and the network handle controlling it.
    pub fn new() -> (Self, SimNetwork) {
        let state = Arc::new(Mutex::new(NetworkState::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { state: Arc::clone(&state), accepted: tx },
            SimNetwork { state, accepted: rx },
        )
    }
}

impl Connector for SimConnector {
    fn connect(&self, url: Url) -> impl Future<Output = Result<Link, TransportError>> + Send {
        let dial = {
            let mut state = lock(&self.state);
            state.dialed.push(url.clone());
            state.script.pop_front().unwrap_or(Dial::Accept)
        };
        let accepted = self.accepted.clone();

        async move {
            match dial {
                Dial::Accept => {
                    let (to_server, from_client) = mpsc::unbounded_channel();
                    let (to_client, from_server) = mpsc::unbounded_channel();
                    // The network handle may be gone; the link then just idles.
                    let _ = accepted.send(SimLink { url, from_client, to_client });
                    Ok(Link::new(to_server, from_server, None))
                },
                Dial::Refuse => Err(TransportError::Connect("connection refused".to_string())),
                Dial::Unavailable => {
                    Err(TransportError::InvalidEndpoint(format!("cannot dial {url}")))
                },
            }
        }
    }
}

impl SimNetwork {
    /// Queue outcomes for upcoming dials. Unscripted dials are accepted.
    pub fn script(&self, dials: impl IntoIterator<Item = Dial>) {
        lock(&self.state).script.extend(dials);
    }

    /// Dials made so far.
    pub fn dial_count(&self) -> usize {
        lock(&self.state).dialed.len()
    }

    /// URLs dialed so far, in order.
    pub fn dialed(&self) -> Vec<Url> {
        lock(&self.state).dialed.clone()
    }

    /// Wait for the next accepted link.
    pub async fn accept(&mut self) -> Option<SimLink> {
        self.accepted.recv().await
    }

    /// Next accepted link, if one is ready.
    pub fn try_accept(&mut self) -> Option<SimLink> {
        self.accepted.try_recv().ok()
    }
}

/// Server end of one link.
pub struct SimLink {
    /// URL the client dialed
    pub url: Url,
    from_client: mpsc::UnboundedReceiver<Outbound>,
    to_client: mpsc::UnboundedSender<Inbound>,
}

impl SimLink {
    /// Push raw text to the client.
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(Inbound::Text(text.into())).is_ok()
    }

    /// Push an encoded frame to the client.
    pub fn push_frame(&self, frame: &WireFrame) -> bool {
        frame.encode().is_ok_and(|text| self.push_text(text))
    }

    /// Close the link with `code`.
    pub fn close(self, code: u16) {
        let _ = self.to_client.send(Inbound::Closed { code });
    }

    /// Drop the link without a close frame.
    pub fn sever(self) {}

    /// Everything the client has written so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        std::iter::from_fn(|| self.from_client.try_recv().ok()).collect()
    }

    /// Wait for the client's next write. `None` once the client dropped its
    /// writer.
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.from_client.recv().await
    }

    /// Decoded text frames the client has written so far.
    pub fn drain_frames(&mut self) -> Vec<WireFrame> {
        self.drain()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Text(text) => WireFrame::decode(&text).ok().flatten(),
                Outbound::Close { .. } => None,
            })
            .collect()
    }
}
