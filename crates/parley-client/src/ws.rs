//! WebSocket transport.
//!
//! [`WsConnector`] opens a `tokio-tungstenite` socket and spawns a task that
//! bridges it to a [`Link`]. The task stops when the session asks it to
//! close, when the session drops its writer, or when the socket ends.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parley_proto::close_code;
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self, Message,
        client::IntoClientRequest,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use url::Url;

use crate::{
    error::TransportError,
    transport::{Connector, Inbound, Link, Outbound},
};

/// Time allowed for the TCP, TLS and WebSocket handshakes together.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsConnectorConfig {
    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl Default for WsConnectorConfig {
    fn default() -> Self {
        Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

/// [`Connector`] over `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    config: WsConnectorConfig,
}

impl WsConnector {
    /// Connector with `config`.
    pub fn new(config: WsConnectorConfig) -> Self {
        Self { config }
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: Url) -> impl Future<Output = Result<Link, TransportError>> + Send {
        let timeout = self.config.connect_timeout;

        async move {
            let request = url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

            let (socket, _) = tokio::time::timeout(timeout, connect_async(request))
                .await
                .map_err(|_| TransportError::Timeout(timeout))?
                .map_err(classify)?;

            tracing::debug!(host = url.host_str().unwrap_or_default(), "socket open");

            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let handle = tokio::spawn(run_socket(socket, outbound_rx, inbound_tx));

            Ok(Link::new(outbound_tx, inbound_rx, Some(handle.abort_handle())))
        }
    }
}

fn classify(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::Url(e) => TransportError::InvalidEndpoint(e.to_string()),
        other => TransportError::Connect(other.to_string()),
    }
}

/// Bridge the socket and the link channels until either side stops.
async fn run_socket(
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<Inbound>,
) {
    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound.send(Inbound::Text(text.as_str().to_owned())).is_err() {
                            break;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(close_code::NO_STATUS, |f| u16::from(f.code));
                        tracing::debug!(code, "peer closed socket");
                        let _ = inbound.send(Inbound::Closed { code });
                        // Flushes the queued close reply
                        let _ = sink.close().await;
                        break;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "socket error");
                        let _ = inbound.send(Inbound::Closed { code: close_code::ABNORMAL });
                        break;
                    },
                    None => {
                        let _ = inbound.send(Inbound::Closed { code: close_code::ABNORMAL });
                        break;
                    },
                }
            },

            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::warn!(error = %e, "failed to send frame");
                            let _ = inbound.send(Inbound::Closed { code: close_code::ABNORMAL });
                            break;
                        }
                    },
                    Some(Outbound::Close { code, reason }) => {
                        let frame =
                            CloseFrame { code: CloseCode::from(code), reason: reason.into() };
                        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                            tracing::debug!(error = %e, "failed to send close frame");
                        }
                        break;
                    },
                    None => {
                        let _ = sink.close().await;
                        break;
                    },
                }
            },
        }
    }
}
