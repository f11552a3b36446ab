//! Socket abstraction.
//!
//! A [`Link`] is one socket bridged to a pair of channels: the session writes
//! [`Outbound`] items and reads [`Inbound`] items, while a task owned by the
//! connector does the actual I/O.

use std::future::Future;

use tokio::{sync::mpsc, task::AbortHandle};
use url::Url;

use crate::error::TransportError;

/// Items the session hands to the socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Text frame
    Text(String),
    /// Send a close frame and stop
    Close {
        /// Close code
        code: u16,
        /// Close reason
        reason: String,
    },
}

/// Items the socket task hands to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Text frame
    Text(String),
    /// Socket closed. A drop without a close frame reports
    /// [`parley_proto::close_code::ABNORMAL`].
    Closed {
        /// Close code
        code: u16,
    },
}

/// Opens sockets.
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `url`.
    ///
    /// # Errors
    ///
    /// - `TransportError::InvalidEndpoint` if the socket cannot be constructed
    ///   for this URL at all
    /// - `TransportError::Connect` or `TransportError::Timeout` if the open
    ///   failed and may be retried
    fn connect(&self, url: Url) -> impl Future<Output = Result<Link, TransportError>> + Send;
}

/// Handle to an open socket.
pub struct Link {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    abort_handle: Option<AbortHandle>,
}

impl Link {
    /// Bridge channels to a socket task. `abort_handle` stops that task.
    pub fn new(
        outbound: mpsc::UnboundedSender<Outbound>,
        inbound: mpsc::UnboundedReceiver<Inbound>,
        abort_handle: Option<AbortHandle>,
    ) -> Self {
        Self { outbound, inbound, abort_handle }
    }

    /// Split into the writing half and the inbound stream.
    pub fn into_parts(self) -> (LinkWriter, mpsc::UnboundedReceiver<Inbound>) {
        (LinkWriter { outbound: self.outbound, abort_handle: self.abort_handle }, self.inbound)
    }
}

/// Writing half of a [`Link`].
pub struct LinkWriter {
    outbound: mpsc::UnboundedSender<Outbound>,
    abort_handle: Option<AbortHandle>,
}

impl LinkWriter {
    /// Queue a text frame. Returns false if the socket task is gone.
    pub fn send_text(&self, text: String) -> bool {
        self.outbound.send(Outbound::Text(text)).is_ok()
    }

    /// Ask the socket task to close with `code`. If the task is already gone
    /// it is aborted instead.
    pub fn close(self, code: u16, reason: String) {
        if self.outbound.send(Outbound::Close { code, reason }).is_err() {
            self.abort();
        }
    }

    /// Stop the socket task without a close handshake.
    pub fn abort(&self) {
        if let Some(handle) = &self.abort_handle {
            handle.abort();
        }
    }
}
