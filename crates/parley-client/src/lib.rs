//! Client
//!
//! Tokio driver for Parley room sessions. Executes the actions produced by
//! [`parley_core::ConnectionManager`]: opens sockets through a
//! [`Connector`], arms heartbeat and reconnect timers, calls the REST
//! collaborator through a [`RoomService`] and forwards events to the caller.
//!
//! # Components
//!
//! - [`RoomSession`]: One room's session handle
//! - [`Connector`] and [`Link`]: Socket abstraction
//! - [`RoomService`]: History, read receipts and room listing
//!
//! # Optional backends
//!
//! - `transport`: [`ws::WsConnector`] over `tokio-tungstenite`
//! - `http`: [`http::HttpRoomService`] over `reqwest`

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod service;
mod session;
mod transport;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "transport")]
pub mod ws;

pub use error::{ServiceError, SessionError, TransportError};
pub use parley_core::{
    ConnectionConfig, ConnectionState, Credential, Endpoint, Message, RoomEvent, RoomId, UserId,
};
pub use service::{RoomService, RoomSummary};
pub use session::{RoomSession, SessionResources, SessionStreams};
pub use transport::{Connector, Inbound, Link, LinkWriter, Outbound};
