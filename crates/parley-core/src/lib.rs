//! Parley core
//!
//! Pure state machines for a room chat connection. Nothing in this crate
//! performs I/O, spawns tasks or reads a clock: operations take their inputs
//! as parameters and return [`ConnectionAction`]s for a driver to execute.
//!
//! # Components
//!
//! - [`ConnectionManager`]: Lifecycle, reconnection and frame dispatch for one
//!   room
//! - [`HeartbeatMonitor`]: Keep-alive pings while connected
//! - [`ReconnectPolicy`]: Linear backoff schedule
//! - [`Endpoint`]: Builds the per-room socket URL
//! - [`Timeline`] and [`TypingIndicator`]: View state a caller keeps per room

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod connection;
mod credential;
mod endpoint;
pub mod error;
mod event;
pub mod heartbeat;
pub mod reconnect;
mod timeline;
mod typing;

pub use connection::{ConnectionAction, ConnectionConfig, ConnectionManager, ConnectionState, LinkId};
pub use credential::Credential;
pub use endpoint::Endpoint;
pub use error::{ConnectionError, SendError};
pub use event::RoomEvent;
pub use heartbeat::HeartbeatMonitor;
pub use parley_proto::{Message, MessageId, RoomId, UserId};
pub use reconnect::{ReconnectPolicy, ReconnectState};
pub use timeline::Timeline;
pub use typing::TypingIndicator;
