//! Parley wire protocol
//!
//! JSON envelope spoken over a room's duplex socket. Every frame is a text
//! message of the form `{"type": "...", ...fields}`; the `type` tag selects
//! how the remaining fields are interpreted.
//!
//! # Components
//!
//! - [`WireFrame`]: Tagged union of all recognized frame types
//! - [`Message`]: Chat message as delivered by the backend
//! - [`close_code`]: Close codes with protocol meaning
//!
//! Decoding is lenient by contract: frames with an unrecognized `type` decode
//! to `None` instead of an error, so newer servers never break older clients.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod close_code;
pub mod errors;
mod frame;
mod ids;
mod message;

pub use close_code::CloseKind;
pub use errors::{ProtocolError, Result};
pub use frame::{ChatBody, FrameType, WireFrame};
pub use ids::{MessageId, RoomId, UserId};
pub use message::Message;
