//! Parley terminal client.
//!
//! Line-oriented chat over one room session. Plain lines are sent as chat
//! messages; lines starting with `/` are commands (see [`Command`]).
//! Connection status changes, typing notices and incoming messages are
//! printed as they arrive.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
pub mod config;
pub mod render;
pub mod runtime;

pub use command::{Command, CommandError};
pub use config::Args;
pub use runtime::CliError;
