//! Deterministic test harness for Parley sessions.
//!
//! In-memory implementations of the [`parley_client::Connector`] and
//! [`parley_client::RoomService`] seams, plus a synchronous driver for the
//! Sans-IO [`parley_core::ConnectionManager`].
//!
//! # Invariant Testing
//!
//! The `invariants` module verifies WHAT must be true after every step,
//! whichever path led there. Build a [`SessionSnapshot`] from a [`SimDriver`]
//! or from a live session's [`parley_client::SessionResources`] and run
//! [`InvariantRegistry::standard()`] against it.
//!
//! # Operations
//!
//! [`Operation`] enumerates every input the connection manager accepts. Fuzz
//! targets and property tests generate sequences of them and feed them
//! through [`SimDriver::apply`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod model;
pub mod sim_connector;
pub mod sim_driver;
pub mod sim_service;

pub use invariants::{
    ActiveStatesHoldOneResource, AttemptsWithinBudget, HeartbeatIffConnected, Invariant,
    InvariantRegistry, InvariantResult, NoLinkDuringBackoff, PublishedStatusMatches,
    SessionSnapshot, SingleLink, TerminalStatesIdle, Violation,
};
pub use model::{CloseCode, FrameKind, Operation, SmallText};
pub use sim_connector::{Dial, SimConnector, SimLink, SimNetwork};
pub use sim_driver::SimDriver;
pub use sim_service::SimRoomService;
