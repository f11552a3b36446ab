//! Observable session state for invariant checking.

use parley_client::SessionResources;
use parley_core::ConnectionState;

use crate::sim_driver::SimDriver;

/// Resources and status of one session at one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Manager state
    pub state: ConnectionState,
    /// Sockets opening or open
    pub live_links: usize,
    /// Reconnect timer armed
    pub reconnect_timer: bool,
    /// Heartbeat timer armed
    pub heartbeat_timer: bool,
    /// Reconnects scheduled since the last open
    pub attempt_count: u32,
    /// Reconnect budget
    pub max_attempts: u32,
    /// Most recent status published to the caller, if any
    pub last_status: Option<ConnectionState>,
}

impl SessionSnapshot {
    /// A session that was never connected.
    pub fn idle(max_attempts: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            live_links: 0,
            reconnect_timer: false,
            heartbeat_timer: false,
            attempt_count: 0,
            max_attempts,
            last_status: None,
        }
    }

    /// Snapshot of a simulated driver.
    pub fn from_driver(driver: &SimDriver) -> Self {
        let manager = driver.manager();
        Self {
            state: manager.state(),
            live_links: driver.open_links(),
            reconnect_timer: driver.reconnect_armed(),
            heartbeat_timer: driver.heartbeat_armed(),
            attempt_count: manager.attempt_count(),
            max_attempts: manager.reconnect_policy().max_attempts,
            last_status: driver.statuses().last().copied(),
        }
    }

    /// Snapshot of a live session, given the last status the caller read.
    pub fn from_resources(resources: SessionResources, last_status: Option<ConnectionState>) -> Self {
        Self {
            state: resources.state,
            live_links: resources.live_links,
            reconnect_timer: resources.reconnect_timer,
            heartbeat_timer: resources.heartbeat_timer,
            attempt_count: resources.attempt_count,
            max_attempts: resources.max_attempts,
            last_status,
        }
    }
}
