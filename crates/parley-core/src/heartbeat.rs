//! Keep-alive pings.
//!
//! While connected the driver fires [`HeartbeatMonitor::beat`] every
//! interval. Each beat sends a ping. With a missed-pong limit configured, a
//! beat that finds that many pings unanswered reports the link as dead
//! instead.

use std::time::Duration;

/// Interval between pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Monitor is not running
    Idle,
    /// Send a ping
    Ping,
    /// Too many pings went unanswered
    Expired {
        /// Pings sent without a pong
        unanswered: u32,
    },
}

/// Heartbeat bookkeeping for one link.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    missed_pong_limit: Option<u32>,
    running: bool,
    unanswered: u32,
}

impl HeartbeatMonitor {
    /// Stopped monitor.
    pub fn new(interval: Duration, missed_pong_limit: Option<u32>) -> Self {
        Self { interval, missed_pong_limit, running: false, unanswered: 0 }
    }

    /// Ping interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True between `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Pings sent since the last pong.
    pub fn unanswered(&self) -> u32 {
        self.unanswered
    }

    /// Arm the monitor for a fresh link.
    pub fn start(&mut self) {
        self.running = true;
        self.unanswered = 0;
    }

    /// Disarm. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        self.unanswered = 0;
        std::mem::replace(&mut self.running, false)
    }

    /// Interval elapsed.
    pub fn beat(&mut self) -> Beat {
        if !self.running {
            return Beat::Idle;
        }

        if let Some(limit) = self.missed_pong_limit
            && self.unanswered >= limit
        {
            return Beat::Expired { unanswered: self.unanswered };
        }

        self.unanswered = self.unanswered.saturating_add(1);
        Beat::Ping
    }

    /// Peer answered.
    pub fn pong_received(&mut self) {
        self.unanswered = 0;
    }
}
