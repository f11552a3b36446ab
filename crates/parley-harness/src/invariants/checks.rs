//! Session invariants.
//!
//! These capture resource discipline: what a session may hold in each state.

use parley_core::ConnectionState;

use super::{Invariant, InvariantResult, SessionSnapshot};

/// At most one socket is opening or open.
pub struct SingleLink;

impl Invariant for SingleLink {
    fn name(&self) -> &'static str {
        "single_link"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.live_links > 1 {
            return Err(self.violation(format!("{} live links", state.live_links)));
        }
        Ok(())
    }
}

/// A reconnect timer never coexists with a socket.
pub struct NoLinkDuringBackoff;

impl Invariant for NoLinkDuringBackoff {
    fn name(&self) -> &'static str {
        "no_link_during_backoff"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.reconnect_timer && state.live_links > 0 {
            return Err(self.violation(format!(
                "reconnect timer armed with {} live links",
                state.live_links
            )));
        }
        Ok(())
    }
}

/// The heartbeat runs exactly while connected.
pub struct HeartbeatIffConnected;

impl Invariant for HeartbeatIffConnected {
    fn name(&self) -> &'static str {
        "heartbeat_iff_connected"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let connected = state.state == ConnectionState::Connected;
        if state.heartbeat_timer != connected {
            return Err(self.violation(format!(
                "heartbeat armed={} in state {}",
                state.heartbeat_timer, state.state
            )));
        }
        Ok(())
    }
}

/// Disconnected and terminal states hold no socket and no timer.
pub struct TerminalStatesIdle;

impl Invariant for TerminalStatesIdle {
    fn name(&self) -> &'static str {
        "terminal_states_idle"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let idle_state = matches!(
            state.state,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::AuthError
        );
        if idle_state && (state.live_links > 0 || state.reconnect_timer || state.heartbeat_timer) {
            return Err(self.violation(format!(
                "{} holds links={} reconnect={} heartbeat={}",
                state.state, state.live_links, state.reconnect_timer, state.heartbeat_timer
            )));
        }
        Ok(())
    }
}

/// `Connecting` waits on exactly one socket or one timer; `Connected` holds
/// exactly one socket.
pub struct ActiveStatesHoldOneResource;

impl Invariant for ActiveStatesHoldOneResource {
    fn name(&self) -> &'static str {
        "active_states_hold_one_resource"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let held = state.live_links + usize::from(state.reconnect_timer);
        let ok = match state.state {
            ConnectionState::Connecting => held == 1,
            ConnectionState::Connected => state.live_links == 1 && !state.reconnect_timer,
            _ => true,
        };
        if !ok {
            return Err(self.violation(format!(
                "{} holds links={} reconnect={}",
                state.state, state.live_links, state.reconnect_timer
            )));
        }
        Ok(())
    }
}

/// The reconnect counter never exceeds its budget.
pub struct AttemptsWithinBudget;

impl Invariant for AttemptsWithinBudget {
    fn name(&self) -> &'static str {
        "attempts_within_budget"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.attempt_count > state.max_attempts {
            return Err(self.violation(format!(
                "attempt {} of {}",
                state.attempt_count, state.max_attempts
            )));
        }
        Ok(())
    }
}

/// The caller's view of the status matches the manager's.
pub struct PublishedStatusMatches;

impl Invariant for PublishedStatusMatches {
    fn name(&self) -> &'static str {
        "published_status_matches"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let published = state.last_status.unwrap_or(ConnectionState::Disconnected);
        if published != state.state {
            return Err(self.violation(format!(
                "published {published} but state is {}",
                state.state
            )));
        }
        Ok(())
    }
}
