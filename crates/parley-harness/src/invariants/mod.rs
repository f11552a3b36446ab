//! Invariant checking for session tests.
//!
//! Invariants are properties that must always hold between operations. They
//! are checked against a [`SessionSnapshot`] rather than live state so a
//! check sees one consistent moment.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SessionSnapshot::from_driver(&driver);
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    ActiveStatesHoldOneResource, AttemptsWithinBudget, HeartbeatIffConnected, NoLinkDuringBackoff,
    PublishedStatusMatches, SingleLink, TerminalStatesIdle,
};
pub use snapshot::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property checked against a session snapshot.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against `state`.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;

    /// Build a violation for this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every session invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(SingleLink);
        registry.add(NoLinkDuringBackoff);
        registry.add(HeartbeatIffConnected);
        registry.add(TerminalStatesIdle);
        registry.add(ActiveStatesHoldOneResource);
        registry.add(AttemptsWithinBudget);
        registry.add(PublishedStatusMatches);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants, returning every violation found.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}\n{state:?}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use parley_core::ConnectionState;

    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 7);
    }

    #[test]
    fn idle_session_passes() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&SessionSnapshot::idle(5)).is_ok());
    }

    #[test]
    fn link_during_backoff_is_reported() {
        let snapshot = SessionSnapshot {
            state: ConnectionState::Connecting,
            live_links: 1,
            reconnect_timer: true,
            heartbeat_timer: false,
            attempt_count: 1,
            max_attempts: 5,
            last_status: Some(ConnectionState::Connecting),
        };

        let violations = InvariantRegistry::standard().check_all(&snapshot).unwrap_err();
        let names: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert!(names.contains(&"no_link_during_backoff"));
        assert!(names.contains(&"active_states_hold_one_resource"));
    }
}
