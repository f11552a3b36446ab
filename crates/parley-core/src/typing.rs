//! Typing indicator with expiry.

use std::{ops::Sub, time::Duration};

use parley_proto::UserId;

/// How long a typing notification stays visible.
pub const DEFAULT_TYPING_EXPIRY: Duration = Duration::from_secs(3);

/// Tracks the most recent typing notification.
///
/// Generic over `Instant` so tests can drive it with virtual time.
#[derive(Debug, Clone)]
pub struct TypingIndicator<I> {
    expiry: Duration,
    last: Option<(I, Option<UserId>)>,
}

impl<I> Default for TypingIndicator<I> {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_EXPIRY)
    }
}

impl<I> TypingIndicator<I> {
    /// Indicator that expires notifications after `expiry`.
    pub fn new(expiry: Duration) -> Self {
        Self { expiry, last: None }
    }

    /// Forget any notification.
    pub fn clear(&mut self) {
        self.last = None;
    }
}

impl<I> TypingIndicator<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Record a notification from `sender` at `now`.
    pub fn observe(&mut self, sender: Option<UserId>, now: I) {
        self.last = Some((now, sender));
    }

    /// True if a notification arrived less than `expiry` before `now`.
    pub fn is_active(&self, now: I) -> bool {
        self.last.as_ref().is_some_and(|(at, _)| now < *at || now - *at < self.expiry)
    }

    /// Who is typing, if active and known.
    pub fn who(&self, now: I) -> Option<&UserId> {
        if !self.is_active(now) {
            return None;
        }
        self.last.as_ref().and_then(|(_, sender)| sender.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn expires_after_window() {
        let t0 = Instant::now();
        let mut indicator = TypingIndicator::default();
        assert!(!indicator.is_active(t0));

        indicator.observe(Some(UserId::from("bob")), t0);
        assert!(indicator.is_active(t0 + Duration::from_millis(2999)));
        assert_eq!(indicator.who(t0 + Duration::from_secs(1)), Some(&UserId::from("bob")));
        assert!(!indicator.is_active(t0 + Duration::from_secs(3)));
        assert_eq!(indicator.who(t0 + Duration::from_secs(3)), None);
    }

    #[test]
    fn new_notification_extends_window() {
        let t0 = Instant::now();
        let mut indicator = TypingIndicator::new(Duration::from_secs(3));
        indicator.observe(None, t0);
        indicator.observe(None, t0 + Duration::from_secs(2));

        assert!(indicator.is_active(t0 + Duration::from_secs(4)));
        indicator.clear();
        assert!(!indicator.is_active(t0 + Duration::from_secs(4)));
    }
}
