//! Polled connection state for the network link and the broker session

use crate::retry::RetrySchedule;

/// `Disconnected -> Connecting -> Connected`, back to `Disconnected` only
/// when a status poll observes the loss
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Disconnected,
    /// At least one attempt made, none succeeded yet
    Connecting,
    Connected,
}

/// A link's state together with its retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    state: LinkState,
    retry: RetrySchedule,
}

impl Connection {
    pub const fn new(retry_delay_ms: u64) -> Self {
        Self {
            state: LinkState::Disconnected,
            retry: RetrySchedule::new(retry_delay_ms),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn retry(&self) -> &RetrySchedule {
        &self.retry
    }

    /// Whether a fresh connect attempt may start at `now_ms`
    pub fn attempt_due(&self, now_ms: u64) -> bool {
        !self.is_connected() && self.retry.is_due(now_ms)
    }

    /// First attempt of a (re)connect cycle
    pub fn is_first_attempt(&self) -> bool {
        self.retry.attempts() == 0
    }

    pub fn begin_attempt(&mut self) {
        self.state = LinkState::Connecting;
    }

    pub fn attempt_failed(&mut self, now_ms: u64) {
        self.state = LinkState::Connecting;
        self.retry.record_failure(now_ms);
    }

    /// Returns `true` when this call moved the link into `Connected`
    pub fn mark_connected(&mut self) -> bool {
        let changed = self.state != LinkState::Connected;
        self.state = LinkState::Connected;
        self.retry.reset();
        changed
    }

    /// Status poll observed a drop; reconnect may start immediately
    pub fn mark_lost(&mut self) {
        self.state = LinkState::Disconnected;
        self.retry.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut link = Connection::new(5_000);
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.attempt_due(0));
        assert!(link.is_first_attempt());

        link.begin_attempt();
        link.attempt_failed(0);
        assert_eq!(link.state(), LinkState::Connecting);
        assert!(!link.attempt_due(4_999));
        assert!(link.attempt_due(5_000));
        assert!(!link.is_first_attempt());

        assert!(link.mark_connected());
        assert!(!link.mark_connected());
        assert!(link.is_connected());
        assert!(!link.attempt_due(5_000));
        assert_eq!(link.retry().attempts(), 0);

        link.mark_lost();
        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(link.attempt_due(5_001));
        assert!(link.is_first_attempt());
    }
}
