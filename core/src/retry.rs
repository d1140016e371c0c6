//! Fixed-delay retry schedule
//!
//! Replaces a blocking "try, sleep, try again" loop with state the caller
//! consults on every scheduler step. There is no back-off and no give-up.

/// Attempt counter plus the earliest tick the next attempt may start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetrySchedule {
    delay_ms: u64,
    attempts: u32,
    next_attempt_ms: Option<u64>,
}

impl RetrySchedule {
    pub const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            attempts: 0,
            next_attempt_ms: None,
        }
    }

    /// Failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_attempt_ms(&self) -> Option<u64> {
        self.next_attempt_ms
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Whether an attempt may start at `now_ms`
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.next_attempt_ms {
            Some(at) => now_ms >= at,
            None => true,
        }
    }

    /// Count a failed attempt and push the next one out by the fixed delay
    pub fn record_failure(&mut self, now_ms: u64) {
        self.attempts = self.attempts.saturating_add(1);
        self.next_attempt_ms = Some(now_ms.saturating_add(self.delay_ms));
    }

    /// Forget past failures; the next attempt is due immediately
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next_attempt_ms = None;
    }
}
