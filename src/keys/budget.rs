//! Error budget for one key file load
//!
//! A key file pointed at a log file (or any hostile input) must not be able to
//! flood the log or keep the loader busy. Only the first `log_limit` errors are
//! logged, further ones are counted silently, and once more than
//! `abort_limit` errors have been seen the scan gives up.

use std::fmt::Display;
use tracing::error;

/// Default number of errors written to the log per load
pub const DEFAULT_LOG_LIMIT: u32 = 5;

/// Default number of errors tolerated before the scan stops
pub const DEFAULT_ABORT_LIMIT: u32 = 15;

/// Counts malformed-entry events for a single load attempt
#[derive(Debug, Clone)]
pub struct ErrorBudget {
    count: u32,
    log_limit: u32,
    abort_limit: u32,
}

impl ErrorBudget {
    pub fn new(log_limit: u32, abort_limit: u32) -> Self {
        Self {
            count: 0,
            log_limit,
            abort_limit,
        }
    }

    /// Count one error event, logging it while within the log limit
    ///
    /// Returns `false` once the abort limit has been exceeded.
    pub fn record(&mut self, path: &str, event: &impl Display) -> bool {
        self.count = self.count.saturating_add(1);
        if self.count <= self.log_limit {
            error!(key_file = %path, "authreadkeys: {}", event);
        }
        !self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.count > self.abort_limit
    }

    /// Total events recorded so far
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Events that were written to the log
    pub fn logged(&self) -> u32 {
        self.count.min(self.log_limit)
    }

    /// Events that were counted but not logged
    pub fn suppressed(&self) -> u32 {
        self.count - self.logged()
    }
}

impl Default for ErrorBudget {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LIMIT, DEFAULT_ABORT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_up_to_limit_then_suppresses() {
        let mut budget = ErrorBudget::new(5, 15);
        for _ in 0..8 {
            assert!(budget.record("keys", &"bad line"));
        }
        assert_eq!(budget.count(), 8);
        assert_eq!(budget.logged(), 5);
        assert_eq!(budget.suppressed(), 3);
    }

    #[test]
    fn test_exhausted_past_abort_limit() {
        let mut budget = ErrorBudget::new(5, 15);
        for i in 1..=15 {
            assert!(budget.record("keys", &"bad line"), "event {}", i);
        }
        assert!(!budget.is_exhausted());
        assert!(!budget.record("keys", &"bad line"));
        assert!(budget.is_exhausted());
        assert_eq!(budget.count(), 16);
    }

    #[test]
    fn test_default_limits() {
        let budget = ErrorBudget::default();
        assert_eq!(budget.log_limit, DEFAULT_LOG_LIMIT);
        assert_eq!(budget.abort_limit, DEFAULT_ABORT_LIMIT);
        assert_eq!(budget.count(), 0);
        assert_eq!(budget.suppressed(), 0);
    }
}
