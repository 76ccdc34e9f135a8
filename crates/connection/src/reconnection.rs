//! Retry bookkeeping for abnormal disconnects.
//!
//! Kept free of I/O: the transport asks the budget how long to wait and
//! does the sleeping and connecting itself.

use std::time::Duration;

use crate::types::RetryPolicy;

/// Counts consecutive abnormal closures against a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub(crate) struct RetryBudget {
    policy: RetryPolicy,
    closures: u32,
    exhausted: bool,
}

impl RetryBudget {
    pub(crate) fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            closures: 0,
            exhausted: false,
        }
    }

    /// Records one abnormal closure.
    ///
    /// Returns the wait before the next connect attempt, or `None` when the
    /// budget is spent. Once spent it stays spent.
    pub(crate) fn record_closure(&mut self) -> Option<Duration> {
        if self.exhausted {
            return None;
        }
        self.closures = self.closures.saturating_add(1);
        let delay = self.policy.delay_after(self.closures);
        self.exhausted = delay.is_none();
        delay
    }

    /// A link delivered application data; closures are no longer consecutive.
    pub(crate) fn record_progress(&mut self) {
        if !self.exhausted {
            self.closures = 0;
        }
    }

    pub(crate) fn closures(&self) -> u32 {
        self.closures
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn budget_spent_after_n_closures() {
        let mut budget = RetryBudget::new(policy(3));
        assert!(budget.record_closure().is_some());
        assert!(budget.record_closure().is_some());
        assert!(!budget.is_exhausted());
        assert!(budget.record_closure().is_none());
        assert!(budget.is_exhausted());
        assert_eq!(budget.closures(), 3);
    }

    #[test]
    fn progress_restores_budget() {
        let mut budget = RetryBudget::new(policy(3));
        budget.record_closure();
        budget.record_closure();
        budget.record_progress();
        assert_eq!(budget.closures(), 0);

        assert!(budget.record_closure().is_some());
        assert!(budget.record_closure().is_some());
        assert!(budget.record_closure().is_none());
    }

    #[test]
    fn exhausted_budget_stays_exhausted() {
        let mut budget = RetryBudget::new(policy(1));
        assert!(budget.record_closure().is_none());
        budget.record_progress();
        assert!(budget.is_exhausted());
        assert!(budget.record_closure().is_none());
    }
}
