//! Cooperative shutdown signal shared by every worker and dispatcher thread.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CancelReason;

/// Crawl-wide stop flag. Threads never block on it; they poll
/// `is_cancelled` between channel operations. The first caller to
/// `cancel` decides the recorded reason, later calls are no-ops.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, reason: CancelReason) {
        let mut slot = match self.reason.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.is_none() {
            *slot = Some(reason);
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Why the crawl stopped. `None` while still running.
    pub fn reason(&self) -> Option<CancelReason> {
        match self.reason.lock() {
            Ok(s) => *s,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_cancel_wins() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);

        token.cancel(CancelReason::Idle);
        token.cancel(CancelReason::Interrupt);

        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::Idle));
    }
}
