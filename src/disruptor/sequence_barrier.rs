//! Sequence Barrier Implementation
//!
//! Pairs an upstream [`Barrier`] with a [`WaitStrategy`] and an alert flag.
//! This is what a listener actually waits on: it answers "how far may I
//! read?" and gives up promptly when the listener is told to stop.

use crate::disruptor::{Barrier, DisruptorError, Result, WaitStrategy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Waitable barrier with interrupt support
#[derive(Debug)]
pub struct ProcessingSequenceBarrier {
    /// The sequences this barrier gates on
    upstream: Arc<dyn Barrier>,
    /// The wait strategy to use when the upstream lags behind
    wait_strategy: Arc<dyn WaitStrategy>,
    /// Alert flag for interrupting waiting threads
    alerted: AtomicBool,
}

impl ProcessingSequenceBarrier {
    pub fn new(upstream: Arc<dyn Barrier>, wait_strategy: Arc<dyn WaitStrategy>) -> Self {
        Self {
            upstream,
            wait_strategy,
            alerted: AtomicBool::new(false),
        }
    }

    /// Wait until `requested` is available upstream
    ///
    /// # Returns
    /// The highest available sequence, at least `requested`
    ///
    /// # Errors
    /// `DisruptorError::Alert` if the barrier is alerted before or while
    /// waiting, `DisruptorError::Timeout` if a bounded strategy gave up
    pub fn available_up_to(&self, requested: i64) -> Result<i64> {
        self.check_alert()?;
        self.wait_strategy
            .wait_for(requested, self.upstream.as_ref(), &self.alerted)
    }

    /// Highest sequence available upstream right now, without waiting
    pub fn cursor(&self) -> i64 {
        self.upstream.get()
    }

    pub fn wait_strategy(&self) -> &Arc<dyn WaitStrategy> {
        &self.wait_strategy
    }

    /// Alert this barrier, waking any thread waiting on it
    pub fn alert(&self) {
        self.alerted.store(true, Ordering::Release);
        self.wait_strategy.signal_all_when_blocking();
    }

    #[cfg(test)]
    pub(crate) fn clear_alert(&self) {
        self.alerted.store(false, Ordering::Release);
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted.load(Ordering::Acquire)
    }

    /// # Errors
    /// Returns `DisruptorError::Alert` if the barrier has been alerted
    pub fn check_alert(&self) -> Result<()> {
        if self.is_alerted() {
            Err(DisruptorError::Alert)
        } else {
            Ok(())
        }
    }

    /// Wake waiters after a downstream sequence moved
    pub fn signal(&self) {
        self.wait_strategy.signal_all_when_blocking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{
        BlockingWaitStrategy, BusySpinWaitStrategy, CompositeBarrier, Sequence,
    };
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_available_up_to_returns_cursor() {
        let cursor = Arc::new(Sequence::new(5));
        let barrier = ProcessingSequenceBarrier::new(cursor, Arc::new(BusySpinWaitStrategy::new()));

        assert_eq!(barrier.available_up_to(3).unwrap(), 5);
        assert_eq!(barrier.cursor(), 5);
    }

    #[test]
    fn test_alert_before_wait() {
        let cursor = Arc::new(Sequence::new(5));
        let barrier = ProcessingSequenceBarrier::new(cursor, Arc::new(BusySpinWaitStrategy::new()));

        barrier.alert();
        assert!(barrier.is_alerted());
        assert!(matches!(barrier.available_up_to(0), Err(DisruptorError::Alert)));

        barrier.clear_alert();
        assert!(!barrier.is_alerted());
        assert_eq!(barrier.available_up_to(0).unwrap(), 5);
    }

    #[test]
    fn test_alert_wakes_blocked_waiter() {
        let cursor = Arc::new(Sequence::default());
        let barrier = Arc::new(ProcessingSequenceBarrier::new(
            cursor,
            Arc::new(BlockingWaitStrategy::new()),
        ));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.available_up_to(0))
        };

        thread::sleep(Duration::from_millis(20));
        barrier.alert();

        assert!(matches!(waiter.join().unwrap(), Err(DisruptorError::Alert)));
    }

    #[test]
    fn test_composite_upstream_waits_for_slowest() {
        let fast = Arc::new(Sequence::new(10));
        let slow = Arc::new(Sequence::new(2));
        let upstream = Arc::new(CompositeBarrier::new(vec![fast, slow.clone()]));
        let barrier = Arc::new(ProcessingSequenceBarrier::new(
            upstream,
            Arc::new(BlockingWaitStrategy::new()),
        ));

        let waiter = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.available_up_to(6))
        };

        thread::sleep(Duration::from_millis(20));
        slow.set(7);
        barrier.signal();

        assert_eq!(waiter.join().unwrap().unwrap(), 7);
    }
}
