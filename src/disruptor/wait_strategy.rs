//! Wait Strategy Implementation
//!
//! Wait strategies decide how a thread idles while the barrier it depends on
//! has not yet reached the sequence it needs. Every one of them returns
//! promptly once the caller's alert flag is raised.

use crate::disruptor::{Barrier, DisruptorError, Result};
use parking_lot::{Condvar, Mutex};
use std::hint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Strategy for waiting until a barrier reaches a sequence
pub trait WaitStrategy: Send + Sync + std::fmt::Debug {
    /// Wait until `barrier` reports a value of at least `sequence`
    ///
    /// # Returns
    /// The value observed on the barrier, which may be higher than requested
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` once `alert` is raised, and
    /// `DisruptorError::Timeout` for strategies with a bounded wait
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64>;

    /// Wake every thread blocked inside [`WaitStrategy::wait_for`]
    ///
    /// Called after every sequence update on the publishing side, and when
    /// raising an alert.
    fn signal_all_when_blocking(&self);
}

#[inline]
fn check_alert(alert: &AtomicBool) -> Result<()> {
    if alert.load(Ordering::Acquire) {
        Err(DisruptorError::Alert)
    } else {
        Ok(())
    }
}

/// Busy-spin wait strategy
///
/// Re-reads the barrier in a tight loop. Lowest latency, and a full core
/// burned while waiting.
#[derive(Debug, Default, Clone, Copy)]
pub struct BusySpinWaitStrategy;

impl BusySpinWaitStrategy {
    /// Create a new busy-spin wait strategy
    pub fn new() -> Self {
        Self
    }
}

impl WaitStrategy for BusySpinWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        loop {
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alert)?;
            hint::spin_loop();
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Yielding wait strategy
///
/// Spins for a number of tries, then yields the processor between checks.
#[derive(Debug, Clone, Copy)]
pub struct YieldingWaitStrategy {
    spin_tries: u32,
}

impl YieldingWaitStrategy {
    const DEFAULT_SPIN_TRIES: u32 = 100;

    /// Create a new yielding wait strategy
    pub fn new() -> Self {
        Self::with_spin_tries(Self::DEFAULT_SPIN_TRIES)
    }

    /// Create a yielding wait strategy spinning `spin_tries` times before yielding
    pub fn with_spin_tries(spin_tries: u32) -> Self {
        Self { spin_tries }
    }
}

impl Default for YieldingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for YieldingWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        let mut counter = self.spin_tries;
        loop {
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alert)?;
            if counter == 0 {
                thread::yield_now();
            } else {
                counter -= 1;
                hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Sleeping wait strategy
///
/// Spins, then yields, then sleeps for a short interval between checks.
/// The default for new pipelines.
#[derive(Debug, Clone, Copy)]
pub struct SleepingWaitStrategy {
    retries: u32,
    sleep_duration: Duration,
}

impl SleepingWaitStrategy {
    const DEFAULT_RETRIES: u32 = 200;
    const SPIN_THRESHOLD: u32 = 100;

    /// Create a new sleeping wait strategy with default sleep duration
    pub fn new() -> Self {
        Self::new_with_duration(Duration::from_micros(50))
    }

    /// Create a new sleeping wait strategy with custom sleep duration
    pub fn new_with_duration(sleep_duration: Duration) -> Self {
        Self {
            retries: Self::DEFAULT_RETRIES,
            sleep_duration,
        }
    }

    pub fn sleep_duration(&self) -> Duration {
        self.sleep_duration
    }
}

impl Default for SleepingWaitStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for SleepingWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        let mut counter = self.retries;
        loop {
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alert)?;
            if counter > Self::SPIN_THRESHOLD {
                counter -= 1;
                hint::spin_loop();
            } else if counter > 0 {
                counter -= 1;
                thread::yield_now();
            } else {
                thread::sleep(self.sleep_duration);
            }
        }
    }

    fn signal_all_when_blocking(&self) {}
}

/// Blocking wait strategy using a condition variable
///
/// Waiters check the barrier while holding the mutex and then park on the
/// condition variable; signalling takes the same mutex before notifying, so
/// an update made between a waiter's check and its park cannot be missed.
#[derive(Debug, Default)]
pub struct BlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl BlockingWaitStrategy {
    /// Create a new blocking wait strategy
    pub fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }
}

impl WaitStrategy for BlockingWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        let available = barrier.get();
        if available >= sequence {
            return Ok(available);
        }

        let mut guard = self.mutex.lock();
        loop {
            check_alert(alert)?;
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            self.condvar.wait(&mut guard);
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Blocking wait strategy with an upper bound on each wait
///
/// Behaves like [`BlockingWaitStrategy`] but gives up with
/// `DisruptorError::Timeout` once `timeout` has elapsed. Listeners and the
/// sequencer treat a timeout as a cue to check again.
#[derive(Debug)]
pub struct TimeoutBlockingWaitStrategy {
    mutex: Mutex<()>,
    condvar: Condvar,
    timeout: Duration,
}

impl TimeoutBlockingWaitStrategy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl WaitStrategy for TimeoutBlockingWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        let available = barrier.get();
        if available >= sequence {
            return Ok(available);
        }

        let deadline = Instant::now() + self.timeout;
        let mut guard = self.mutex.lock();
        loop {
            check_alert(alert)?;
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                let available = barrier.get();
                return if available >= sequence {
                    Ok(available)
                } else {
                    Err(DisruptorError::Timeout)
                };
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        let _guard = self.mutex.lock();
        self.condvar.notify_all();
    }
}

/// Phased backoff wait strategy
///
/// Spins for `spin_timeout`, yields for `yield_timeout`, then hands the wait
/// over to a fallback strategy. Signals are forwarded to the fallback.
#[derive(Debug, Clone)]
pub struct PhasedBackoffWaitStrategy {
    spin_timeout: Duration,
    yield_timeout: Duration,
    fallback: Arc<dyn WaitStrategy>,
}

impl PhasedBackoffWaitStrategy {
    const SPIN_TRIES: u32 = 10_000;

    pub fn new(
        spin_timeout: Duration,
        yield_timeout: Duration,
        fallback: Arc<dyn WaitStrategy>,
    ) -> Self {
        Self {
            spin_timeout,
            yield_timeout,
            fallback,
        }
    }

    /// Phased backoff falling back to a [`BlockingWaitStrategy`]
    pub fn with_lock(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(
            spin_timeout,
            yield_timeout,
            Arc::new(BlockingWaitStrategy::new()),
        )
    }

    /// Phased backoff falling back to a [`SleepingWaitStrategy`]
    pub fn with_sleep(spin_timeout: Duration, yield_timeout: Duration) -> Self {
        Self::new(
            spin_timeout,
            yield_timeout,
            Arc::new(SleepingWaitStrategy::new()),
        )
    }
}

impl WaitStrategy for PhasedBackoffWaitStrategy {
    fn wait_for(&self, sequence: i64, barrier: &dyn Barrier, alert: &AtomicBool) -> Result<i64> {
        let mut start: Option<Instant> = None;
        let mut counter = Self::SPIN_TRIES;

        loop {
            let available = barrier.get();
            if available >= sequence {
                return Ok(available);
            }
            check_alert(alert)?;

            counter -= 1;
            if counter == 0 {
                let elapsed = start.get_or_insert_with(Instant::now).elapsed();
                if elapsed > self.spin_timeout + self.yield_timeout {
                    return self.fallback.wait_for(sequence, barrier, alert);
                } else if elapsed > self.spin_timeout {
                    thread::yield_now();
                }
                counter = Self::SPIN_TRIES;
            } else {
                hint::spin_loop();
            }
        }
    }

    fn signal_all_when_blocking(&self) {
        self.fallback.signal_all_when_blocking();
    }
}
