//! Sequencer Implementation
//!
//! The sequencer is the producer's side of the protocol. It hands out
//! sequence numbers (claim), and makes written slots visible to consumers
//! (publish). A claim only succeeds once the slot it would overwrite has
//! been processed by every consumer of the final stage; that wait is the
//! pipeline's only form of backpressure.

use crate::disruptor::{
    is_power_of_two, Barrier, BusySpinWaitStrategy, DisruptorError, Result, Sequence,
    WaitStrategy, INITIAL_CURSOR_VALUE,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Producer-side claim/publish contract
///
/// Claim and publish take `&mut self`: the producer is a single thread, and
/// the borrow checker keeps it that way.
pub trait Sequencer: Send + std::fmt::Debug {
    /// Claim the next `n` sequences, waiting until none of them would
    /// overwrite an unprocessed slot
    ///
    /// # Returns
    /// The highest sequence claimed
    ///
    /// # Errors
    /// Returns `DisruptorError::Alert` if the pipeline is halted while waiting
    ///
    /// # Panics
    /// Panics if `n` is not in `1..=capacity`
    fn claim(&mut self, n: i64) -> Result<i64>;

    /// Claim the next `n` sequences if that is possible without waiting
    fn try_claim(&mut self, n: i64) -> Option<i64>;

    /// Make every claimed sequence up to and including `sequence` visible
    fn publish(&mut self, sequence: i64);

    /// Claim the next sequence
    ///
    /// # Errors
    /// See [`Sequencer::claim`]
    fn next(&mut self) -> Result<i64> {
        self.claim(1)
    }

    /// Publish the claimed range `low..=high`
    fn publish_range(&mut self, low: i64, high: i64) {
        debug_assert!(low <= high, "empty publish range {low}..={high}");
        self.publish(high);
    }

    /// The producer's cursor sequence
    fn cursor(&self) -> &Arc<Sequence>;

    /// The ring capacity
    fn capacity(&self) -> usize;

    /// Slot index for a sequence
    fn index_of(&self, sequence: i64) -> usize {
        (sequence as usize) & (self.capacity() - 1)
    }

    /// Number of slots that could be claimed right now without waiting
    fn remaining_capacity(&self) -> i64;
}

/// Single producer sequencer
///
/// Waits for capacity through the configured wait strategy.
#[derive(Debug)]
pub struct SingleProducerSequencer {
    capacity: usize,
    cursor: Arc<Sequence>,
    /// Highest sequence handed out by a claim, published or not
    claimed: i64,
    /// Last value read from the gate, so most claims never touch it
    cached_gate: i64,
    gate: Arc<dyn Barrier>,
    wait_strategy: Arc<dyn WaitStrategy>,
    halted: Arc<AtomicBool>,
}

impl SingleProducerSequencer {
    /// Create a new single producer sequencer
    ///
    /// # Arguments
    /// * `cursor` - The producer's sequence, read by the first stage
    /// * `gate` - Barrier over the final stage's sequences
    /// * `capacity` - Ring size, a power of two
    /// * `wait_strategy` - How to wait while the ring is full
    /// * `halted` - Raised when the pipeline stops, to release a blocked claim
    ///
    /// # Panics
    /// Panics if capacity is not a power of 2
    pub fn new(
        cursor: Arc<Sequence>,
        gate: Arc<dyn Barrier>,
        capacity: usize,
        wait_strategy: Arc<dyn WaitStrategy>,
        halted: Arc<AtomicBool>,
    ) -> Self {
        assert!(is_power_of_two(capacity), "Capacity must be a power of 2");
        let claimed = cursor.get();

        Self {
            capacity,
            cursor,
            claimed,
            cached_gate: INITIAL_CURSOR_VALUE,
            gate,
            wait_strategy,
            halted,
        }
    }

    fn wrap_point(&self, n: i64) -> i64 {
        assert!(
            (1..=self.capacity as i64).contains(&n),
            "claim size {n} must be between 1 and the capacity {}",
            self.capacity
        );
        self.claimed + n - self.capacity as i64
    }

    /// Claim using a caller-chosen wait strategy
    pub(crate) fn claim_with(&mut self, n: i64, wait_strategy: &dyn WaitStrategy) -> Result<i64> {
        let wrap_point = self.wrap_point(n);

        if wrap_point > self.cached_gate {
            self.cached_gate = loop {
                match wait_strategy.wait_for(wrap_point, self.gate.as_ref(), &self.halted) {
                    Ok(available) => break available,
                    Err(DisruptorError::Timeout) => continue,
                    Err(e) => return Err(e),
                }
            };
        }

        self.claimed += n;
        Ok(self.claimed)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}

impl Sequencer for SingleProducerSequencer {
    fn claim(&mut self, n: i64) -> Result<i64> {
        let wait_strategy = Arc::clone(&self.wait_strategy);
        self.claim_with(n, wait_strategy.as_ref())
    }

    fn try_claim(&mut self, n: i64) -> Option<i64> {
        let wrap_point = self.wrap_point(n);

        if wrap_point > self.cached_gate {
            self.cached_gate = self.gate.get();
            if wrap_point > self.cached_gate {
                return None;
            }
        }

        self.claimed += n;
        Some(self.claimed)
    }

    fn publish(&mut self, sequence: i64) {
        debug_assert!(
            sequence <= self.claimed,
            "publishing {sequence} beyond the claimed {}",
            self.claimed
        );
        self.cursor.set(sequence);
        self.wait_strategy.signal_all_when_blocking();
    }

    fn cursor(&self) -> &Arc<Sequence> {
        &self.cursor
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn remaining_capacity(&self) -> i64 {
        let consumed = self.gate.get();
        self.capacity as i64 - (self.claimed - consumed)
    }
}

/// Sequencer that always busy-spins while waiting for capacity
///
/// Publishing still wakes consumers through the configured strategy.
#[derive(Debug)]
pub struct SpinSequencer {
    inner: SingleProducerSequencer,
}

impl SpinSequencer {
    pub fn new(inner: SingleProducerSequencer) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> SingleProducerSequencer {
        self.inner
    }
}

impl Sequencer for SpinSequencer {
    fn claim(&mut self, n: i64) -> Result<i64> {
        self.inner.claim_with(n, &BusySpinWaitStrategy)
    }

    fn try_claim(&mut self, n: i64) -> Option<i64> {
        self.inner.try_claim(n)
    }

    fn publish(&mut self, sequence: i64) {
        self.inner.publish(sequence);
    }

    fn cursor(&self) -> &Arc<Sequence> {
        self.inner.cursor()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn remaining_capacity(&self) -> i64 {
        self.inner.remaining_capacity()
    }
}

/// The sequencer handed out by [`Wireup`](crate::disruptor::Wireup)
#[derive(Debug)]
pub enum PipelineSequencer {
    /// Waits for capacity with the pipeline's wait strategy
    Plain(SingleProducerSequencer),
    /// Busy-spins while waiting for capacity
    Spin(SpinSequencer),
}

impl PipelineSequencer {
    pub fn is_spinning(&self) -> bool {
        matches!(self, Self::Spin(_))
    }
}

impl Sequencer for PipelineSequencer {
    fn claim(&mut self, n: i64) -> Result<i64> {
        match self {
            Self::Plain(sequencer) => sequencer.claim(n),
            Self::Spin(sequencer) => sequencer.claim(n),
        }
    }

    fn try_claim(&mut self, n: i64) -> Option<i64> {
        match self {
            Self::Plain(sequencer) => sequencer.try_claim(n),
            Self::Spin(sequencer) => sequencer.try_claim(n),
        }
    }

    fn publish(&mut self, sequence: i64) {
        match self {
            Self::Plain(sequencer) => sequencer.publish(sequence),
            Self::Spin(sequencer) => sequencer.publish(sequence),
        }
    }

    fn cursor(&self) -> &Arc<Sequence> {
        match self {
            Self::Plain(sequencer) => sequencer.cursor(),
            Self::Spin(sequencer) => sequencer.cursor(),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Self::Plain(sequencer) => sequencer.capacity(),
            Self::Spin(sequencer) => sequencer.capacity(),
        }
    }

    fn remaining_capacity(&self) -> i64 {
        match self {
            Self::Plain(sequencer) => sequencer.remaining_capacity(),
            Self::Spin(sequencer) => sequencer.remaining_capacity(),
        }
    }
}
