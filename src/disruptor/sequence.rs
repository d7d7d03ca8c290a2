//! Sequence implementation for the Disruptor
//!
//! A Sequence tracks how far one party (the producer, or a single consumer)
//! has progressed through the stream. It is the only channel of
//! communication between threads: each Sequence has exactly one writer, and
//! any number of barriers read it.

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A monotonic sequence counter padded to its own cache line
pub struct Sequence {
    value: CachePadded<AtomicI64>,
}

impl Sequence {
    /// Create a new sequence with the given initial value
    pub fn new(initial_value: i64) -> Self {
        Self {
            value: CachePadded::new(AtomicI64::new(initial_value)),
        }
    }

    /// Get the current sequence value
    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Set the sequence value
    ///
    /// Only the owning thread may call this, and only with a value that is
    /// not below the current one. Everything written before the store is
    /// visible to any thread that observes the new value through [`get`].
    ///
    /// [`get`]: Sequence::get
    #[inline]
    pub fn set(&self, value: i64) {
        debug_assert!(
            value >= self.value.load(Ordering::Relaxed),
            "sequence moved backwards: {} -> {value}",
            self.value.load(Ordering::Relaxed)
        );
        self.value.store(value, Ordering::Release);
    }

    /// Get the minimum value across a set of sequences
    ///
    /// Returns `i64::MAX` for an empty slice.
    pub fn get_minimum_sequence(sequences: &[Arc<Sequence>]) -> i64 {
        sequences
            .iter()
            .map(|sequence| sequence.get())
            .min()
            .unwrap_or(i64::MAX)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(crate::disruptor::INITIAL_CURSOR_VALUE)
    }
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.get())
            .finish()
    }
}

impl std::fmt::Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get())
    }
}
