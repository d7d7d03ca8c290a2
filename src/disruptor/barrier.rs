//! Barriers over sequences
//!
//! A barrier is a read-only view answering one question: what is the highest
//! sequence that is safe to read right now? It never owns the sequences it
//! consults and never writes them.

use crate::disruptor::Sequence;
use std::sync::Arc;

/// Read-only view over one or more sequences
pub trait Barrier: Send + Sync + std::fmt::Debug {
    /// The highest sequence currently available through this barrier
    fn get(&self) -> i64;
}

impl Barrier for Sequence {
    #[inline]
    fn get(&self) -> i64 {
        Sequence::get(self)
    }
}

/// Barrier reporting the slowest of several sequences
///
/// Used to gate a stage on every member of the stage before it, and to gate
/// the producer on every member of the final stage. Members are read one
/// after another, and since each only ever grows, the reported minimum is
/// never above any member's current value.
#[derive(Debug, Clone)]
pub struct CompositeBarrier {
    sequences: Vec<Arc<Sequence>>,
}

impl CompositeBarrier {
    /// Create a barrier over the given sequences
    ///
    /// # Panics
    /// Panics if `sequences` is empty
    pub fn new(sequences: Vec<Arc<Sequence>>) -> Self {
        assert!(
            !sequences.is_empty(),
            "a composite barrier needs at least one sequence"
        );
        Self { sequences }
    }

    /// The sequences gated by this barrier
    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

impl Barrier for CompositeBarrier {
    #[inline]
    fn get(&self) -> i64 {
        // single-member fast path avoids the iterator for the common 1:1 stage
        if let [only] = self.sequences.as_slice() {
            return only.get();
        }
        Sequence::get_minimum_sequence(&self.sequences)
    }
}
