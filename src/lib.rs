//! `Batchline` - Staged Single-Producer Disruptor Core
//!
//! An in-process, lock-free messaging core built on the Disruptor pattern.
//! A single producer claims and publishes sequence numbers over a fixed-size
//! circular sequence space; ordered stages of consumers process those
//! sequences strictly behind one another, gated only by atomic counters.
//!
//! The engine hands out sequence numbers and nothing else: the payload array
//! belongs to the caller, who maps `sequence & (capacity - 1)` to a slot.
//!
//! ## Quick Start
//!
//! ```rust
//! use batchline::disruptor::{Consumer, Sequencer, Wireup, YieldingWaitStrategy};
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! let slots: Arc<Vec<AtomicI64>> = Arc::new((0..8).map(|_| AtomicI64::new(0)).collect());
//! let reader = slots.clone();
//! let total = Arc::new(AtomicI64::new(0));
//! let sum = total.clone();
//!
//! let consumer = move |lower: i64, upper: i64, _end_of_batch: bool| {
//!     for sequence in lower..=upper {
//!         let value = reader[(sequence & 7) as usize].load(Ordering::Acquire);
//!         sum.fetch_add(value, Ordering::AcqRel);
//!     }
//! };
//!
//! let (mut sequencer, listeners) = Wireup::new()
//!     .with_capacity(8)
//!     .with_wait_strategy(YieldingWaitStrategy::new())
//!     .with_consumer_group(vec![Box::new(consumer) as Box<dyn Consumer>])
//!     .try_build()
//!     .unwrap();
//!
//! listeners.start().unwrap();
//!
//! for value in 1..=16 {
//!     let sequence = sequencer.claim(1).unwrap();
//!     slots[sequencer.index_of(sequence)].store(value, Ordering::Release);
//!     sequencer.publish(sequence);
//! }
//!
//! while listeners.sequences()[0].get() < 15 {
//!     std::thread::yield_now();
//! }
//! listeners.close().unwrap();
//! assert_eq!(total.load(Ordering::Acquire), 136);
//! ```
//!
//! ## Architecture
//!
//! - **`Sequence`**: padded atomic counter, one writer and many readers
//! - **`Barrier`** / **`CompositeBarrier`**: read-only views over sequences
//! - **`WaitStrategy`**: how a thread idles while a sequence lags behind
//! - **`Sequencer`**: producer-side claim/publish with backpressure
//! - **`Listener`**: per-consumer processing loop on its own thread
//! - **`Wireup`**: validates configuration and wires stages together

pub mod disruptor;

pub use disruptor::{
    // Utility functions
    is_power_of_two,
    // Barriers
    Barrier,
    BlockingWaitStrategy,
    BusySpinWaitStrategy,
    CompositeBarrier,
    // Consumers and listeners
    CompositeListener,
    Consumer,
    // Error types
    DisruptorError,
    Listener,
    ListenerState,
    PhasedBackoffWaitStrategy,
    // Configuration
    PipelineConfig,
    PipelineSequencer,
    ProcessingSequenceBarrier,
    Result,
    Sequence,
    // Sequencing
    Sequencer,
    SingleProducerSequencer,
    SleepingWaitStrategy,
    SpinSequencer,
    TimeoutBlockingWaitStrategy,
    // Wait strategies
    WaitStrategy,
    WaitStrategyKind,
    Wireup,
    YieldingWaitStrategy,
    // Constants
    INITIAL_CURSOR_VALUE,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the version of the `Batchline` library
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
