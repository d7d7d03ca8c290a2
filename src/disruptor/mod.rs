//! Batchline Disruptor Core
//!
//! Lock-free sequence coordination for a single producer feeding ordered
//! stages of consumers. Payload storage stays with the caller; this module
//! only decides which sequence numbers are safe to write and to read.

pub mod barrier;
pub mod config;
pub mod consumer;
pub mod listener;
pub mod sequence;
pub mod sequence_barrier;
pub mod sequencer;
pub mod thread_management;
pub mod wait_strategy;
pub mod wireup;

#[cfg(test)]
mod property_tests;

pub use barrier::{Barrier, CompositeBarrier};
pub use config::{PipelineConfig, WaitStrategyKind};
pub use consumer::Consumer;
pub use listener::{CompositeListener, Listener, ListenerState};
pub use sequence::Sequence;
pub use sequence_barrier::ProcessingSequenceBarrier;
pub use sequencer::{PipelineSequencer, Sequencer, SingleProducerSequencer, SpinSequencer};
pub use thread_management::{ManagedThread, ThreadBuilder, ThreadContext};
pub use wait_strategy::{
    BlockingWaitStrategy, BusySpinWaitStrategy, PhasedBackoffWaitStrategy, SleepingWaitStrategy,
    TimeoutBlockingWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};
pub use wireup::Wireup;

/// The initial cursor value for sequences: one below the first valid slot
pub const INITIAL_CURSOR_VALUE: i64 = -1;

/// Errors that can occur in the Disruptor
#[derive(Debug, thiserror::Error)]
pub enum DisruptorError {
    #[error("a wait strategy must be provided")]
    MissingWaitStrategy,

    #[error("the capacity must be at least 1")]
    CapacityTooSmall,

    #[error("the capacity must be a power of two, e.g. 2, 4, 8, 16, got: {0}")]
    CapacityPowerOfTwo(usize),

    #[error("no consumers have been provided")]
    MissingConsumers,

    #[error("consumer group {0} does not have any consumers")]
    MissingConsumersInGroup(usize),

    #[error("an empty consumer was specified in consumer group {group} at position {index}")]
    EmptyConsumer { group: usize, index: usize },

    #[error("CPU core {0} is not available on this system")]
    UnavailableCore(usize),

    #[error("unknown wait strategy: {0}")]
    UnknownWaitStrategy(String),

    #[error("the wait was interrupted by an alert")]
    Alert,

    #[error("timeout waiting for sequence")]
    Timeout,

    #[error("listener has already been started")]
    AlreadyStarted,

    #[error("failed to spawn listener thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("listener thread '{0}' panicked")]
    ListenerPanicked(String),
}

impl DisruptorError {
    /// Whether this error was raised while validating a configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::MissingWaitStrategy
                | Self::CapacityTooSmall
                | Self::CapacityPowerOfTwo(_)
                | Self::MissingConsumers
                | Self::MissingConsumersInGroup(_)
                | Self::EmptyConsumer { .. }
                | Self::UnavailableCore(_)
                | Self::UnknownWaitStrategy(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DisruptorError>;

/// Utility function to check if a number is a power of 2
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
