//! Pipeline wiring
//!
//! `Wireup` collects the pipeline's shape (capacity, wait strategy, ordered
//! consumer groups), validates it eagerly and, on success, wires sequences
//! and barriers stage by stage:
//!
//! ```text
//! producer ──> stage 0 ──> stage 1 ──> ... ──> stage n
//!    ^                                            │
//!    └──────────── CompositeBarrier(stage n) ─────┘
//! ```
//!
//! Stage 0 reads the producer's sequence directly, every later stage reads
//! the minimum of the stage before it, and the producer's claims are gated
//! on the minimum of the last stage.
//!
//! # Examples
//!
//! ```rust
//! use batchline::disruptor::{Consumer, Wireup, BlockingWaitStrategy};
//!
//! let parse: Box<dyn Consumer> = Box::new(|_lower: i64, _upper: i64, _end_of_batch: bool| {});
//! let journal: Box<dyn Consumer> = Box::new(|_lower: i64, _upper: i64, _end_of_batch: bool| {});
//! let apply: Box<dyn Consumer> = Box::new(|_lower: i64, _upper: i64, _end_of_batch: bool| {});
//!
//! let (_sequencer, listeners) = Wireup::new()
//!     .with_capacity(1024)
//!     .with_wait_strategy(BlockingWaitStrategy::new())
//!     .with_consumer_group(vec![parse, journal])
//!     .with_consumer_group(vec![apply])
//!     .try_build()
//!     .unwrap();
//!
//! assert_eq!(listeners.len(), 3);
//! ```

use crate::disruptor::{
    is_power_of_two, thread_management, Barrier, CompositeBarrier, CompositeListener, Consumer,
    DisruptorError, Listener, PipelineConfig, PipelineSequencer, ProcessingSequenceBarrier,
    Result, Sequence, SingleProducerSequencer, SleepingWaitStrategy, SpinSequencer, WaitStrategy,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::debug;

type ConsumerGroup = Vec<Option<Box<dyn Consumer>>>;

/// Builder for a staged pipeline
///
/// A fresh builder starts from its own defaults: a
/// [`SleepingWaitStrategy`], producer-side spinning enabled, and no
/// capacity (one must be supplied).
pub struct Wireup {
    spin_wait: bool,
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
    capacity: usize,
    consumer_groups: Vec<ConsumerGroup>,
    max_batch_size: Option<usize>,
    thread_name_prefix: String,
    listener_cores: Vec<usize>,
}

impl Default for Wireup {
    fn default() -> Self {
        Self {
            spin_wait: true,
            wait_strategy: Some(Arc::new(SleepingWaitStrategy::new())),
            capacity: 0,
            consumer_groups: Vec::new(),
            max_batch_size: None,
            thread_name_prefix: "listener".to_owned(),
            listener_cores: Vec::new(),
        }
    }
}

impl Wireup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder preloaded with everything a [`PipelineConfig`] describes
    ///
    /// Consumer groups still have to be added.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            spin_wait: config.spin_wait,
            wait_strategy: Some(config.wait_strategy.build(config.wait_timeout())),
            capacity: config.capacity,
            consumer_groups: Vec::new(),
            max_batch_size: config.max_batch_size,
            thread_name_prefix: config.thread_name_prefix.clone(),
            listener_cores: config.listener_cores.clone(),
        }
    }

    /// Busy-spin on the producer's claim path instead of using the wait strategy
    pub fn with_spin_wait(mut self, value: bool) -> Self {
        self.spin_wait = value;
        self
    }

    pub fn with_wait_strategy<W: WaitStrategy + 'static>(mut self, value: W) -> Self {
        self.wait_strategy = Some(Arc::new(value));
        self
    }

    /// Set (or, with `None`, clear) a shared wait strategy
    pub fn with_shared_wait_strategy(mut self, value: Option<Arc<dyn WaitStrategy>>) -> Self {
        self.wait_strategy = value;
        self
    }

    pub fn with_capacity(mut self, value: usize) -> Self {
        self.capacity = value;
        self
    }

    /// Append a stage of consumers running in parallel
    pub fn with_consumer_group(mut self, consumers: Vec<Box<dyn Consumer>>) -> Self {
        self.consumer_groups
            .push(consumers.into_iter().map(Some).collect());
        self
    }

    /// Append a stage whose entries may be missing
    ///
    /// A `None` entry fails validation with `DisruptorError::EmptyConsumer`.
    pub fn with_optional_consumer_group(mut self, consumers: ConsumerGroup) -> Self {
        self.consumer_groups.push(consumers);
        self
    }

    pub fn with_max_batch_size(mut self, value: usize) -> Self {
        self.max_batch_size = Some(value);
        self
    }

    pub fn with_thread_name_prefix(mut self, value: impl Into<String>) -> Self {
        self.thread_name_prefix = value.into();
        self
    }

    /// Pin listeners to cores, in stage order; listeners beyond the list are not pinned
    pub fn with_listener_cores(mut self, cores: Vec<usize>) -> Self {
        self.listener_cores = cores;
        self
    }

    /// Check the configuration without building anything
    ///
    /// # Errors
    /// The first configuration error found
    pub fn validate(&self) -> Result<()> {
        if self.wait_strategy.is_none() {
            return Err(DisruptorError::MissingWaitStrategy);
        }

        if self.capacity == 0 {
            return Err(DisruptorError::CapacityTooSmall);
        }

        if !is_power_of_two(self.capacity) {
            return Err(DisruptorError::CapacityPowerOfTwo(self.capacity));
        }

        if self.consumer_groups.is_empty() {
            return Err(DisruptorError::MissingConsumers);
        }

        for (group, consumers) in self.consumer_groups.iter().enumerate() {
            if consumers.is_empty() {
                return Err(DisruptorError::MissingConsumersInGroup(group));
            }

            if let Some(index) = consumers.iter().position(Option::is_none) {
                return Err(DisruptorError::EmptyConsumer { group, index });
            }
        }

        if let Some(&core) = self
            .listener_cores
            .iter()
            .find(|&&core| !thread_management::is_core_available(core))
        {
            return Err(DisruptorError::UnavailableCore(core));
        }

        Ok(())
    }

    /// Validate and wire the pipeline
    ///
    /// Returns the producer's sequencer and a handle over every listener.
    /// Listeners are built idle; call [`CompositeListener::start`].
    ///
    /// # Errors
    /// A configuration error; nothing is built in that case
    pub fn try_build(self) -> Result<(PipelineSequencer, CompositeListener)> {
        self.validate()?;

        let Self {
            spin_wait,
            wait_strategy,
            capacity,
            consumer_groups,
            max_batch_size,
            thread_name_prefix,
            listener_cores,
        } = self;
        let wait_strategy = wait_strategy.ok_or(DisruptorError::MissingWaitStrategy)?;
        let stages = consumer_groups.len();

        let halted = Arc::new(AtomicBool::new(false));
        let producer = Arc::new(Sequence::default());
        let mut upstream: Arc<dyn Barrier> = producer.clone();
        let mut listeners = Vec::new();
        let mut cores = listener_cores.into_iter();

        for (group, consumers) in consumer_groups.into_iter().enumerate() {
            let mut stage_sequences = Vec::with_capacity(consumers.len());

            for (index, consumer) in consumers.into_iter().enumerate() {
                let consumer = consumer.ok_or(DisruptorError::EmptyConsumer { group, index })?;
                let sequence = Arc::new(Sequence::default());
                let barrier = ProcessingSequenceBarrier::new(
                    Arc::clone(&upstream),
                    Arc::clone(&wait_strategy),
                );

                let mut listener = Listener::new(
                    format!("{thread_name_prefix}-{group}-{index}"),
                    Arc::clone(&sequence),
                    barrier,
                    consumer,
                );
                if let Some(max_batch_size) = max_batch_size {
                    listener = listener.with_max_batch_size(max_batch_size);
                }
                if let Some(core) = cores.next() {
                    listener = listener.pin_at_core(core);
                }

                listeners.push(listener);
                stage_sequences.push(sequence);
            }

            upstream = Arc::new(CompositeBarrier::new(stage_sequences));
        }

        let sequencer = SingleProducerSequencer::new(
            producer,
            upstream,
            capacity,
            Arc::clone(&wait_strategy),
            Arc::clone(&halted),
        );
        let sequencer = if spin_wait {
            PipelineSequencer::Spin(SpinSequencer::new(sequencer))
        } else {
            PipelineSequencer::Plain(sequencer)
        };

        debug!(
            capacity,
            stages,
            listeners = listeners.len(),
            spin_wait,
            wait_strategy = ?wait_strategy,
            "pipeline wired"
        );

        Ok((sequencer, CompositeListener::new(listeners, halted)))
    }

    /// Validate and wire the pipeline, panicking on an invalid configuration
    ///
    /// # Panics
    /// Panics with the configuration error's message
    pub fn build(self) -> (PipelineSequencer, CompositeListener) {
        match self.try_build() {
            Ok(pipeline) => pipeline,
            Err(e) => panic!("invalid pipeline configuration: {e}"),
        }
    }
}

impl std::fmt::Debug for Wireup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let group_sizes: Vec<usize> = self.consumer_groups.iter().map(Vec::len).collect();
        f.debug_struct("Wireup")
            .field("spin_wait", &self.spin_wait)
            .field("wait_strategy", &self.wait_strategy)
            .field("capacity", &self.capacity)
            .field("consumer_groups", &group_sizes)
            .field("max_batch_size", &self.max_batch_size)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("listener_cores", &self.listener_cores)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disruptor::{Sequencer, WaitStrategyKind, YieldingWaitStrategy};

    fn noop() -> Box<dyn Consumer> {
        Box::new(|_: i64, _: i64, _: bool| {})
    }

    #[test]
    fn test_missing_wait_strategy() {
        let result = Wireup::new()
            .with_shared_wait_strategy(None)
            .with_capacity(8)
            .with_consumer_group(vec![noop()])
            .try_build();
        assert!(matches!(result, Err(DisruptorError::MissingWaitStrategy)));
    }

    #[test]
    fn test_capacity_validation() {
        let too_small = Wireup::new().with_consumer_group(vec![noop()]).try_build();
        assert!(matches!(too_small, Err(DisruptorError::CapacityTooSmall)));

        let not_power = Wireup::new()
            .with_capacity(3)
            .with_consumer_group(vec![noop()])
            .try_build();
        assert!(matches!(not_power, Err(DisruptorError::CapacityPowerOfTwo(3))));
    }

    #[test]
    fn test_consumer_validation() {
        let none = Wireup::new().with_capacity(8).try_build();
        assert!(matches!(none, Err(DisruptorError::MissingConsumers)));

        let empty_group = Wireup::new()
            .with_capacity(8)
            .with_consumer_group(vec![noop()])
            .with_consumer_group(Vec::new())
            .try_build();
        assert!(matches!(
            empty_group,
            Err(DisruptorError::MissingConsumersInGroup(1))
        ));

        let empty_consumer = Wireup::new()
            .with_capacity(8)
            .with_optional_consumer_group(vec![Some(noop()), None])
            .try_build();
        assert!(matches!(
            empty_consumer,
            Err(DisruptorError::EmptyConsumer { group: 0, index: 1 })
        ));
    }

    #[test]
    fn test_unavailable_core() {
        let result = Wireup::new()
            .with_capacity(8)
            .with_consumer_group(vec![noop()])
            .with_listener_cores(vec![usize::MAX])
            .try_build();
        assert!(matches!(result, Err(DisruptorError::UnavailableCore(usize::MAX))));
    }

    #[test]
    #[should_panic(expected = "invalid pipeline configuration")]
    fn test_build_panics_on_invalid_configuration() {
        let _ = Wireup::new().with_capacity(3).build();
    }

    #[test]
    fn test_wiring_shape() {
        let (sequencer, listeners) = Wireup::new()
            .with_capacity(16)
            .with_wait_strategy(YieldingWaitStrategy::new())
            .with_thread_name_prefix("stage")
            .with_consumer_group(vec![noop(), noop()])
            .with_consumer_group(vec![noop()])
            .try_build()
            .unwrap();

        assert!(sequencer.is_spinning());
        assert_eq!(sequencer.capacity(), 16);
        assert_eq!(sequencer.cursor().get(), -1);
        assert_eq!(listeners.len(), 3);

        let names: Vec<&str> = listeners.listeners().iter().map(Listener::name).collect();
        assert_eq!(names, vec!["stage-0-0", "stage-0-1", "stage-1-0"]);
        assert!(listeners.sequences().iter().all(|s| s.get() == -1));
    }

    #[test]
    fn test_spin_wait_opt_out() {
        let (sequencer, _listeners) = Wireup::new()
            .with_spin_wait(false)
            .with_capacity(4)
            .with_consumer_group(vec![noop()])
            .build();
        assert!(!sequencer.is_spinning());
    }

    #[test]
    fn test_from_config() {
        let config = PipelineConfig {
            capacity: 32,
            wait_strategy: WaitStrategyKind::Blocking,
            spin_wait: false,
            max_batch_size: Some(4),
            ..PipelineConfig::default()
        };

        let (sequencer, listeners) = Wireup::from_config(&config)
            .with_consumer_group(vec![noop()])
            .try_build()
            .unwrap();
        assert_eq!(sequencer.capacity(), 32);
        assert!(!sequencer.is_spinning());
        assert_eq!(listeners.listeners()[0].name(), "listener-0-0");
    }

    #[test]
    fn test_defaults_are_fresh_per_builder() {
        let first = Wireup::new();
        let second = Wireup::new();
        let (Some(a), Some(b)) = (&first.wait_strategy, &second.wait_strategy) else {
            panic!("default wait strategy missing");
        };
        assert!(!Arc::ptr_eq(a, b));
    }
}
