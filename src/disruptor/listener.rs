//! Listener implementation for the Disruptor
//!
//! A listener binds one consumer to its own sequence and to the barrier of
//! the stage in front of it, and drives the processing loop on a dedicated
//! thread. Listeners of the same stage run independently; the barrier is the
//! only thing ordering them against the rest of the pipeline.

use crate::disruptor::{
    thread_management::{ManagedThread, ThreadBuilder, ThreadContext},
    Consumer, DisruptorError, ProcessingSequenceBarrier, Result, Sequence, WaitStrategy,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Lifecycle state of a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListenerState {
    /// Built, not started
    Idle = 0,
    /// Processing or waiting for sequences
    Running = 1,
    /// Stop requested; the in-flight batch is finishing
    Draining = 2,
    /// The loop has exited (or never started)
    Stopped = 3,
}

impl ListenerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

enum Worker {
    Pending(Box<dyn Consumer>),
    Running(ManagedThread),
    Finished,
}

/// Per-consumer processing loop
pub struct Listener {
    name: String,
    sequence: Arc<Sequence>,
    barrier: Arc<ProcessingSequenceBarrier>,
    state: Arc<AtomicU8>,
    max_batch_size: Option<i64>,
    thread_context: ThreadContext,
    worker: Mutex<Worker>,
}

impl Listener {
    /// Create a new listener
    ///
    /// # Arguments
    /// * `name` - Name of the worker thread
    /// * `sequence` - The listener's own sequence, written only by its loop
    /// * `barrier` - Gate on the upstream stage (or the producer)
    /// * `consumer` - The callback receiving available ranges
    pub fn new(
        name: impl Into<String>,
        sequence: Arc<Sequence>,
        barrier: ProcessingSequenceBarrier,
        consumer: Box<dyn Consumer>,
    ) -> Self {
        let name = name.into();
        Self {
            thread_context: ThreadContext::new().thread_name(name.clone()),
            name,
            sequence,
            barrier: Arc::new(barrier),
            state: Arc::new(AtomicU8::new(ListenerState::Idle as u8)),
            max_batch_size: None,
            worker: Mutex::new(Worker::Pending(consumer)),
        }
    }

    /// Split ranges longer than `max_batch_size` into several calls
    ///
    /// Only the last call of a split range is flagged as end of batch.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = Some(i64::try_from(max_batch_size).unwrap_or(i64::MAX).max(1));
        self
    }

    /// Pin the worker thread to a CPU core
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.thread_context = std::mem::take(&mut self.thread_context).pin_at_core(core_id);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    pub fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), ListenerState::Running | ListenerState::Draining)
    }

    /// Start the processing loop on its own thread
    ///
    /// # Errors
    /// `DisruptorError::AlreadyStarted` if the listener left the idle state,
    /// `DisruptorError::Spawn` if the thread could not be created
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        let consumer = match std::mem::replace(&mut *worker, Worker::Finished) {
            Worker::Pending(consumer) => consumer,
            other => {
                *worker = other;
                return Err(DisruptorError::AlreadyStarted);
            }
        };

        if self
            .state
            .compare_exchange(
                ListenerState::Idle as u8,
                ListenerState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            // stopped before it ever ran
            return Err(DisruptorError::AlreadyStarted);
        }

        let run_loop = RunLoop {
            sequence: Arc::clone(&self.sequence),
            barrier: Arc::clone(&self.barrier),
            max_batch_size: self.max_batch_size,
            consumer,
        };
        let state = Arc::clone(&self.state);
        let name = self.name.clone();

        let spawned = ThreadBuilder::with_context(self.thread_context.clone()).spawn(move || {
            let _exit = StoppedOnExit(state);
            debug!(listener = %name, "listener started");
            run_loop.run();
            debug!(listener = %name, "listener stopped");
        });

        match spawned {
            Ok(thread) => {
                *worker = Worker::Running(thread);
                Ok(())
            }
            Err(e) => {
                self.state
                    .store(ListenerState::Stopped as u8, Ordering::Release);
                Err(DisruptorError::Spawn(e))
            }
        }
    }

    /// Ask the loop to stop
    ///
    /// Idempotent and callable from any thread. A running listener finishes
    /// its in-flight batch and exits without waiting for further publishes;
    /// an idle one goes straight to stopped.
    pub fn stop(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let next = match ListenerState::from_u8(current) {
                ListenerState::Idle => ListenerState::Stopped,
                ListenerState::Running => ListenerState::Draining,
                ListenerState::Draining | ListenerState::Stopped => return,
            };
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        trace!(listener = %self.name, "stop requested");
        self.barrier.alert();
    }

    /// Stop the listener and wait for its thread to exit
    ///
    /// # Errors
    /// `DisruptorError::ListenerPanicked` if the consumer panicked
    pub fn close(&self) -> Result<()> {
        self.stop();

        let thread = match std::mem::replace(&mut *self.worker.lock(), Worker::Finished) {
            Worker::Running(thread) => thread,
            Worker::Pending(_) | Worker::Finished => return Ok(()),
        };

        thread.join().map_err(|_| {
            error!(listener = %self.name, "listener thread panicked");
            DisruptorError::ListenerPanicked(self.name.clone())
        })
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("name", &self.name)
            .field("sequence", &self.sequence.get())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Marks the listener stopped however its thread exits, panics included
struct StoppedOnExit(Arc<AtomicU8>);

impl Drop for StoppedOnExit {
    fn drop(&mut self) {
        self.0.store(ListenerState::Stopped as u8, Ordering::Release);
    }
}

struct RunLoop {
    sequence: Arc<Sequence>,
    barrier: Arc<ProcessingSequenceBarrier>,
    max_batch_size: Option<i64>,
    consumer: Box<dyn Consumer>,
}

impl RunLoop {
    fn run(mut self) {
        let mut next_sequence = self.sequence.get() + 1;

        loop {
            let available = match self.barrier.available_up_to(next_sequence) {
                Ok(available) => available,
                Err(DisruptorError::Timeout) => continue,
                Err(DisruptorError::Alert) => break,
                Err(e) => {
                    error!(error = %e, "listener wait failed");
                    break;
                }
            };

            if available < next_sequence {
                continue;
            }

            self.dispatch(next_sequence, available);
            self.sequence.set(available);
            self.barrier.signal();
            next_sequence = available + 1;
        }
    }

    fn dispatch(&mut self, lower: i64, upper: i64) {
        let Some(max_batch_size) = self.max_batch_size else {
            self.consumer.consume(lower, upper, true);
            return;
        };

        let mut start = lower;
        while start <= upper {
            let end = upper.min(start.saturating_add(max_batch_size - 1));
            self.consumer.consume(start, end, end == upper);
            start = end + 1;
        }
    }
}

/// Aggregate start/stop handle over every listener of a pipeline
///
/// Stopping also raises the halt flag shared with the sequencer, so a
/// producer blocked in `claim` is released with `DisruptorError::Alert`.
/// Dropping the handle stops and joins every listener.
#[derive(Debug)]
pub struct CompositeListener {
    listeners: Vec<Listener>,
    halted: Arc<AtomicBool>,
    wait_strategy: Option<Arc<dyn WaitStrategy>>,
}

impl CompositeListener {
    pub fn new(listeners: Vec<Listener>, halted: Arc<AtomicBool>) -> Self {
        let wait_strategy = listeners
            .first()
            .map(|listener| Arc::clone(listener.barrier.wait_strategy()));
        Self {
            listeners,
            halted,
            wait_strategy,
        }
    }

    /// Start every listener
    ///
    /// If one fails to start, the whole pipeline is stopped: started
    /// listeners exit, the rest never run, and a blocked producer is released.
    ///
    /// # Errors
    /// The first error reported by [`Listener::start`]
    pub fn start(&self) -> Result<()> {
        for (index, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.start() {
                warn!(listener = index, error = %e, "pipeline start failed");
                self.stop();
                return Err(e);
            }
        }
        debug!(listeners = self.listeners.len(), "pipeline started");
        Ok(())
    }

    /// Signal every listener, and a producer blocked in `claim`, to stop
    pub fn stop(&self) {
        if !self.halted.swap(true, Ordering::AcqRel) {
            debug!(listeners = self.listeners.len(), "pipeline stopping");
        }
        for listener in &self.listeners {
            listener.stop();
        }
        // wakes a producer parked in claim
        if let Some(wait_strategy) = &self.wait_strategy {
            wait_strategy.signal_all_when_blocking();
        }
    }

    /// Stop and wait for every listener thread to exit
    ///
    /// # Errors
    /// The first `DisruptorError::ListenerPanicked`; all listeners are joined
    /// regardless
    pub fn close(&self) -> Result<()> {
        self.stop();
        let mut first_error = None;
        for listener in &self.listeners {
            if let Err(e) = listener.close() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn is_running(&self) -> bool {
        self.listeners.iter().any(Listener::is_running)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Each listener's sequence, in stage order
    pub fn sequences(&self) -> Vec<Arc<Sequence>> {
        self.listeners
            .iter()
            .map(|listener| Arc::clone(listener.sequence()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Drop for CompositeListener {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
