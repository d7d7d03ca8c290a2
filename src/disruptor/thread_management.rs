//! Thread management for listener workers
//!
//! Every listener runs on its own named OS thread, optionally pinned to a
//! CPU core. Pinning failures are logged and otherwise ignored: a listener
//! on the wrong core is slower, not incorrect.

use core_affinity::CoreId;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Naming and affinity settings for one worker thread
#[derive(Debug, Clone, Default)]
pub struct ThreadContext {
    /// CPU core affinity (optional)
    affinity: Option<CoreId>,
    /// Thread name (optional)
    name: Option<String>,
}

impl ThreadContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the thread to `core_id`
    ///
    /// Availability is checked by [`Wireup`](crate::disruptor::Wireup) when
    /// the pipeline is built.
    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.affinity = Some(CoreId { id: core_id });
        self
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn core(&self) -> Option<usize> {
        self.affinity.map(|core| core.id)
    }
}

/// Owned handle to a spawned worker thread
#[derive(Debug)]
pub struct ManagedThread {
    join_handle: Option<JoinHandle<()>>,
    thread_name: String,
}

impl ManagedThread {
    pub(crate) fn new(join_handle: JoinHandle<()>, thread_name: String) -> Self {
        Self {
            join_handle: Some(join_handle),
            thread_name,
        }
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Wait for the thread to finish
    ///
    /// Returns the panic payload if the thread panicked.
    pub fn join(mut self) -> thread::Result<()> {
        match self.join_handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

/// Spawns threads according to a [`ThreadContext`]
#[derive(Debug, Default)]
pub struct ThreadBuilder {
    context: ThreadContext,
}

impl ThreadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: ThreadContext) -> Self {
        Self { context }
    }

    pub fn pin_at_core(mut self, core_id: usize) -> Self {
        self.context = self.context.pin_at_core(core_id);
        self
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.context = self.context.thread_name(name);
        self
    }

    /// Spawn a thread running `f`
    ///
    /// # Errors
    /// Returns the I/O error reported by the OS if the thread cannot be created
    pub fn spawn<F>(self, f: F) -> std::io::Result<ManagedThread>
    where
        F: FnOnce() + Send + 'static,
    {
        let ThreadContext { affinity, name } = self.context;
        let thread_name = name.unwrap_or_else(|| "listener".to_owned());

        let name_for_closure = thread_name.clone();
        let join_handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                set_affinity_if_defined(affinity, &name_for_closure);
                f();
            })?;

        Ok(ManagedThread::new(join_handle, thread_name))
    }
}

/// Whether `core_id` exists on this machine
pub fn is_core_available(core_id: usize) -> bool {
    get_available_cores().contains(&core_id)
}

pub fn get_available_cores() -> Vec<usize> {
    core_affinity::get_core_ids()
        .unwrap_or_default()
        .iter()
        .map(|core| core.id)
        .collect()
}

fn set_affinity_if_defined(affinity: Option<CoreId>, thread_name: &str) {
    if let Some(core_id) = affinity {
        if core_affinity::set_for_current(core_id) {
            debug!(thread = thread_name, core = core_id.id, "pinned listener thread");
        } else {
            warn!(thread = thread_name, core = core_id.id, "could not pin listener thread");
        }
    }
}
