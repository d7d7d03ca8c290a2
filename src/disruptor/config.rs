//! Configuration Management
//!
//! Serializable pipeline settings, for callers that keep their pipeline
//! shape in a configuration file rather than in code. Consumers themselves
//! are code and are always attached through [`Wireup`](crate::disruptor::Wireup).

use crate::disruptor::{
    BlockingWaitStrategy, BusySpinWaitStrategy, DisruptorError, PhasedBackoffWaitStrategy,
    SleepingWaitStrategy, TimeoutBlockingWaitStrategy, WaitStrategy, YieldingWaitStrategy,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Wait strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitStrategyKind {
    BusySpin,
    Yielding,
    #[default]
    Sleeping,
    Blocking,
    TimeoutBlocking,
    PhasedBackoff,
}

impl WaitStrategyKind {
    /// Instantiate the strategy
    ///
    /// `timeout` bounds `TimeoutBlocking` waits and sets the spin and yield
    /// windows of `PhasedBackoff`; the other kinds ignore it.
    pub fn build(self, timeout: Duration) -> Arc<dyn WaitStrategy> {
        match self {
            Self::BusySpin => Arc::new(BusySpinWaitStrategy::new()),
            Self::Yielding => Arc::new(YieldingWaitStrategy::new()),
            Self::Sleeping => Arc::new(SleepingWaitStrategy::new()),
            Self::Blocking => Arc::new(BlockingWaitStrategy::new()),
            Self::TimeoutBlocking => Arc::new(TimeoutBlockingWaitStrategy::new(timeout)),
            Self::PhasedBackoff => Arc::new(PhasedBackoffWaitStrategy::with_lock(timeout, timeout)),
        }
    }
}

impl FromStr for WaitStrategyKind {
    type Err = DisruptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "busy-spin" | "busyspin" => Ok(Self::BusySpin),
            "yielding" => Ok(Self::Yielding),
            "sleeping" => Ok(Self::Sleeping),
            "blocking" => Ok(Self::Blocking),
            "timeout-blocking" | "timeoutblocking" => Ok(Self::TimeoutBlocking),
            "phased-backoff" | "phasedbackoff" => Ok(Self::PhasedBackoff),
            _ => Err(DisruptorError::UnknownWaitStrategy(s.to_owned())),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ring size, a power of two
    pub capacity: usize,
    /// How listeners (and a non-spinning producer) wait
    pub wait_strategy: WaitStrategyKind,
    /// Wait bound for timeout-based strategies, in microseconds
    pub wait_timeout_micros: u64,
    /// Busy-spin on the producer's claim path
    pub spin_wait: bool,
    /// Upper bound on the length of a range handed to a consumer
    pub max_batch_size: Option<usize>,
    /// Prefix for listener thread names
    pub thread_name_prefix: String,
    /// Cores assigned to listeners, in stage order
    pub listener_cores: Vec<usize>,
}

impl PipelineConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_micros(self.wait_timeout_micros)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            wait_strategy: WaitStrategyKind::default(),
            wait_timeout_micros: 1_000,
            spin_wait: true,
            max_batch_size: None,
            thread_name_prefix: "listener".to_owned(),
            listener_cores: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wait_strategy() {
        assert_eq!("busy-spin".parse::<WaitStrategyKind>().unwrap(), WaitStrategyKind::BusySpin);
        assert_eq!("BusySpin".parse::<WaitStrategyKind>().unwrap(), WaitStrategyKind::BusySpin);
        assert_eq!("Blocking".parse::<WaitStrategyKind>().unwrap(), WaitStrategyKind::Blocking);
        assert_eq!(
            "phased-backoff".parse::<WaitStrategyKind>().unwrap(),
            WaitStrategyKind::PhasedBackoff
        );
        assert!(matches!(
            "lazy".parse::<WaitStrategyKind>(),
            Err(DisruptorError::UnknownWaitStrategy(name)) if name == "lazy"
        ));
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.capacity, 1024);
        assert_eq!(config.wait_strategy, WaitStrategyKind::Sleeping);
        assert!(config.spin_wait);
        assert_eq!(config.wait_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "capacity": 64, "wait_strategy": "timeout-blocking", "spin_wait": false }"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 64);
        assert_eq!(config.wait_strategy, WaitStrategyKind::TimeoutBlocking);
        assert!(!config.spin_wait);
        assert_eq!(config.thread_name_prefix, "listener");
        assert!(config.listener_cores.is_empty());
    }

    #[test]
    fn test_build_every_kind() {
        for kind in [
            WaitStrategyKind::BusySpin,
            WaitStrategyKind::Yielding,
            WaitStrategyKind::Sleeping,
            WaitStrategyKind::Blocking,
            WaitStrategyKind::TimeoutBlocking,
            WaitStrategyKind::PhasedBackoff,
        ] {
            let strategy = kind.build(Duration::from_micros(100));
            strategy.signal_all_when_blocking();
        }
    }
}
