/// Configuration for system graph execution
///
/// Holds the network layout (host, base port), the scheduler time step and
/// how components are brought up and read.
use crate::core::net::SocketOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How components are brought up and torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// One component after another
    #[default]
    Sequential,
    /// Input connection and teardown fan out over a Rayon pool
    Rayon,
}

/// What a component waits for before reading an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Read whatever was delivered last; no barrier
    #[default]
    Latest,
    /// For inputs whose producer already ran in the current tick, wait up to
    /// `timeout` for that tick's value to arrive
    AwaitFresh { timeout: Duration },
}

/// Configuration for a system graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Address inputs connect to
    pub host: String,
    /// First port handed out by the sequential allocator
    pub base_port: u16,
    /// Scheduler tick length in simulated seconds
    pub time_step: f64,
    pub socket: SocketOptions,
    pub concurrency_mode: ConcurrencyMode,
    /// Only relevant when concurrency_mode is Rayon
    pub thread_pool_size: Option<usize>,
    pub delivery_mode: DeliveryMode,
    /// Keep every evaluation in a per-component trace
    pub record_trace: bool,
    /// Turn on debug logging for every node
    pub debug: bool,
}

impl GraphConfig {
    pub fn new() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            base_port: 5000,
            time_step: 0.01,
            socket: SocketOptions::default(),
            concurrency_mode: ConcurrencyMode::default(),
            thread_pool_size: None,
            delivery_mode: DeliveryMode::default(),
            record_trace: false,
            debug: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn with_time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_socket_options(mut self, options: SocketOptions) -> Self {
        self.socket = options;
        self
    }

    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = mode;
        self
    }

    pub fn with_thread_pool_size(mut self, size: usize) -> Self {
        self.thread_pool_size = Some(size);
        self
    }

    pub fn with_delivery(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    pub fn with_trace(mut self, record: bool) -> Self {
        self.record_trace = record;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.concurrency_mode, ConcurrencyMode::Sequential);
        assert_eq!(config.delivery_mode, DeliveryMode::Latest);
        assert_eq!(config.thread_pool_size, None);
        assert_eq!(config.host, "127.0.0.1");
        assert!(!config.record_trace);
    }

    #[test]
    fn test_config_builder() {
        let config = GraphConfig::new()
            .with_concurrency(ConcurrencyMode::Rayon)
            .with_thread_pool_size(4)
            .with_base_port(6000)
            .with_time_step(0.001)
            .with_delivery(DeliveryMode::AwaitFresh {
                timeout: Duration::from_millis(50),
            });

        assert_eq!(config.concurrency_mode, ConcurrencyMode::Rayon);
        assert_eq!(config.thread_pool_size, Some(4));
        assert_eq!(config.base_port, 6000);
        assert_eq!(config.time_step, 0.001);
        assert!(matches!(config.delivery_mode, DeliveryMode::AwaitFresh { .. }));
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = GraphConfig::new().with_trace(true).with_base_port(7100);
        let text = serde_json::to_string(&config).unwrap();
        let back: GraphConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
