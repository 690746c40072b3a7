//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::load_balancer::StrategyKind;
use crate::registry::{BackendServer, ServiceId};

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Default selection strategy.
    pub balancer: StrategyConfig,

    /// Retry settings for one logical call.
    pub retries: RetryConfig,

    /// When a failing backend is excluded from selection.
    pub short_circuit: ShortCircuitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Declared services.
    pub services: Vec<ServiceConfig>,

    /// Backend servers, each belonging to a declared service.
    pub servers: Vec<ServerConfig>,
}

impl BalancerConfig {
    /// Servers of each declared service, in file order.
    ///
    /// Declared services without servers map to an empty list.
    pub fn server_lists(&self) -> BTreeMap<ServiceId, Vec<BackendServer>> {
        let mut lists: BTreeMap<ServiceId, Vec<BackendServer>> = self
            .services
            .iter()
            .map(|s| (ServiceId::new(&s.name), Vec::new()))
            .collect();
        for server in &self.servers {
            lists
                .entry(ServiceId::new(&server.service))
                .or_default()
                .push(server.to_backend());
        }
        lists
    }
}

/// Strategy selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StrategyConfig {
    pub strategy: StrategyKind,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, the first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds (0 disables backoff).
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 0,
            max_delay_ms: 2000,
        }
    }
}

/// Short-circuit configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShortCircuitConfig {
    /// Consecutive failures that exclude a backend.
    pub threshold: u32,

    /// Failures further apart than this do not add up; also how long an
    /// excluded backend stays out after its latest failure.
    pub window_ms: u64,
}

impl Default for ShortCircuitConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window_ms: 30_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A logical service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Service identifier.
    pub name: String,

    /// Strategy override for this service.
    #[serde(default)]
    pub strategy: Option<StrategyKind>,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Service this server belongs to.
    pub service: String,

    pub host: String,

    pub port: u16,

    /// Free-form labels (zone, version, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ServerConfig {
    pub fn to_backend(&self) -> BackendServer {
        self.metadata
            .iter()
            .fold(BackendServer::new(&self.host, self.port), |server, (k, v)| {
                server.with_metadata(k, v)
            })
    }
}
