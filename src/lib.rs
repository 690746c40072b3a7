//! Load-balanced backend selection and retry.
//!
//! A service name maps to a set of backend servers (`registry`). Outcomes
//! of calls feed per-backend counters (`stats`) that short-circuit failing
//! backends. A pluggable strategy (`load_balancer`) picks among the rest,
//! and the coordinator (`resilience`) retries a logical call across
//! distinct backends until it succeeds, runs out, or is cancelled.

pub mod balancer;
pub mod config;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod probe;
pub mod registry;
pub mod resilience;
pub mod stats;

pub use balancer::{Balancer, ServiceReport};
pub use config::BalancerConfig;
pub use lifecycle::CancelSignal;
pub use load_balancer::{LoadBalancer, StrategyKind};
pub use registry::{BackendServer, ServerList, ServiceId};
pub use resilience::{CallError, RemoteInvoker, RetryCoordinator};
pub use stats::{StatsSnapshot, StatsTracker};
