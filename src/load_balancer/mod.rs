//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator has the available backends of a service
//!     → StatsSnapshot per backend (stats::tracker)
//!     → Candidates::new (rejects empty input)
//!     → Apply load balancing algorithm:
//!         - random.rs (uniform pick, OS-seeded CSPRNG)
//!         - round_robin.rs (rotate per service)
//!         - least_loaded.rs (fewest in-flight, then fastest)
//!     → Return the chosen snapshot
//! ```
//!
//! # Design Decisions
//! - Strategies only read snapshots; stats are owned by the tracker
//! - Filtering unavailable backends is the caller's job
//! - Algorithm selection per service, with a global default

pub mod least_loaded;
pub mod random;
pub mod round_robin;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::registry::ServiceId;
use crate::stats::StatsSnapshot;

pub use least_loaded::LeastLoaded;
pub use random::RandomPick;
pub use round_robin::RoundRobin;

/// Non-empty set of backends a strategy may choose from.
#[derive(Debug, Clone, Copy)]
pub struct Candidates<'a>(&'a [StatsSnapshot]);

impl<'a> Candidates<'a> {
    /// `None` if `stats` is empty.
    pub fn new(stats: &'a [StatsSnapshot]) -> Option<Self> {
        (!stats.is_empty()).then_some(Self(stats))
    }

    pub fn as_slice(&self) -> &'a [StatsSnapshot] {
        self.0
    }

    /// Always at least 1.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> &'a StatsSnapshot {
        &self.0[0]
    }
}

/// Server selection strategy.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Pick exactly one of `candidates`.
    fn choose<'a>(&self, service: &ServiceId, candidates: Candidates<'a>) -> &'a StatsSnapshot;
}

/// Configurable strategy kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Random,
    #[default]
    RoundRobin,
    LeastLoaded,
}

impl StrategyKind {
    pub fn build(self) -> Arc<dyn LoadBalancer> {
        match self {
            StrategyKind::Random => Arc::new(RandomPick::new()),
            StrategyKind::RoundRobin => Arc::new(RoundRobin::new()),
            StrategyKind::LeastLoaded => Arc::new(LeastLoaded::new()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Random => "random",
            StrategyKind::RoundRobin => "round_robin",
            StrategyKind::LeastLoaded => "least_loaded",
        })
    }
}
