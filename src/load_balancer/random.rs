//! Uniform random load balancing strategy.

use rand::Rng;

use crate::load_balancer::{Candidates, LoadBalancer};
use crate::registry::ServiceId;
use crate::stats::StatsSnapshot;

/// Random selector.
/// Uses the thread-local ChaCha generator, seeded from the OS, so picks are
/// not predictable from outside.
#[derive(Debug, Default)]
pub struct RandomPick;

impl RandomPick {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomPick {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose<'a>(&self, _service: &ServiceId, candidates: Candidates<'a>) -> &'a StatsSnapshot {
        let index = rand::thread_rng().gen_range(0..candidates.len());
        &candidates.as_slice()[index]
    }
}
