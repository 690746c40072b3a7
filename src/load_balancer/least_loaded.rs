//! Least-loaded load balancing strategy.

use crate::load_balancer::{Candidates, LoadBalancer};
use crate::registry::ServiceId;
use crate::stats::StatsSnapshot;

/// Least-loaded selector.
///
/// Ordering, lowest wins:
/// 1. outstanding (in-flight) attempts
/// 2. latency moving average, unmeasured backends counting as 0 so they get tried
/// 3. server identity (host, port, metadata) ascending
///
/// The last key makes ties deterministic regardless of the order the
/// candidates arrive in.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl LeastLoaded {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastLoaded {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn choose<'a>(&self, _service: &ServiceId, candidates: Candidates<'a>) -> &'a StatsSnapshot {
        candidates
            .as_slice()
            .iter()
            .min_by(|a, b| {
                (a.outstanding, a.latency_us.unwrap_or(0))
                    .cmp(&(b.outstanding, b.latency_us.unwrap_or(0)))
                    .then_with(|| a.server.cmp(&b.server))
            })
            .unwrap_or_else(|| candidates.first())
    }
}
