//! Round-robin load balancing strategy.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{Candidates, LoadBalancer};
use crate::registry::ServiceId;
use crate::stats::StatsSnapshot;

/// Round-robin selector.
/// Keeps one rotating counter per service; the index is taken modulo the
/// current candidate count, so a shrinking set never goes out of bounds.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursors: DashMap<ServiceId, AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ticket(&self, service: &ServiceId) -> usize {
        if let Some(cursor) = self.cursors.get(service) {
            return cursor.fetch_add(1, Ordering::Relaxed);
        }
        self.cursors
            .entry(service.clone())
            .or_default()
            .fetch_add(1, Ordering::Relaxed)
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn choose<'a>(&self, service: &ServiceId, candidates: Candidates<'a>) -> &'a StatsSnapshot {
        let index = self.next_ticket(service) % candidates.len();
        &candidates.as_slice()[index]
    }
}
