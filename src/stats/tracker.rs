//! Stats tracker: owner of every `BackendStats`.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ShortCircuitConfig;
use crate::observability::metrics;
use crate::registry::{BackendServer, ServiceId};
use crate::stats::backend_stats::{BackendStats, StatsSnapshot};
use crate::stats::clock::{Clock, MonotonicClock};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StatsKey {
    service: ServiceId,
    server: BackendServer,
}

impl StatsKey {
    fn new(service: &ServiceId, server: &BackendServer) -> Self {
        Self {
            service: service.clone(),
            server: server.clone(),
        }
    }
}

/// Tracks health signals for every backend of every service.
#[derive(Debug)]
pub struct StatsTracker {
    stats: DashMap<StatsKey, Arc<BackendStats>>,
    policy: ShortCircuitConfig,
    clock: Arc<dyn Clock>,
}

impl StatsTracker {
    pub fn new(policy: ShortCircuitConfig) -> Self {
        Self::with_clock(policy, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(policy: ShortCircuitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            stats: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &ShortCircuitConfig {
        &self.policy
    }

    fn existing(&self, service: &ServiceId, server: &BackendServer) -> Option<Arc<BackendStats>> {
        self.stats
            .get(&StatsKey::new(service, server))
            .map(|entry| entry.value().clone())
    }

    fn entry(&self, service: &ServiceId, server: &BackendServer) -> Arc<BackendStats> {
        if let Some(stats) = self.existing(service, server) {
            return stats;
        }
        self.stats
            .entry(StatsKey::new(service, server))
            .or_insert_with(|| Arc::new(BackendStats::new()))
            .value()
            .clone()
    }

    pub fn record_success(&self, service: &ServiceId, server: &BackendServer) {
        let stats = self.entry(service, server);
        self.apply_success(service, server, &stats);
    }

    pub fn record_failure(&self, service: &ServiceId, server: &BackendServer, cause: &dyn fmt::Display) {
        let stats = self.entry(service, server);
        self.apply_failure(service, server, &stats, cause);
    }

    fn apply_success(&self, service: &ServiceId, server: &BackendServer, stats: &BackendStats) {
        if stats.mark_success(self.clock.now_millis(), &self.policy) {
            tracing::info!(service = %service, server = %server, "Backend recovered from short-circuit");
        }
    }

    fn apply_failure(
        &self,
        service: &ServiceId,
        server: &BackendServer,
        stats: &BackendStats,
        cause: &dyn fmt::Display,
    ) {
        tracing::debug!(service = %service, server = %server, cause = %cause, "Backend attempt failed");
        if stats.mark_failure(self.clock.now_millis(), &self.policy) {
            tracing::warn!(
                service = %service,
                server = %server,
                threshold = self.policy.threshold,
                window_ms = self.policy.window_ms,
                "Backend short-circuited"
            );
            metrics::record_short_circuit(service.as_str());
        }
    }

    /// Start an attempt against `server`; the guard tracks it as outstanding.
    pub fn begin<'a>(&'a self, service: &'a ServiceId, server: &'a BackendServer) -> AttemptGuard<'a> {
        let stats = self.entry(service, server);
        stats.inc_outstanding();
        AttemptGuard {
            tracker: self,
            service,
            server,
            stats,
            started: Instant::now(),
        }
    }

    /// False while the backend is short-circuited. Unobserved backends are available.
    pub fn is_available(&self, service: &ServiceId, server: &BackendServer) -> bool {
        self.existing(service, server)
            .map_or(true, |s| !s.is_short_circuited(self.clock.now_millis(), &self.policy))
    }

    /// Read-only copy of one backend's stats; never creates an entry.
    pub fn snapshot_of(&self, service: &ServiceId, server: &BackendServer) -> StatsSnapshot {
        match self.existing(service, server) {
            Some(stats) => stats.snapshot(server.clone(), self.clock.now_millis(), &self.policy),
            None => StatsSnapshot::idle(server.clone()),
        }
    }

    /// Read-only copies of every tracked backend of `service`, sorted by server.
    pub fn snapshot(&self, service: &ServiceId) -> Vec<StatsSnapshot> {
        let now = self.clock.now_millis();
        let mut snapshots: Vec<StatsSnapshot> = self
            .stats
            .iter()
            .filter(|entry| &entry.key().service == service)
            .map(|entry| entry.value().snapshot(entry.key().server.clone(), now, &self.policy))
            .collect();
        snapshots.sort_by(|a, b| a.server.cmp(&b.server));
        snapshots
    }

    /// Drop stats of servers that left the service.
    pub fn forget(&self, service: &ServiceId, servers: &[BackendServer]) {
        for server in servers {
            if self.stats.remove(&StatsKey::new(service, server)).is_some() {
                tracing::debug!(service = %service, server = %server, "Dropped backend stats");
            }
        }
    }

    /// Drop every stats entry of `service`.
    pub fn forget_service(&self, service: &ServiceId) {
        self.stats.retain(|key, _| &key.service != service);
    }

    /// Number of stats entries held, across services.
    pub fn tracked(&self) -> usize {
        self.stats.len()
    }
}

/// An in-flight attempt. Outstanding count is released on drop.
///
/// Outcomes land on the stats the attempt started with. If the server was
/// forgotten meanwhile, the outcome goes nowhere and no entry is recreated.
#[derive(Debug)]
pub struct AttemptGuard<'a> {
    tracker: &'a StatsTracker,
    service: &'a ServiceId,
    server: &'a BackendServer,
    stats: Arc<BackendStats>,
    started: Instant,
}

impl AttemptGuard<'_> {
    /// Record success and latency; returns the attempt duration.
    pub fn succeed(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.stats.record_latency(elapsed);
        self.tracker.apply_success(self.service, self.server, &self.stats);
        elapsed
    }

    /// Record failure; returns the attempt duration.
    pub fn fail(self, cause: &dyn fmt::Display) -> Duration {
        let elapsed = self.started.elapsed();
        self.tracker.apply_failure(self.service, self.server, &self.stats, cause);
        elapsed
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.stats.dec_outstanding();
    }
}
