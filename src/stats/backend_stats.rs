//! Per-backend outcome counters.
//!
//! # Responsibilities
//! - Count successes and failures for one backend of one service
//! - Track the failure streak that drives short-circuiting
//! - Track in-flight attempts and a latency moving average
//!
//! # Short-circuit rule
//! ```text
//! success                       → streak = 0
//! failure, gap > window, !open  → streak = 1 (stale streak dropped)
//! failure otherwise             → streak += 1
//! open ⇔ streak >= threshold && now - last_failure < window
//! ```
//! Once the window after the last failure elapses the backend is eligible
//! again; a failed probe re-opens it immediately since the streak is kept.

use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::ShortCircuitConfig;
use crate::registry::BackendServer;

const NEVER: u64 = u64::MAX;

/// Live counters for one backend. Only the tracker holds these.
#[derive(Debug)]
pub struct BackendStats {
    successes: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU32,
    last_failure_ms: AtomicU64,
    last_success_ms: AtomicU64,
    outstanding: AtomicUsize,
    /// Exponentially weighted latency in microseconds, 0 until measured.
    latency_ewma_us: AtomicU64,
}

impl Default for BackendStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendStats {
    pub fn new() -> Self {
        Self {
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            consecutive_failures: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(NEVER),
            last_success_ms: AtomicU64::new(NEVER),
            outstanding: AtomicUsize::new(0),
            latency_ewma_us: AtomicU64::new(0),
        }
    }

    /// Record a success. Returns true if the backend was short-circuited.
    pub fn mark_success(&self, now_ms: u64, policy: &ShortCircuitConfig) -> bool {
        let was_open = self.is_short_circuited(now_ms, policy);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.last_success_ms.store(now_ms, Ordering::Relaxed);
        was_open
    }

    /// Record a failure. Returns true if this failure opened the short-circuit.
    pub fn mark_failure(&self, now_ms: u64, policy: &ShortCircuitConfig) -> bool {
        let was_open = self.is_short_circuited(now_ms, policy);
        self.failures.fetch_add(1, Ordering::Relaxed);

        let previous = self.last_failure_ms.swap(now_ms, Ordering::Relaxed);
        let streak = self.consecutive_failures.load(Ordering::Relaxed);
        let stale = previous != NEVER && now_ms.saturating_sub(previous) > policy.window_ms;
        if stale && streak < policy.threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        }

        let streak = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        !was_open && streak >= policy.threshold
    }

    /// True while the backend must be excluded from selection.
    pub fn is_short_circuited(&self, now_ms: u64, policy: &ShortCircuitConfig) -> bool {
        if self.consecutive_failures.load(Ordering::Relaxed) < policy.threshold {
            return false;
        }
        let last = self.last_failure_ms.load(Ordering::Relaxed);
        last != NEVER && now_ms.saturating_sub(last) < policy.window_ms
    }

    pub fn inc_outstanding(&self) {
        self.outstanding.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_outstanding(&self) {
        // Saturate at zero; a stray decrement must not wrap.
        let _ = self
            .outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }

    /// Fold one latency sample into the moving average (alpha = 0.2).
    pub fn record_latency(&self, elapsed: Duration) {
        let sample = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX).max(1);
        let _ = self
            .latency_ewma_us
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |old| {
                Some(if old == 0 {
                    sample
                } else {
                    old.saturating_mul(4).saturating_add(sample) / 5
                })
            });
    }

    /// Copy the counters into a read-only snapshot.
    pub fn snapshot(
        &self,
        server: BackendServer,
        now_ms: u64,
        policy: &ShortCircuitConfig,
    ) -> StatsSnapshot {
        let last_failure = self.last_failure_ms.load(Ordering::Relaxed);
        let last_success = self.last_success_ms.load(Ordering::Relaxed);
        let latency = self.latency_ewma_us.load(Ordering::Relaxed);
        StatsSnapshot {
            server,
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_failure_ms: (last_failure != NEVER).then_some(last_failure),
            last_success_ms: (last_success != NEVER).then_some(last_success),
            outstanding: self.outstanding(),
            latency_us: (latency != 0).then_some(latency),
            short_circuited: self.is_short_circuited(now_ms, policy),
        }
    }
}

/// Point-in-time copy of one backend's counters, as seen by strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub server: BackendServer,
    pub successes: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    /// Tracker clock time of the latest failure.
    pub last_failure_ms: Option<u64>,
    pub last_success_ms: Option<u64>,
    pub outstanding: usize,
    /// Moving average latency of successful attempts.
    pub latency_us: Option<u64>,
    pub short_circuited: bool,
}

impl StatsSnapshot {
    /// Snapshot of a backend that has never been observed.
    pub fn idle(server: BackendServer) -> Self {
        Self {
            server,
            successes: 0,
            failures: 0,
            consecutive_failures: 0,
            last_failure_ms: None,
            last_success_ms: None,
            outstanding: 0,
            latency_us: None,
            short_circuited: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(threshold: u32, window_ms: u64) -> ShortCircuitConfig {
        ShortCircuitConfig { threshold, window_ms }
    }

    #[test]
    fn test_trips_at_threshold() {
        let stats = BackendStats::new();
        let p = policy(3, 1000);

        assert!(!stats.mark_failure(10, &p));
        assert!(!stats.mark_failure(20, &p));
        assert!(!stats.is_short_circuited(20, &p));
        assert!(stats.mark_failure(30, &p));
        assert!(stats.is_short_circuited(30, &p));

        // Further failures while open do not report a new trip.
        assert!(!stats.mark_failure(40, &p));
    }

    #[test]
    fn test_success_closes() {
        let stats = BackendStats::new();
        let p = policy(2, 1000);
        stats.mark_failure(0, &p);
        stats.mark_failure(1, &p);
        assert!(stats.is_short_circuited(2, &p));

        assert!(stats.mark_success(3, &p));
        assert!(!stats.is_short_circuited(3, &p));
        assert_eq!(stats.snapshot(BackendServer::new("h", 1), 3, &p).consecutive_failures, 0);
    }

    #[test]
    fn test_stale_failures_do_not_accumulate() {
        let stats = BackendStats::new();
        let p = policy(2, 100);
        stats.mark_failure(0, &p);
        // Second failure lands outside the window: streak restarts.
        assert!(!stats.mark_failure(500, &p));
        assert!(!stats.is_short_circuited(500, &p));
        assert!(stats.mark_failure(550, &p));
    }

    #[test]
    fn test_short_circuit_expires_and_failed_probe_reopens() {
        let stats = BackendStats::new();
        let p = policy(2, 100);
        stats.mark_failure(0, &p);
        stats.mark_failure(10, &p);
        assert!(stats.is_short_circuited(50, &p));
        assert!(!stats.is_short_circuited(110, &p));

        // Probe fails after expiry: open again straight away.
        assert!(stats.mark_failure(120, &p));
        assert!(stats.is_short_circuited(121, &p));
    }

    #[test]
    fn test_snapshot_carries_outcome_times() {
        let stats = BackendStats::new();
        let server = BackendServer::new("h", 1);
        let p = policy(5, 1000);
        let snap = stats.snapshot(server.clone(), 0, &p);
        assert_eq!((snap.last_failure_ms, snap.last_success_ms), (None, None));

        stats.mark_failure(40, &p);
        stats.mark_success(75, &p);
        let snap = stats.snapshot(server, 80, &p);
        assert_eq!(snap.last_failure_ms, Some(40));
        assert_eq!(snap.last_success_ms, Some(75));
    }

    #[test]
    fn test_outstanding_never_wraps() {
        let stats = BackendStats::new();
        stats.inc_outstanding();
        stats.dec_outstanding();
        stats.dec_outstanding();
        assert_eq!(stats.outstanding(), 0);
    }

    #[test]
    fn test_latency_average() {
        let stats = BackendStats::new();
        let server = BackendServer::new("h", 1);
        let p = policy(1, 1);
        assert_eq!(stats.snapshot(server.clone(), 0, &p).latency_us, None);

        stats.record_latency(Duration::from_micros(1000));
        assert_eq!(stats.snapshot(server.clone(), 0, &p).latency_us, Some(1000));

        stats.record_latency(Duration::from_micros(2000));
        assert_eq!(stats.snapshot(server, 0, &p).latency_us, Some(1200));
    }
}
