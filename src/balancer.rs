//! Balancer facade.
//!
//! # Responsibilities
//! - Build registry, stats tracker, strategies and coordinator from config
//! - Apply discovery updates, dropping stats of servers that leave
//! - Run logical calls and report per-service state

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::BalancerConfig;
use crate::lifecycle::CancelSignal;
use crate::observability::metrics;
use crate::registry::{BackendServer, Refreshed, ServerList, ServiceId};
use crate::resilience::{CallError, RemoteInvoker, RetryCoordinator};
use crate::stats::{Clock, MonotonicClock, StatsSnapshot, StatsTracker};

/// Point-in-time view of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceReport {
    pub service: ServiceId,
    pub strategy: &'static str,
    pub available: usize,
    pub servers: Vec<StatsSnapshot>,
}

/// Registry, stats and coordinator wired together.
#[derive(Debug)]
pub struct Balancer {
    registry: Arc<ServerList>,
    tracker: Arc<StatsTracker>,
    coordinator: RetryCoordinator,
}

impl Balancer {
    /// Build from an already validated configuration.
    pub fn from_config(config: &BalancerConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(config: &BalancerConfig, clock: Arc<dyn Clock>) -> Self {
        let registry = Arc::new(ServerList::new());
        let tracker = Arc::new(StatsTracker::with_clock(config.short_circuit, clock));

        let coordinator = config.services.iter().fold(
            RetryCoordinator::new(
                registry.clone(),
                tracker.clone(),
                config.balancer.strategy.build(),
                config.retries.clone(),
            ),
            |coordinator, service| match service.strategy {
                Some(kind) => coordinator.with_override(ServiceId::new(&service.name), kind.build()),
                None => coordinator,
            },
        );

        let balancer = Self {
            registry,
            tracker,
            coordinator,
        };
        balancer.apply_config(config);

        tracing::info!(
            services = config.services.len(),
            servers = config.servers.len(),
            strategy = %config.balancer.strategy,
            max_attempts = config.retries.max_attempts,
            "Balancer initialised"
        );
        balancer
    }

    /// Current servers of `service`. Changes go through [`Balancer::refresh`]
    /// so that stats follow the registry.
    pub fn servers(&self, service: &ServiceId) -> Arc<[BackendServer]> {
        self.registry.get_servers(service)
    }

    pub fn services(&self) -> Vec<ServiceId> {
        self.registry.services()
    }

    pub fn tracker(&self) -> &StatsTracker {
        &self.tracker
    }

    pub fn coordinator(&self) -> &RetryCoordinator {
        &self.coordinator
    }

    /// Replace the servers of `service`; stats of removed servers are dropped.
    pub fn refresh<I>(&self, service: &ServiceId, servers: I) -> Refreshed
    where
        I: IntoIterator<Item = BackendServer>,
    {
        let refreshed = self.registry.refresh(service, servers);
        self.tracker.forget(service, &refreshed.removed);
        metrics::record_backends(service.as_str(), self.registry.get_servers(service).len());
        refreshed
    }

    /// Forget a service and all of its stats.
    pub fn remove_service(&self, service: &ServiceId) {
        self.registry.remove(service);
        self.tracker.forget_service(service);
        metrics::record_backends(service.as_str(), 0);
    }

    /// Make the server lists match `config`. Returns how many services changed.
    pub fn apply_config(&self, config: &BalancerConfig) -> usize {
        let lists = config.server_lists();
        let mut changed = 0;

        let known: BTreeSet<ServiceId> = self.registry.services().into_iter().collect();
        for service in &known {
            if !lists.contains_key(service) {
                self.remove_service(service);
                changed += 1;
            }
        }
        for (service, servers) in &lists {
            if !self.refresh(service, servers.iter().cloned()).is_unchanged() || !known.contains(service) {
                changed += 1;
            }
        }
        changed
    }

    /// Run one logical call against `service`.
    pub async fn call<Req, I>(
        &self,
        service: &ServiceId,
        invoker: &I,
        request: &Req,
        cancel: &CancelSignal,
    ) -> Result<I::Response, CallError<I::Error>>
    where
        Req: ?Sized + Sync,
        I: RemoteInvoker<Req>,
    {
        self.coordinator.execute(service, invoker, request, cancel).await
    }

    /// Registered servers of `service` with their current stats.
    pub fn report(&self, service: &ServiceId) -> ServiceReport {
        let servers: Vec<StatsSnapshot> = self
            .registry
            .get_servers(service)
            .iter()
            .map(|s| self.tracker.snapshot_of(service, s))
            .collect();
        ServiceReport {
            service: service.clone(),
            strategy: self.coordinator.strategy_for(service).name(),
            available: servers.iter().filter(|s| !s.short_circuited).count(),
            servers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    const CONFIG: &str = r#"
        [balancer]
        strategy = "round_robin"

        [[services]]
        name = "orders"
        strategy = "least_loaded"

        [[services]]
        name = "billing"

        [[servers]]
        service = "orders"
        host = "10.0.0.1"
        port = 80

        [[servers]]
        service = "orders"
        host = "10.0.0.2"
        port = 80
    "#;

    #[test]
    fn test_from_config() {
        let balancer = Balancer::from_config(&parse_config(CONFIG).unwrap());
        let orders = ServiceId::from("orders");
        let billing = ServiceId::from("billing");

        assert_eq!(balancer.servers(&orders).len(), 2);
        assert!(balancer.servers(&billing).is_empty());
        assert_eq!(balancer.report(&orders).strategy, "least_loaded");
        assert_eq!(balancer.report(&billing).strategy, "round_robin");
    }

    #[test]
    fn test_refresh_drops_stats_of_removed_servers() {
        let balancer = Balancer::from_config(&parse_config(CONFIG).unwrap());
        let orders = ServiceId::from("orders");
        let gone = BackendServer::new("10.0.0.1", 80);
        let kept = BackendServer::new("10.0.0.2", 80);
        balancer.tracker().record_failure(&orders, &gone, &"x");
        balancer.tracker().record_success(&orders, &kept);

        let diff = balancer.refresh(&orders, vec![kept.clone()]);
        assert_eq!(diff.removed, vec![gone]);

        let stats = balancer.tracker().snapshot(&orders);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].server, kept);
    }

    #[test]
    fn test_outcome_of_removed_server_is_discarded() {
        let balancer = Balancer::from_config(&parse_config(CONFIG).unwrap());
        let orders = ServiceId::from("orders");
        let gone = BackendServer::new("10.0.0.1", 80);
        let kept = BackendServer::new("10.0.0.2", 80);

        let in_flight = balancer.tracker().begin(&orders, &gone);
        let diff = balancer.refresh(&orders, vec![kept.clone()]);
        assert_eq!(diff.removed, vec![gone.clone()]);

        in_flight.fail(&"late");
        assert!(balancer.tracker().snapshot(&orders).is_empty());
        assert_eq!(balancer.tracker().tracked(), 0);

        // Re-added later, the server starts clean.
        balancer.refresh(&orders, vec![gone.clone(), kept]);
        let report = balancer.report(&orders);
        assert_eq!(report.available, 2);
        assert_eq!(report.servers[0], StatsSnapshot::idle(gone));
    }

    #[test]
    fn test_report_counts_available() {
        let mut config = parse_config(CONFIG).unwrap();
        config.short_circuit.threshold = 1;
        let balancer = Balancer::from_config(&config);
        let orders = ServiceId::from("orders");
        balancer
            .tracker()
            .record_failure(&orders, &BackendServer::new("10.0.0.1", 80), &"x");

        let report = balancer.report(&orders);
        assert_eq!(report.servers.len(), 2);
        assert_eq!(report.available, 1);
    }
}
