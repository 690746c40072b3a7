//! Per-service server lists with atomically swapped snapshots.
//!
//! # Responsibilities
//! - Hold the authoritative backend set for every known service
//! - Replace a service's set in one atomic swap
//! - Report which servers a refresh added and removed

use arc_swap::ArcSwap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::registry::server::{BackendServer, ServiceId};

type ServiceMap = HashMap<ServiceId, Arc<[BackendServer]>>;

/// Difference between the previous and the new snapshot of one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Refreshed {
    pub added: Vec<BackendServer>,
    pub removed: Vec<BackendServer>,
}

impl Refreshed {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Registry of backend servers keyed by service.
///
/// The whole map sits behind a single `ArcSwap`, so readers take a
/// lock-free snapshot and a refresh publishes with one pointer store.
#[derive(Debug, Default)]
pub struct ServerList {
    inner: ArcSwap<ServiceMap>,
}

impl ServerList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current servers of `service`, empty if none are configured.
    pub fn get_servers(&self, service: &ServiceId) -> Arc<[BackendServer]> {
        self.inner
            .load()
            .get(service)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new()))
    }

    /// Replace the servers of `service`.
    ///
    /// Duplicates are dropped keeping the first occurrence, so the same input
    /// always yields the same snapshot.
    pub fn refresh<I>(&self, service: &ServiceId, servers: I) -> Refreshed
    where
        I: IntoIterator<Item = BackendServer>,
    {
        let mut seen = HashSet::new();
        let next: Arc<[BackendServer]> = servers
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect();

        let previous = self.inner.rcu(|map| {
            let mut map = ServiceMap::clone(map);
            map.insert(service.clone(), next.clone());
            map
        });

        let refreshed = diff(previous.get(service).map(|s| &s[..]).unwrap_or(&[]), &next);
        if refreshed.is_unchanged() {
            tracing::debug!(service = %service, servers = next.len(), "Server list unchanged");
        } else {
            tracing::info!(
                service = %service,
                servers = next.len(),
                added = refreshed.added.len(),
                removed = refreshed.removed.len(),
                "Server list refreshed"
            );
        }
        refreshed
    }

    /// Drop a service entirely, returning the servers it had.
    pub fn remove(&self, service: &ServiceId) -> Vec<BackendServer> {
        if !self.inner.load().contains_key(service) {
            return Vec::new();
        }
        let previous = self.inner.rcu(|map| {
            let mut map = ServiceMap::clone(map);
            map.remove(service);
            map
        });
        tracing::info!(service = %service, "Service removed from server list");
        previous
            .get(service)
            .map(|s| s.to_vec())
            .unwrap_or_default()
    }

    /// Known services, sorted.
    pub fn services(&self) -> Vec<ServiceId> {
        let mut services: Vec<ServiceId> = self.inner.load().keys().cloned().collect();
        services.sort();
        services
    }
}

fn diff(old: &[BackendServer], new: &[BackendServer]) -> Refreshed {
    let old_set: HashSet<&BackendServer> = old.iter().collect();
    let new_set: HashSet<&BackendServer> = new.iter().collect();
    Refreshed {
        added: new.iter().filter(|s| !old_set.contains(s)).cloned().collect(),
        removed: old.iter().filter(|s| !new_set.contains(s)).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(ports: &[u16]) -> Vec<BackendServer> {
        ports.iter().map(|p| BackendServer::new("127.0.0.1", *p)).collect()
    }

    #[test]
    fn test_unknown_service_is_empty() {
        let list = ServerList::new();
        assert!(list.get_servers(&"missing".into()).is_empty());
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let list = ServerList::new();
        let svc = ServiceId::from("svc");

        let first = list.refresh(&svc, servers(&[1, 2, 3]));
        assert_eq!(first.added.len(), 3);
        let snapshot_a = list.get_servers(&svc);

        let second = list.refresh(&svc, servers(&[1, 2, 3]));
        assert!(second.is_unchanged());
        let snapshot_b = list.get_servers(&svc);

        assert_eq!(&snapshot_a[..], &snapshot_b[..]);
    }

    #[test]
    fn test_refresh_dedupes_and_reports_diff() {
        let list = ServerList::new();
        let svc = ServiceId::from("svc");
        list.refresh(&svc, servers(&[1, 2, 2, 3]));
        assert_eq!(&list.get_servers(&svc)[..], &servers(&[1, 2, 3])[..]);

        let diff = list.refresh(&svc, servers(&[3, 4]));
        assert_eq!(diff.added, servers(&[4]));
        assert_eq!(diff.removed, servers(&[1, 2]));
    }

    #[test]
    fn test_old_snapshot_survives_refresh() {
        let list = ServerList::new();
        let svc = ServiceId::from("svc");
        list.refresh(&svc, servers(&[1, 2]));
        let held = list.get_servers(&svc);

        list.refresh(&svc, servers(&[9]));

        assert_eq!(&held[..], &servers(&[1, 2])[..]);
        assert_eq!(&list.get_servers(&svc)[..], &servers(&[9])[..]);
    }

    #[test]
    fn test_remove_service() {
        let list = ServerList::new();
        let a = ServiceId::from("a");
        let b = ServiceId::from("b");
        list.refresh(&b, servers(&[1]));
        list.refresh(&a, servers(&[2]));
        assert_eq!(list.services(), vec![a.clone(), b.clone()]);

        assert_eq!(list.remove(&a), servers(&[2]));
        assert!(list.remove(&a).is_empty());
        assert_eq!(list.services(), vec![b]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let list = Arc::new(ServerList::new());
        let svc = ServiceId::from("svc");
        let small = servers(&[1, 2]);
        let large = servers(&[10, 11, 12, 13]);
        list.refresh(&svc, small.clone());

        let writer = {
            let list = list.clone();
            let svc = svc.clone();
            let (small, large) = (small.clone(), large.clone());
            std::thread::spawn(move || {
                for i in 0..500 {
                    let next = if i % 2 == 0 { large.clone() } else { small.clone() };
                    list.refresh(&svc, next);
                }
            })
        };

        for _ in 0..2000 {
            let snap = list.get_servers(&svc);
            assert!(&snap[..] == &small[..] || &snap[..] == &large[..]);
        }
        writer.join().unwrap();
    }
}
