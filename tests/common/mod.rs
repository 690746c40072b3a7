//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::net::TcpListener;

use r01f_loadbalance::load_balancer::{Candidates, LoadBalancer, RoundRobin};
use r01f_loadbalance::{BackendServer, RemoteInvoker, ServiceId, StatsSnapshot};

#[derive(Debug, Clone, thiserror::Error)]
#[error("backend {0} failed")]
pub struct BackendDown(pub String);

/// Invoker whose outcomes are decided up front.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    /// Invocations that fail before the first success, counted across servers.
    fail_first: usize,
    /// Servers that always fail.
    failing: HashSet<BackendServer>,
    calls: AtomicUsize,
    seen: Mutex<Vec<BackendServer>>,
}

impl ScriptedInvoker {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::default()
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn failing_servers(servers: impl IntoIterator<Item = BackendServer>) -> Self {
        Self {
            failing: servers.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<BackendServer> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteInvoker<str> for ScriptedInvoker {
    type Response = (BackendServer, String);
    type Error = BackendDown;

    async fn invoke(&self, server: &BackendServer, request: &str) -> Result<Self::Response, BackendDown> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(server.clone());
        tokio::task::yield_now().await;
        if n < self.fail_first || self.failing.contains(server) {
            Err(BackendDown(server.address()))
        } else {
            Ok((server.clone(), format!("{request} via {server}")))
        }
    }
}

/// Round-robin strategy that counts how often it is asked to choose.
#[derive(Debug, Default)]
pub struct CountingStrategy {
    inner: RoundRobin,
    pub chosen: AtomicUsize,
}

impl CountingStrategy {
    pub fn count(&self) -> usize {
        self.chosen.load(Ordering::SeqCst)
    }
}

impl LoadBalancer for CountingStrategy {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn choose<'a>(&self, service: &ServiceId, candidates: Candidates<'a>) -> &'a StatsSnapshot {
        self.chosen.fetch_add(1, Ordering::SeqCst);
        self.inner.choose(service, candidates)
    }
}

pub fn servers(n: u16) -> Vec<BackendServer> {
    (1..=n).map(|i| BackendServer::new("10.0.0.1", 8000 + i)).collect()
}

/// Start a TCP listener that accepts and immediately drops connections.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            drop(socket);
        }
    });
    addr
}

/// An address nothing is listening on.
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
