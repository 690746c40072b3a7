//! Retry coordination for one logical call.
//!
//! # State Machine
//! ```text
//! Start ──(no available backend)──▶ NoServerAvailable
//!   │
//!   ▼
//! [cancelled?] ──yes──▶ Cancelled
//!   │
//!   ▼
//! Selecting ──▶ Attempting ──ok──▶ response
//!   ▲               │
//!   │             fail
//!   │               ▼
//!   └──(attempts < max && untried left)── record failure ──else──▶ RetriesExceeded
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::lifecycle::CancelSignal;
use crate::load_balancer::{Candidates, LoadBalancer};
use crate::observability::metrics;
use crate::registry::{BackendServer, ServerList, ServiceId};
use crate::resilience::backoff::backoff_delay;
use crate::resilience::error::CallError;
use crate::stats::{StatsSnapshot, StatsTracker};

/// Performs the actual remote operation against one chosen backend.
///
/// Timeouts are the implementor's responsibility.
#[async_trait]
pub trait RemoteInvoker<Req: ?Sized + Sync>: Send + Sync {
    type Response: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn invoke(&self, server: &BackendServer, request: &Req) -> Result<Self::Response, Self::Error>;
}

/// Runs logical calls across the backends of a service.
#[derive(Clone)]
pub struct RetryCoordinator {
    registry: Arc<ServerList>,
    tracker: Arc<StatsTracker>,
    strategy: Arc<dyn LoadBalancer>,
    overrides: HashMap<ServiceId, Arc<dyn LoadBalancer>>,
    policy: RetryConfig,
}

impl fmt::Debug for RetryCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCoordinator")
            .field("strategy", &self.strategy.name())
            .field("overrides", &self.overrides.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl RetryCoordinator {
    pub fn new(
        registry: Arc<ServerList>,
        tracker: Arc<StatsTracker>,
        strategy: Arc<dyn LoadBalancer>,
        policy: RetryConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            strategy,
            overrides: HashMap::new(),
            policy,
        }
    }

    /// Use `strategy` instead of the default for `service`.
    pub fn with_override(mut self, service: ServiceId, strategy: Arc<dyn LoadBalancer>) -> Self {
        self.overrides.insert(service, strategy);
        self
    }

    pub fn strategy_for(&self, service: &ServiceId) -> &Arc<dyn LoadBalancer> {
        self.overrides.get(service).unwrap_or(&self.strategy)
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Run one logical call against `service`.
    pub async fn execute<Req, I>(
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
        let span = tracing::debug_span!("lb_call", call_id = %Uuid::new_v4(), service = %service);
        let result = self.run(service, invoker, request, cancel).instrument(span).await;
        metrics::record_call(
            service.as_str(),
            match &result {
                Ok(_) => "success",
                Err(CallError::NoServerAvailable { .. }) => "no_server",
                Err(CallError::RetriesExceeded { .. }) => "retries_exceeded",
                Err(CallError::Cancelled { .. }) => "cancelled",
            },
        );
        result
    }

    async fn run<Req, I>(
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
        let registered = self.registry.get_servers(service);
        let mut remaining: Vec<BackendServer> = registered
            .iter()
            .filter(|s| self.tracker.is_available(service, s))
            .cloned()
            .collect();

        if remaining.is_empty() {
            if registered.is_empty() {
                tracing::warn!("No backends registered");
            } else {
                tracing::warn!(registered = registered.len(), "All backends short-circuited");
            }
            return Err(CallError::NoServerAvailable {
                service: service.clone(),
            });
        }

        let strategy = self.strategy_for(service);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0u32;
        let mut tried: Vec<BackendServer> = Vec::new();
        let mut last_error: Option<I::Error> = None;

        loop {
            if cancel.is_cancelled() {
                tracing::info!(attempts, "Call cancelled");
                return Err(CallError::Cancelled {
                    service: service.clone(),
                    attempts,
                });
            }

            // Fresh stats each round: other calls may have moved load or tripped a backend.
            let snapshots: Vec<StatsSnapshot> = remaining
                .iter()
                .map(|s| self.tracker.snapshot_of(service, s))
                .filter(|s| !s.short_circuited)
                .collect();

            let Some(candidates) = Candidates::new(&snapshots) else {
                return Err(match last_error {
                    Some(last) => {
                        tracing::warn!(attempts, "No untried backend left");
                        CallError::RetriesExceeded {
                            service: service.clone(),
                            attempts,
                            tried,
                            last,
                        }
                    }
                    None => CallError::NoServerAvailable {
                        service: service.clone(),
                    },
                });
            };

            let server = strategy.choose(service, candidates).server.clone();
            attempts += 1;
            tracing::debug!(server = %server, attempt = attempts, strategy = strategy.name(), "Attempting backend");

            let guard = self.tracker.begin(service, &server);
            let outcome = invoker.invoke(&server, request).await;
            match outcome {
                Ok(response) => {
                    let elapsed = guard.succeed();
                    metrics::record_attempt(service.as_str(), "success", elapsed);
                    tracing::debug!(server = %server, attempt = attempts, elapsed = ?elapsed, "Attempt succeeded");
                    return Ok(response);
                }
                Err(error) => {
                    let elapsed = guard.fail(&error);
                    metrics::record_attempt(service.as_str(), "failure", elapsed);
                    tracing::warn!(server = %server, attempt = attempts, error = %error, "Attempt failed");

                    remaining.retain(|s| s != &server);
                    tried.push(server);

                    if attempts >= max_attempts || remaining.is_empty() {
                        tracing::warn!(attempts, max_attempts, "Retries exhausted");
                        return Err(CallError::RetriesExceeded {
                            service: service.clone(),
                            attempts,
                            tried,
                            last: error,
                        });
                    }
                    last_error = Some(error);

                    let delay = backoff_delay(&self.policy, attempts);
                    if !delay.is_zero() {
                        tracing::debug!(delay = ?delay, "Backing off before retry");
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => {}
                        }
                    }
                }
            }
        }
    }
}
