//! TCP connect probe: a concrete remote invoker.
//!
//! Opens a TCP connection to the chosen backend and reports how long the
//! handshake took. Used by `lb-probe` to check a service's backends through
//! the same selection and retry path as real traffic.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;

use crate::registry::BackendServer;
use crate::resilience::RemoteInvoker;

/// Why a probe attempt failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },
}

/// Invoker whose "call" is a TCP connect with a deadline.
#[derive(Debug, Clone)]
pub struct TcpConnectInvoker {
    timeout: Duration,
}

impl TcpConnectInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RemoteInvoker<()> for TcpConnectInvoker {
    type Response = Duration;
    type Error = ProbeError;

    async fn invoke(&self, server: &BackendServer, _request: &()) -> Result<Duration, ProbeError> {
        let started = Instant::now();
        let connect = TcpStream::connect((server.host(), server.port()));
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_stream)) => Ok(started.elapsed()),
            Ok(Err(source)) => Err(ProbeError::Connect {
                address: server.address(),
                source,
            }),
            Err(_) => Err(ProbeError::Timeout {
                address: server.address(),
                timeout: self.timeout,
            }),
        }
    }
}
