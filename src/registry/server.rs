//! Service and backend identity types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of a logical backend cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

/// One physical endpoint behind a service.
///
/// Field order matters: the derived `Ord` sorts by host, then port, then
/// metadata, which is the tie-break order used by selection strategies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendServer {
    host: String,
    port: u16,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl BackendServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for BackendServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_formatting() {
        assert_eq!(BackendServer::new("10.0.0.1", 8080).address(), "10.0.0.1:8080");
        assert_eq!(BackendServer::new("::1", 9000).address(), "[::1]:9000");
    }

    #[test]
    fn test_identity_includes_metadata() {
        let plain = BackendServer::new("a", 1);
        let tagged = BackendServer::new("a", 1).with_metadata("zone", "eu");
        assert_ne!(plain, tagged);
        assert!(plain < tagged);
    }

    #[test]
    fn test_service_id_ordering_and_display() {
        let a = ServiceId::from("svc-A");
        let b = ServiceId::from(String::from("svc-B"));
        assert!(a < b);
        assert_eq!(a.to_string(), "svc-A");
        assert_eq!(a, ServiceId::new("svc-A"));
    }
}
