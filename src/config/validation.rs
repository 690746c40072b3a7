//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (servers reference declared services)
//! - Validate value ranges (attempts, thresholds, windows, ports)
//! - Detect duplicate services and servers
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::BalancerConfig;

/// One semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("retries.base_delay_ms ({base}) exceeds retries.max_delay_ms ({max})")]
    BackoffRange { base: u64, max: u64 },

    #[error("short_circuit.threshold must be at least 1")]
    ZeroThreshold,

    #[error("short_circuit.window_ms must be at least 1")]
    ZeroWindow,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("service '{0}' is declared more than once")]
    DuplicateService(String),

    #[error("service name must not be empty")]
    EmptyServiceName,

    #[error("server {host}:{port} references unknown service '{service}'")]
    UnknownService { service: String, host: String, port: u16 },

    #[error("server in service '{0}' has an empty host")]
    EmptyHost(String),

    #[error("server {host} in service '{service}' has port 0")]
    ZeroPort { service: String, host: String },

    #[error("server {host}:{port} is listed twice in service '{service}'")]
    DuplicateServer { service: String, host: String, port: u16 },
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::BackoffRange {
            base: config.retries.base_delay_ms,
            max: config.retries.max_delay_ms,
        });
    }
    if config.short_circuit.threshold == 0 {
        errors.push(ValidationError::ZeroThreshold);
    }
    if config.short_circuit.window_ms == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut services = HashSet::new();
    for service in &config.services {
        if service.name.is_empty() {
            errors.push(ValidationError::EmptyServiceName);
        } else if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
    }

    let mut servers = HashSet::new();
    for server in &config.servers {
        if !services.contains(server.service.as_str()) {
            errors.push(ValidationError::UnknownService {
                service: server.service.clone(),
                host: server.host.clone(),
                port: server.port,
            });
        }
        if server.host.is_empty() {
            errors.push(ValidationError::EmptyHost(server.service.clone()));
        }
        if server.port == 0 {
            errors.push(ValidationError::ZeroPort {
                service: server.service.clone(),
                host: server.host.clone(),
            });
        }
        if !servers.insert((server.service.as_str(), server.host.as_str(), server.port)) {
            errors.push(ValidationError::DuplicateServer {
                service: server.service.clone(),
                host: server.host.clone(),
                port: server.port,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{ServerConfig, ServiceConfig};

    fn server(service: &str, host: &str, port: u16) -> ServerConfig {
        ServerConfig {
            service: service.into(),
            host: host.into(),
            port,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&BalancerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = BalancerConfig::default();
        config.retries.max_attempts = 0;
        config.retries.base_delay_ms = 5_000;
        config.short_circuit.window_ms = 0;
        config.services.push(ServiceConfig { name: "a".into(), strategy: None });
        config.services.push(ServiceConfig { name: "a".into(), strategy: None });
        config.servers.push(server("a", "", 0));
        config.servers.push(server("ghost", "h", 1));
        config.servers.push(server("a", "h", 2));
        config.servers.push(server("a", "h", 2));

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroAttempts,
                ValidationError::BackoffRange { base: 5_000, max: 2_000 },
                ValidationError::ZeroWindow,
                ValidationError::DuplicateService("a".into()),
                ValidationError::EmptyHost("a".into()),
                ValidationError::ZeroPort { service: "a".into(), host: "".into() },
                ValidationError::UnknownService { service: "ghost".into(), host: "h".into(), port: 1 },
                ValidationError::DuplicateServer { service: "a".into(), host: "h".into(), port: 2 },
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = BalancerConfig::default();
        config.observability.metrics_address = "not an address".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MetricsAddress("not an address".into())]
        );
    }
}
