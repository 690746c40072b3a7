//! Outcomes of a failed logical call.

use crate::registry::{BackendServer, ServiceId};

/// Why a coordinated call did not produce a response.
///
/// `E` is the invoker's per-attempt error type.
#[derive(Debug, thiserror::Error)]
pub enum CallError<E>
where
    E: std::error::Error + 'static,
{
    /// Nothing registered, or every registered backend short-circuited.
    #[error("no backend available for service {service}")]
    NoServerAvailable { service: ServiceId },

    /// Every permitted attempt failed; `last` is the final attempt's error.
    #[error("service {service}: gave up after {attempts} failed attempt(s)")]
    RetriesExceeded {
        service: ServiceId,
        attempts: u32,
        tried: Vec<BackendServer>,
        #[source]
        last: E,
    },

    /// The cancel signal was set before an attempt started.
    #[error("call to service {service} cancelled after {attempts} attempt(s)")]
    Cancelled { service: ServiceId, attempts: u32 },
}

impl<E> CallError<E>
where
    E: std::error::Error + 'static,
{
    pub fn service(&self) -> &ServiceId {
        match self {
            CallError::NoServerAvailable { service }
            | CallError::RetriesExceeded { service, .. }
            | CallError::Cancelled { service, .. } => service,
        }
    }

    /// Attempts made before the call ended.
    pub fn attempts(&self) -> u32 {
        match self {
            CallError::NoServerAvailable { .. } => 0,
            CallError::RetriesExceeded { attempts, .. } | CallError::Cancelled { attempts, .. } => {
                *attempts
            }
        }
    }
}
