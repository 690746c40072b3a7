//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Logical call for a service:
//!     → coordinator.rs (registry ∩ available, or NoServerAvailable)
//!     → loop: cancel check → strategy choose → invoke
//!     → On failure: record, drop server from this call's candidates,
//!       backoff.rs (optional jittered delay), retry
//!     → error.rs (NoServerAvailable / RetriesExceeded / Cancelled)
//! ```
//!
//! # Design Decisions
//! - max_attempts counts every attempt, the first included
//! - A server is tried at most once per logical call
//! - Timeouts on the remote call belong to the invoker, not the coordinator
//! - Cancellation is checked before each attempt and interrupts backoff

pub mod backoff;
pub mod coordinator;
pub mod error;

pub use coordinator::{RemoteInvoker, RetryCoordinator};
pub use error::CallError;
