//! Backend statistics subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt outcome observed (coordinator):
//!     → tracker.rs (look up or lazily create stats for service+server)
//!     → backend_stats.rs (atomic counter updates)
//!     → short-circuit trip/recovery logged and counted
//!
//! Selection (coordinator → strategy):
//!     → tracker.rs is_available / snapshot_of
//!     → StatsSnapshot copies handed to the strategy
//! ```
//!
//! # Design Decisions
//! - Counters are atomics with relaxed ordering; decisions are eventually consistent
//! - Read-only queries never create stats entries
//! - Time is read through `Clock` so windows can be tested deterministically

pub mod backend_stats;
pub mod clock;
pub mod tracker;

pub use backend_stats::{BackendStats, StatsSnapshot};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use tracker::{AttemptGuard, StatsTracker};
