//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Cancellation (cancel.rs):
//!     caller / signal handler → CancelSignal::cancel
//!     → coordinator sees it before the next attempt
//!     → in-progress backoff sleeps end early
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → cancel the process-wide signal
//! ```
//!
//! # Design Decisions
//! - One signal can be shared by many calls (clone is cheap)
//! - Cancelling is idempotent and cannot be undone

pub mod cancel;
pub mod signals;

pub use cancel::CancelSignal;
