//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! discovery source (config file, watcher, caller)
//!     → server_list.rs refresh(service, servers)
//!     → dedupe, build immutable Arc<[BackendServer]>
//!     → single ArcSwap store of the whole service map
//!
//! coordinator
//!     → server_list.rs get_servers(service)
//!     → lock-free load of the current snapshot
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable; a refresh never mutates in place
//! - Unknown services resolve to an empty set, not an error
//! - Server identity is (host, port, metadata)

pub mod server;
pub mod server_list;

pub use server::{BackendServer, ServiceId};
pub use server_list::{Refreshed, ServerList};
