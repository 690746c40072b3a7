//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → Balancer::from_config builds registry, tracker, strategies
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Balancer::apply_config swaps server lists
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only server lists are hot-reloaded; strategies and policies are fixed at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancerConfig, ObservabilityConfig, RetryConfig, ServerConfig, ServiceConfig,
    ShortCircuitConfig, StrategyConfig,
};
pub use validation::{validate_config, ValidationError};
