//! Typed configuration record and hot-reloadable per-tenant overrides.
//!
//! Environment-variable expansion, CLI flag parsing, and logging
//! initialization are explicitly out of scope (spec.md §1); this crate
//! owns the typed record and its TOML-file loading, handed to every other
//! component by whatever boundary code assembles them (`trace-cli`).

mod config;
mod error;
mod overrides;

pub use config::{
    AccumulatorConfig, BlockConfig, CompactorConfig, Config, ObjectStoreConfig, QueryConfig,
    ServerConfig, WalConfig,
};
pub use error::ConfigError;
pub use overrides::{Limits, OverrideTable, TenantOverrides, WILDCARD};
