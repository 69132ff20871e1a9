use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level typed configuration record (spec.md §9 "Config with many
/// optional sections"). Loading from a file, env-var expansion, and CLI
/// flags are out of scope; this is the record every component is handed
/// once it has been assembled by whatever boundary code calls `trace-cli`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub wal: WalConfig,
    pub accumulator: AccumulatorConfig,
    pub block: BlockConfig,
    pub compactor: CompactorConfig,
    pub query: QueryConfig,
    pub objectstore: ObjectStoreConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wal: WalConfig::default(),
            accumulator: AccumulatorConfig::default(),
            block: BlockConfig::default(),
            compactor: CompactorConfig::default(),
            query: QueryConfig::default(),
            objectstore: ObjectStoreConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    pub dir: PathBuf,
    pub max_segment_bytes: u64,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/wal"),
            max_segment_bytes: 128 * 1024 * 1024,
        }
    }
}

/// Shard count and default completion-policy knobs for the accumulator
/// (spec.md §4.1). Per-tenant overrides live in [`crate::overrides`], not
/// here — these are the fallback when a tenant has none.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    pub stripes: usize,
    pub trace_idle_period_secs: u64,
    pub max_trace_duration_secs: u64,
    pub soft_limit_bytes: u64,
    pub max_trace_bytes: u64,
    pub max_live_traces: u64,
    pub burst_bytes: u64,
    pub bytes_per_sec: u64,
    pub max_attribute_bytes: usize,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            stripes: 64,
            trace_idle_period_secs: 10,
            max_trace_duration_secs: 30 * 60,
            soft_limit_bytes: 512 * 1024 * 1024,
            max_trace_bytes: 16 * 1024 * 1024,
            max_live_traces: 1_000_000,
            burst_bytes: 8 * 1024 * 1024,
            bytes_per_sec: 4 * 1024 * 1024,
            max_attribute_bytes: 4096,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockConfig {
    pub rows_per_row_group: usize,
    pub bloom_target_fp_rate: f64,
    pub index_page_size_bytes: u64,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            rows_per_row_group: 10_000,
            bloom_target_fp_rate: 0.01,
            index_page_size_bytes: 64 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorConfig {
    pub selection_group_size: usize,
    pub compaction_threshold_records: u64,
    pub max_concurrent_jobs: usize,
    /// Grace period between marking inputs compacted and deleting them,
    /// expressed as a multiple of `query.max_deadline_secs` (DESIGN.md open
    /// question resolution: "greater than the longest allowed query
    /// deadline").
    pub grace_period_deadline_multiple: u64,
}

impl Default for CompactorConfig {
    fn default() -> Self {
        Self {
            selection_group_size: 4,
            compaction_threshold_records: 50_000,
            max_concurrent_jobs: 4,
            grace_period_deadline_multiple: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub max_outstanding_per_tenant: usize,
    pub max_deadline_secs: u64,
    pub row_group_job_batch: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_outstanding_per_tenant: 2000,
            max_deadline_secs: 30,
            row_group_job_batch: 1,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "backend")]
pub enum ObjectStoreConfig {
    #[default]
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        prefix: Option<String>,
    },
    Azure {
        container: String,
        prefix: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub max_push_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3200".to_string(),
            max_push_body_bytes: 16 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let cfg = Config::default();
        assert!(cfg.accumulator.stripes > 0);
        assert!(cfg.query.max_deadline_secs > 0);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            [accumulator]
            stripes = 8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.accumulator.stripes, 8);
        assert_eq!(cfg.accumulator.trace_idle_period_secs, 10);
    }
}
