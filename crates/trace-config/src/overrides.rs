use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::AccumulatorConfig;

/// Wildcard tenant key applied when no tenant-specific entry exists
/// (spec.md §9: "a wildcard `*` entry applies if no tenant match").
pub const WILDCARD: &str = "*";

/// Per-tenant overrides of accumulator limits. Every field is optional; an
/// absent field falls back to the wildcard entry, then to the compiled-in
/// default.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TenantOverrides {
    pub max_trace_bytes: Option<u64>,
    pub max_live_traces: Option<u64>,
    pub burst_bytes: Option<u64>,
    pub bytes_per_sec: Option<u64>,
    pub trace_idle_period_secs: Option<u64>,
    pub max_trace_duration_secs: Option<u64>,
}

/// The fully-resolved set of limits for one tenant, after merging
/// tenant-specific, wildcard, and compiled-in defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limits {
    pub max_trace_bytes: u64,
    pub max_live_traces: u64,
    pub burst_bytes: u64,
    pub bytes_per_sec: u64,
    pub trace_idle_period_secs: u64,
    pub max_trace_duration_secs: u64,
}

fn merge(defaults: &AccumulatorConfig, layers: &[&TenantOverrides]) -> Limits {
    let mut limits = Limits {
        max_trace_bytes: defaults.max_trace_bytes,
        max_live_traces: defaults.max_live_traces,
        burst_bytes: defaults.burst_bytes,
        bytes_per_sec: defaults.bytes_per_sec,
        trace_idle_period_secs: defaults.trace_idle_period_secs,
        max_trace_duration_secs: defaults.max_trace_duration_secs,
    };
    for layer in layers {
        if let Some(v) = layer.max_trace_bytes {
            limits.max_trace_bytes = v;
        }
        if let Some(v) = layer.max_live_traces {
            limits.max_live_traces = v;
        }
        if let Some(v) = layer.burst_bytes {
            limits.burst_bytes = v;
        }
        if let Some(v) = layer.bytes_per_sec {
            limits.bytes_per_sec = v;
        }
        if let Some(v) = layer.trace_idle_period_secs {
            limits.trace_idle_period_secs = v;
        }
        if let Some(v) = layer.max_trace_duration_secs {
            limits.max_trace_duration_secs = v;
        }
    }
    limits
}

/// Tenants not present here at all (and no `*` entry) are rejected with
/// `TENANT_UNKNOWN` by the accumulator — the table distinguishes "no
/// override, use defaults" (an entry mapping to an empty `TenantOverrides`)
/// from "tenant does not exist" (no entry and no wildcard).
struct Inner {
    defaults: AccumulatorConfig,
    per_tenant: HashMap<String, TenantOverrides>,
}

/// Hot-reloadable per-tenant override table. Readers take a cheap `Arc`
/// clone of the current snapshot; `replace` atomically swaps in a new one
/// (spec.md §9: "per-tenant overrides ... may be hot-reloaded atomically").
pub struct OverrideTable {
    inner: RwLock<Arc<Inner>>,
}

impl OverrideTable {
    pub fn new(defaults: AccumulatorConfig, per_tenant: HashMap<String, TenantOverrides>) -> Self {
        Self {
            inner: RwLock::new(Arc::new(Inner { defaults, per_tenant })),
        }
    }

    /// Atomically replaces the whole per-tenant map, keeping `defaults`.
    pub fn replace(&self, per_tenant: HashMap<String, TenantOverrides>) {
        let defaults = self.inner.read().expect("lock poisoned").defaults.clone();
        *self.inner.write().expect("lock poisoned") = Arc::new(Inner { defaults, per_tenant });
    }

    /// Returns `None` if `tenant` has no specific entry and no wildcard
    /// entry exists — the caller should reject the push as `TENANT_UNKNOWN`.
    pub fn limits_for(&self, tenant: &str) -> Option<Limits> {
        let snapshot = self.inner.read().expect("lock poisoned").clone();
        let tenant_entry = snapshot.per_tenant.get(tenant);
        let wildcard_entry = snapshot.per_tenant.get(WILDCARD);

        if tenant_entry.is_none() && wildcard_entry.is_none() {
            return None;
        }

        let mut layers: Vec<&TenantOverrides> = Vec::with_capacity(2);
        if let Some(w) = wildcard_entry {
            layers.push(w);
        }
        if let Some(t) = tenant_entry {
            layers.push(t);
        }
        Some(merge(&snapshot.defaults, &layers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tenant_without_wildcard_is_none() {
        let table = OverrideTable::new(AccumulatorConfig::default(), HashMap::new());
        assert!(table.limits_for("acme").is_none());
    }

    #[test]
    fn wildcard_applies_when_no_tenant_entry() {
        let mut per_tenant = HashMap::new();
        per_tenant.insert(
            WILDCARD.to_string(),
            TenantOverrides {
                max_live_traces: Some(10),
                ..Default::default()
            },
        );
        let table = OverrideTable::new(AccumulatorConfig::default(), per_tenant);
        let limits = table.limits_for("acme").unwrap();
        assert_eq!(limits.max_live_traces, 10);
    }

    #[test]
    fn tenant_entry_overrides_wildcard_field_by_field() {
        let mut per_tenant = HashMap::new();
        per_tenant.insert(
            WILDCARD.to_string(),
            TenantOverrides {
                max_live_traces: Some(10),
                bytes_per_sec: Some(100),
                ..Default::default()
            },
        );
        per_tenant.insert(
            "acme".to_string(),
            TenantOverrides {
                max_live_traces: Some(999),
                ..Default::default()
            },
        );
        let table = OverrideTable::new(AccumulatorConfig::default(), per_tenant);
        let limits = table.limits_for("acme").unwrap();
        assert_eq!(limits.max_live_traces, 999);
        assert_eq!(limits.bytes_per_sec, 100);
    }

    #[test]
    fn replace_swaps_atomically() {
        let table = OverrideTable::new(AccumulatorConfig::default(), HashMap::new());
        assert!(table.limits_for("acme").is_none());

        let mut per_tenant = HashMap::new();
        per_tenant.insert("acme".to_string(), TenantOverrides::default());
        table.replace(per_tenant);

        assert!(table.limits_for("acme").is_some());
    }
}
