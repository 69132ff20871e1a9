//! Core data model for the trace storage engine: trace/span/resource/scope
//! shapes, attribute values, and the block-level metadata sidecar.
//!
//! This crate has no I/O and no async runtime dependency; it is the shared
//! vocabulary that `trace-wal`, `trace-block`, `trace-compactor` and
//! `trace-query` all build on.

mod attribute;
mod error;
mod ids;
mod meta;
mod resource;
mod scope;
mod span;
mod trace;

pub use attribute::{AttributeKind, AttributeValue};
pub use error::TypesError;
pub use ids::{BlockId, SpanId, TraceId};
pub use meta::BlockMeta;
pub use resource::Resource;
pub use scope::InstrumentationScope;
pub use span::{Event, Link, Span, SpanKind, StatusCode};
pub use trace::{DataQuality, ResourceSpans, ScopeSpans, Trace};

/// Attributes promoted out of the generic key/value group into dedicated
/// columns, because they are both frequently queried and commonly present.
///
/// Mirrors the field list in the vparquet4 reference schema. Keeping this as
/// a single table (rather than scattering the strings through the writer)
/// means the block writer and the query planner agree on what "dedicated"
/// means without risk of drift.
pub mod dedicated {
    /// Dedicated resource-level attribute keys, in column order.
    pub const RESOURCE_ATTRS: &[&str] = &[
        "service.name",
        "cluster",
        "namespace",
        "pod",
        "container",
        "k8s.cluster.name",
        "k8s.namespace.name",
        "k8s.pod.name",
        "k8s.container.name",
    ];

    /// Dedicated span-level attribute keys, in column order.
    pub const SPAN_ATTRS: &[&str] = &["http.method", "http.url", "http.status_code"];

    /// Returns true if `key` has a dedicated resource column and therefore
    /// must not also appear in the resource's generic `Attrs` group.
    pub fn is_dedicated_resource_attr(key: &str) -> bool {
        RESOURCE_ATTRS.contains(&key)
    }

    /// Returns true if `key` has a dedicated span column.
    pub fn is_dedicated_span_attr(key: &str) -> bool {
        SPAN_ATTRS.contains(&key)
    }
}
