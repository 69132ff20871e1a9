use serde::{Deserialize, Serialize};

use crate::ids::TraceId;
use crate::resource::Resource;
use crate::scope::InstrumentationScope;
use crate::span::Span;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSpans {
    pub scope: InstrumentationScope,
    pub spans: Vec<Span>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpans {
    pub resource: Resource,
    pub scope_spans: Vec<ScopeSpans>,
}

/// Data-quality flags computed on seal, per spec.md §4.1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Any non-root span whose parent id is absent from the trace.
    pub disconnected_trace: bool,
    /// No span with an all-zero parent id.
    pub rootless_trace: bool,
}

/// A fully nested trace: `Trace -> repeated ResourceSpans -> repeated
/// ScopeSpans -> repeated Span`, plus the trace-level fields computed once
/// at seal time (spec.md §3).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: TraceId,
    pub resource_spans: Vec<ResourceSpans>,

    // Derived, computed once at seal time and never recomputed afterwards
    // (spec.md §3 invariant).
    pub start_time_unix_nano: u64,
    pub end_time_unix_nano: u64,
    pub duration_nanos: u64,
    pub root_service_name: String,
    pub root_span_name: String,
}

impl Trace {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            ..Default::default()
        }
    }

    /// Iterates every span in the trace, along with the resource it belongs
    /// to, in storage order.
    pub fn iter_spans(&self) -> impl Iterator<Item = (&Resource, &Span)> {
        self.resource_spans.iter().flat_map(|rs| {
            rs.scope_spans
                .iter()
                .flat_map(move |ss| ss.spans.iter().map(move |s| (&rs.resource, s)))
        })
    }

    pub fn span_count(&self) -> usize {
        self.resource_spans
            .iter()
            .map(|rs| {
                rs.scope_spans
                    .iter()
                    .map(|ss| ss.spans.len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Recomputes the trace-level derived fields from the underlying spans.
    /// Called exactly once, at seal time (or after a compaction merge, which
    /// re-derives from the merged span set) — spec.md §3: "Derived
    /// trace-level fields are consistent with the underlying spans at seal
    /// time; they are not recomputed afterwards."
    pub fn recompute_derived_fields(&mut self) {
        let mut start = u64::MAX;
        let mut end = 0u64;
        let mut root: Option<(&str, &str)> = None;

        for (resource, span) in self.iter_spans() {
            start = start.min(span.start_time_unix_nano);
            end = end.max(span.end_time_unix_nano);
            if span.is_root() {
                root = Some((
                    resource.service_name.as_deref().unwrap_or(""),
                    span.name.as_str(),
                ));
            }
        }

        if start == u64::MAX {
            start = 0;
        }
        self.start_time_unix_nano = start;
        self.end_time_unix_nano = end;
        self.duration_nanos = end.saturating_sub(start);
        if let Some((service, name)) = root {
            self.root_service_name = service.to_string();
            self.root_span_name = name.to_string();
        }
    }

    /// Computes data-quality flags per spec.md §4.1: a disconnected trace
    /// has a non-root span whose parent is missing from the trace; a
    /// rootless trace has no span with an all-zero parent id.
    pub fn data_quality(&self) -> DataQuality {
        let mut span_ids = std::collections::HashSet::new();
        let mut has_root = false;
        for (_, span) in self.iter_spans() {
            span_ids.insert(span.span_id);
            if span.is_root() {
                has_root = true;
            }
        }

        let mut disconnected = false;
        for (_, span) in self.iter_spans() {
            if !span.is_root() && !span_ids.contains(&span.parent_span_id) {
                disconnected = true;
                break;
            }
        }

        DataQuality {
            disconnected_trace: disconnected,
            rootless_trace: !has_root,
        }
    }

    /// Merges `other`'s resource/scope/span groups into `self`, as the
    /// compactor does when two input blocks both contain partial data for
    /// the same trace id (spec.md §4.4 step 2). Does not recompute derived
    /// fields; callers must call `recompute_derived_fields` once after all
    /// merges for a given output row are applied.
    pub fn merge_from(&mut self, other: Trace) {
        debug_assert_eq!(self.trace_id, other.trace_id);
        self.resource_spans.extend(other.resource_spans);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SpanId;
    use crate::span::{SpanKind, StatusCode};

    fn span(id: u8, parent: u8, name: &str) -> Span {
        Span {
            span_id: SpanId([id; 8]),
            parent_span_id: if parent == 0 {
                SpanId::ZERO
            } else {
                SpanId([parent; 8])
            },
            name: name.to_string(),
            kind: SpanKind::Internal,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 1_000_000_000 + id as u64 * 1000,
            end_time_unix_nano: 1_040_000_000 + id as u64 * 1000,
            trace_state: String::new(),
            http_method: None,
            http_url: None,
            http_status_code: None,
            attrs: Vec::new(),
            events: Vec::new(),
            links: Vec::new(),
            dropped_attributes_count: 0,
            dropped_events_count: 0,
            dropped_links_count: 0,
        }
    }

    fn trace_with(spans: Vec<Span>, service: &str) -> Trace {
        let mut resource = Resource::default();
        resource.service_name = Some(service.to_string());
        let mut t = Trace::new(TraceId([1; 16]));
        t.resource_spans.push(ResourceSpans {
            resource,
            scope_spans: vec![ScopeSpans {
                scope: InstrumentationScope::default(),
                spans,
            }],
        });
        t
    }

    #[test]
    fn ingest_seal_scenario_derives_root_fields() {
        // End-to-end scenario 1 from spec.md §8.
        let mut s1 = span(0xA, 0, "/hi");
        s1.start_time_unix_nano = 1_000_000_000;
        s1.end_time_unix_nano = 1_050_000_000;
        let mut s2 = span(0xB, 0xA, "db");
        s2.start_time_unix_nano = 1_010_000_000;
        s2.end_time_unix_nano = 1_040_000_000;

        let mut trace = trace_with(vec![s1, s2], "api");
        trace.recompute_derived_fields();

        assert_eq!(trace.root_service_name, "api");
        assert_eq!(trace.root_span_name, "/hi");
        assert_eq!(trace.duration_nanos, 50_000_000);
        assert_eq!(trace.start_time_unix_nano, 1_000_000_000);
        assert_eq!(trace.end_time_unix_nano, 1_050_000_000);
    }

    #[test]
    fn rootless_trace_is_flagged() {
        let trace = trace_with(vec![span(0xB, 0xA, "db")], "api");
        let dq = trace.data_quality();
        assert!(dq.rootless_trace);
        assert!(dq.disconnected_trace);
    }

    #[test]
    fn connected_trace_with_root_is_clean() {
        let trace = trace_with(vec![span(0xA, 0, "/hi"), span(0xB, 0xA, "db")], "api");
        let dq = trace.data_quality();
        assert!(!dq.rootless_trace);
        assert!(!dq.disconnected_trace);
    }

    #[test]
    fn merge_combines_resource_spans_without_dedup() {
        // spec.md §8 scenario 4: "the union (spans from both blocks
        // appended)" — merge never deduplicates at this layer.
        let mut a = trace_with(vec![span(0xA, 0, "/hi")], "svc");
        let b = trace_with(vec![span(0xB, 0xA, "db")], "svc");
        a.merge_from(b);
        assert_eq!(a.span_count(), 2);
    }

    #[test]
    fn empty_root_only_trace_round_trips() {
        // Boundary from spec.md §8: empty trace (root only).
        let mut trace = trace_with(vec![span(0xA, 0, "/root")], "svc");
        trace.recompute_derived_fields();
        assert_eq!(trace.span_count(), 1);
        assert_eq!(trace.root_span_name, "/root");
        assert!(!trace.data_quality().rootless_trace);
    }
}
