use std::time::{Duration, Instant};

use trace_types::{AttributeValue, InstrumentationScope, Resource, ResourceSpans, ScopeSpans, Span, Trace, TraceId};

/// One span as handed to `Push`, still tagged with the trace id it belongs
/// to (spec.md's own `Span` type drops the trace id once stored, since a
/// block row's trace id is the grouping key; upstream of storage it is a
/// per-span OTLP field, so the ingest boundary carries it explicitly).
#[derive(Clone, Debug)]
pub struct IngestSpan {
    pub trace_id: TraceId,
    pub resource: Resource,
    pub scope: InstrumentationScope,
    pub span: Span,
}

/// Rough, allocation-free size estimate used for admission control and the
/// soft byte limit — not an exact wire size, just a monotonic proxy.
pub fn approx_span_bytes(span: &Span) -> usize {
    const BASE: usize = 96;
    let attrs: usize = span.attrs.iter().map(|(k, v)| k.len() + v.approx_size()).sum();
    let events: usize = span
        .events
        .iter()
        .map(|e| e.name.len() + 16 + e.attrs.iter().map(|(k, v)| k.len() + v.approx_size()).sum::<usize>())
        .sum();
    let links: usize = span
        .links
        .iter()
        .map(|l| 32 + l.attrs.iter().map(|(k, v)| k.len() + v.approx_size()).sum::<usize>())
        .sum();
    BASE + span.name.len() + span.status_message.len() + attrs + events + links
}

/// Truncates any attribute whose approximate size exceeds `max_bytes`,
/// replacing its value with a placeholder and incrementing `*dropped` by
/// exactly one per truncation (spec.md §8 boundary: "attribute truncated,
/// counter `attributes_truncated_total` incremented by exactly one per
/// truncation").
pub fn truncate_oversized_attrs(attrs: &mut [(String, AttributeValue)], max_bytes: usize, dropped: &mut u32) {
    for (_, value) in attrs.iter_mut() {
        if value.approx_size() > max_bytes {
            *value = match value {
                AttributeValue::String(s) => {
                    let cut = s
                        .char_indices()
                        .take_while(|(i, _)| *i < max_bytes)
                        .last()
                        .map(|(i, c)| i + c.len_utf8())
                        .unwrap_or(0);
                    AttributeValue::String(s[..cut].to_string())
                }
                other => AttributeValue::String(format!("<truncated:{}b>", other.approx_size())),
            };
            *dropped += 1;
        }
    }
}

/// Inserts `span` into the resource/scope group matching `resource` and
/// `scope`, creating new groups when no match exists, preserving arrival
/// order within a scope. Shared by `TraceBuilder::push` (the live in-memory
/// shape) and the accumulator's per-push WAL delta (the same grouping,
/// scoped to just what this push contributed).
pub fn append_into(resource_spans: &mut Vec<ResourceSpans>, resource: Resource, scope: InstrumentationScope, span: Span) {
    let rs = match resource_spans.iter_mut().position(|rs| rs.resource == resource) {
        Some(i) => &mut resource_spans[i],
        None => {
            resource_spans.push(ResourceSpans {
                resource,
                scope_spans: Vec::new(),
            });
            resource_spans.last_mut().expect("just pushed")
        }
    };
    let ss = match rs.scope_spans.iter_mut().position(|ss| ss.scope == scope) {
        Some(i) => &mut rs.scope_spans[i],
        None => {
            rs.scope_spans.push(ScopeSpans { scope, spans: Vec::new() });
            rs.scope_spans.last_mut().expect("just pushed")
        }
    };
    if let Some(existing) = ss.spans.iter_mut().find(|s| s.span_id == span.span_id) {
        *existing = span;
    } else {
        ss.spans.push(span);
    }
}

/// In-memory builder for one trace, owned by exactly one accumulator
/// stripe at a time (spec.md §4.1 "Internal structure").
pub struct TraceBuilder {
    pub tenant_id: String,
    pub trace: Trace,
    pub first_append: Instant,
    pub last_append: Instant,
    pub bytes: usize,
    /// Resolved at creation time from the tenant's overrides in effect at
    /// that moment (spec.md §4.1 completion policy 1).
    pub idle_period: Duration,
    /// Resolved at creation time (spec.md §4.1 completion policy 2).
    pub max_duration: Duration,
}

impl TraceBuilder {
    pub fn new(tenant_id: String, trace_id: TraceId, idle_period: Duration, max_duration: Duration, now: Instant) -> Self {
        Self {
            tenant_id,
            trace: Trace::new(trace_id),
            first_append: now,
            last_append: now,
            bytes: 0,
            idle_period,
            max_duration,
        }
    }

    /// Truncates oversized attributes, appends the span into the nested
    /// shape, and returns the (possibly truncated) span so the caller can
    /// build an identical WAL delta record.
    pub fn push(&mut self, resource: Resource, scope: InstrumentationScope, mut span: Span, max_attribute_bytes: usize, now: Instant) -> Span {
        truncate_oversized_attrs(&mut span.attrs, max_attribute_bytes, &mut span.dropped_attributes_count);
        self.bytes += approx_span_bytes(&span);
        self.last_append = now;
        let truncated = span.clone();
        append_into(&mut self.trace.resource_spans, resource, scope, span);
        truncated
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_append)
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_append)
    }
}
