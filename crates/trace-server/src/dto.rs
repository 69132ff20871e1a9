use serde::{Deserialize, Serialize};
use trace_types::{InstrumentationScope, Resource, Span, TraceId};

/// Wire shape for `Push`: groups mirror OTLP's resource/scope nesting, but
/// each span carries its own trace id explicitly (spec.md §3: trace id is a
/// per-span OTLP field; `trace_types::Span` drops it since storage groups by
/// trace, but the ingest boundary still needs it per span).
#[derive(Clone, Debug, Deserialize)]
pub struct PushRequest {
    pub resource_spans: Vec<PushResourceSpans>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushResourceSpans {
    pub resource: Resource,
    pub scope_spans: Vec<PushScopeSpans>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushScopeSpans {
    pub scope: InstrumentationScope,
    pub spans: Vec<PushSpan>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushSpan {
    pub trace_id: TraceId,
    #[serde(flatten)]
    pub span: Span,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchQueryParams {
    pub q: Option<String>,
    pub start: Option<u64>,
    pub end: Option<u64>,
    pub limit: Option<usize>,
    #[serde(rename = "minDuration")]
    pub min_duration: Option<u64>,
    #[serde(rename = "maxDuration")]
    pub max_duration: Option<u64>,

    // Worker-offload block-targeting set (spec.md §6): present only when the
    // coordinator is addressing a single job at a stateless worker.
    #[serde(rename = "blockID")]
    pub block_id: Option<String>,
    #[serde(rename = "startPage")]
    pub start_page: Option<u64>,
    #[serde(rename = "totalPages")]
    pub total_pages: Option<u64>,
    pub encoding: Option<String>,
    #[serde(rename = "dataEncoding")]
    pub data_encoding: Option<String>,
    #[serde(rename = "indexPageSize")]
    pub index_page_size: Option<u64>,
    #[serde(rename = "totalRecords")]
    pub total_records: Option<u64>,
    pub version: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TraceByIdQueryParams {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// A plain ack body for a successful `Push`.
#[derive(Serialize)]
pub struct PushAck {
    pub accepted: bool,
}
