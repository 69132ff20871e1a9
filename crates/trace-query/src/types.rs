use serde::{Deserialize, Serialize};
use trace_types::TraceId;

/// A `Search` request, parameterized per spec.md §6's `GET /api/search`
/// query-string parameters.
#[derive(Clone, Debug, Default)]
pub struct SearchRequest {
    pub query: String,
    pub start_unix_nano: u64,
    pub end_unix_nano: u64,
    pub min_duration_nanos: Option<u64>,
    pub max_duration_nanos: Option<u64>,
    pub limit: usize,
    pub deadline_secs: u64,
}

/// One row of a search result: the trace-level summary spec.md §4.5
/// describes as the coordinator's merge unit, never the full trace body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetadata {
    pub trace_id: TraceId,
    pub root_service_name: String,
    pub root_span_name: String,
    pub start_time_unix_nano: u64,
    pub duration_nanos: u64,
}

/// Completeness metrics returned alongside a partial or full result
/// (spec.md §4.5: "reports how much of the candidate set it actually
/// covered").
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub inspected_traces: u64,
    pub inspected_bytes: u64,
    pub completed_jobs: u64,
    pub total_jobs: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub traces: Vec<TraceMetadata>,
    pub metrics: Metrics,
}

/// A job's lifecycle state (spec.md §4.5: "queued -> running -> {done,
/// failed, cancelled}").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
    Cancelled,
}
