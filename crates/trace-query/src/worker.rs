use trace_block::{PartialIterator, TraceScalarRow, METADATA_ONLY_COLUMNS};
use trace_objectstore::ObjectStore;
use trace_types::Trace;

use crate::error::QueryError;
use crate::planner::Job;
use crate::predicate::Query;
use crate::types::{Metrics, SearchRequest, TraceMetadata};

/// The result of running one job: its matches plus the inspection counters
/// that feed into the coordinator's aggregate `Metrics` (spec.md §4.5).
#[derive(Clone, Debug, Default)]
pub struct JobResult {
    pub matched: Vec<TraceMetadata>,
    pub metrics: Metrics,
}

/// Executes a single job: decode its row-group range, evaluate the query
/// against each trace, and collect matches up to `limit`. Stops early once
/// `limit` matches are found within the job — the coordinator still applies
/// the global limit across jobs.
///
/// A predicate-free query never needs a resource or span column to answer
/// `Search` — only the trace-level scalar fields `TraceMetadata` and the
/// duration bounds actually read — so that case takes a column-pruned path
/// that never decompresses `ResourceSpans` (spec.md §4.5 step 2, §4.3
/// "honors the column-pruning list").
pub async fn run_job(
    store: &dyn ObjectStore,
    tenant_id: &str,
    job: &Job,
    query: &Query,
    request: &SearchRequest,
    limit: usize,
) -> Result<JobResult, QueryError> {
    let row_groups = job.start_row_group..(job.start_row_group + job.row_group_count);
    if query.is_empty() {
        return run_job_scalars_only(store, tenant_id, job, row_groups, request, limit).await;
    }

    let iter = PartialIterator::open(store, tenant_id, &job.block, row_groups).await?;
    let traces = iter.read_all()?;

    let mut result = JobResult::default();
    for trace in &traces {
        result.metrics.inspected_traces += 1;
        result.metrics.inspected_bytes += approx_trace_bytes(trace);

        if !within_duration_bounds(trace, request) {
            continue;
        }
        if query.matches(trace) {
            result.matched.push(trace_metadata(trace));
            if result.matched.len() >= limit {
                break;
            }
        }
    }
    result.metrics.completed_jobs = 1;
    result.metrics.total_jobs = 1;
    Ok(result)
}

async fn run_job_scalars_only(
    store: &dyn ObjectStore,
    tenant_id: &str,
    job: &Job,
    row_groups: std::ops::Range<u64>,
    request: &SearchRequest,
    limit: usize,
) -> Result<JobResult, QueryError> {
    let iter = PartialIterator::open_with_projection(
        store,
        tenant_id,
        &job.block,
        row_groups,
        Some(METADATA_ONLY_COLUMNS),
    )
    .await?;
    let rows = iter.read_scalars()?;

    let mut result = JobResult::default();
    for row in &rows {
        result.metrics.inspected_traces += 1;
        result.metrics.inspected_bytes += approx_scalar_bytes(row);

        if !within_scalar_duration_bounds(row, request) {
            continue;
        }
        result.matched.push(TraceMetadata {
            trace_id: row.trace_id,
            root_service_name: row.root_service_name.clone(),
            root_span_name: row.root_span_name.clone(),
            start_time_unix_nano: row.start_time_unix_nano,
            duration_nanos: row.duration_nanos,
        });
        if result.matched.len() >= limit {
            break;
        }
    }
    result.metrics.completed_jobs = 1;
    result.metrics.total_jobs = 1;
    Ok(result)
}

fn within_scalar_duration_bounds(row: &TraceScalarRow, request: &SearchRequest) -> bool {
    if let Some(min) = request.min_duration_nanos {
        if row.duration_nanos < min {
            return false;
        }
    }
    if let Some(max) = request.max_duration_nanos {
        if row.duration_nanos > max {
            return false;
        }
    }
    true
}

/// Same estimate as [`approx_trace_bytes`], sized down to what a
/// scalar-only row actually carries.
fn approx_scalar_bytes(row: &TraceScalarRow) -> u64 {
    16 + row.root_service_name.len() as u64 + row.root_span_name.len() as u64 + 64
}

fn within_duration_bounds(trace: &Trace, request: &SearchRequest) -> bool {
    if let Some(min) = request.min_duration_nanos {
        if trace.duration_nanos < min {
            return false;
        }
    }
    if let Some(max) = request.max_duration_nanos {
        if trace.duration_nanos > max {
            return false;
        }
    }
    true
}

pub(crate) fn trace_metadata(trace: &Trace) -> TraceMetadata {
    TraceMetadata {
        trace_id: trace.trace_id,
        root_service_name: trace.root_service_name.clone(),
        root_span_name: trace.root_span_name.clone(),
        start_time_unix_nano: trace.start_time_unix_nano,
        duration_nanos: trace.duration_nanos,
    }
}

/// A rough byte-size estimate for the inspected-bytes metric — exact bytes
/// would require tracking the Parquet page sizes actually decoded, which
/// `PartialIterator` doesn't expose; this is good enough for a completeness
/// signal, not a billing figure.
fn approx_trace_bytes(trace: &Trace) -> u64 {
    let mut total = 16u64; // trace id
    for (resource, span) in trace.iter_spans() {
        total += resource.service_name.as_ref().map_or(0, |s| s.len()) as u64;
        total += span.name.len() as u64;
        total += span.attrs.iter().map(|(k, v)| k.len() + v.approx_size()).sum::<usize>() as u64;
        total += 64; // fixed-width fields, ids, timestamps
    }
    total
}
