use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use trace_block::{BlockHandle, PartialIterator};
use trace_config::QueryConfig;
use trace_objectstore::ObjectStore;
use trace_types::{BlockMeta, Trace, TraceId};

use crate::error::QueryError;
use crate::planner::{plan_search, Job};
use crate::predicate::Query;
use crate::types::{Metrics, SearchRequest, SearchResponse};
use crate::worker::{run_job, trace_metadata, JobResult};

/// Dispatches `FindTraceById` and `Search` over a tenant's block population:
/// plans jobs, admits them through a bounded per-tenant queue, runs them
/// (with a single retry on failure), and reduces the results (spec.md
/// §4.5). Construct once per process; cheap to clone the `Arc` handle, not
/// the coordinator itself.
pub struct Coordinator {
    store: Arc<dyn ObjectStore>,
    config: QueryConfig,
    tenant_permits: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ObjectStore>, config: QueryConfig) -> Self {
        Self { store, config, tenant_permits: Mutex::new(HashMap::new()) }
    }

    async fn list_block_metas(&self, tenant_id: &str) -> Result<Vec<BlockMeta>, QueryError> {
        let paths = self.store.list(tenant_id).await?;
        let mut metas = Vec::new();
        for path in paths {
            if path.ends_with("meta.json") {
                let bytes = self.store.read(&path, None).await?;
                metas.push(serde_json::from_slice(&bytes)?);
            }
        }
        Ok(metas)
    }

    /// Admits one job slot for `tenant_id`, returning `TooManyRequests` if
    /// the tenant's `max_outstanding_per_tenant` queue is already full
    /// (spec.md §5: "a bounded, per-tenant FIFO job queue").
    async fn admit(&self, tenant_id: &str) -> Result<tokio::sync::OwnedSemaphorePermit, QueryError> {
        let sem = {
            let mut permits = self.tenant_permits.lock().await;
            permits
                .entry(tenant_id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_outstanding_per_tenant)))
                .clone()
        };
        sem.try_acquire_owned()
            .map_err(|_| QueryError::TooManyRequests { tenant_id: tenant_id.to_string() })
    }

    /// Fetches and deserializes a single block's `meta.json` directly — the
    /// path a stateless worker takes when the coordinator addresses it at
    /// one specific block via the `blockID`/`startPage`/`totalPages`
    /// parameter set (spec.md §6).
    pub async fn block_meta(&self, tenant_id: &str, block_id: &str) -> Result<BlockMeta, QueryError> {
        let bytes = self.store.read(&format!("{tenant_id}/{block_id}/meta.json"), None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Runs exactly one job against one named block — the worker-offload
    /// code path (spec.md §6 "Worker HTTP (stateless offload)"), as opposed
    /// to `search`'s full per-tenant job planning.
    pub async fn run_worker_job(
        &self,
        tenant_id: &str,
        block_id: &str,
        start_row_group: u64,
        row_group_count: u64,
        query: &Query,
        request: &SearchRequest,
        limit: usize,
    ) -> Result<JobResult, QueryError> {
        let block = self.block_meta(tenant_id, block_id).await?;
        let job = Job { block, start_row_group, row_group_count };
        run_job(self.store.as_ref(), tenant_id, &job, query, request, limit).await
    }

    /// Runs a `Search`: plans row-group jobs over every block overlapping
    /// the window, divides the deadline evenly across them, retries a
    /// failed job once, and merges surviving results — a job that still
    /// fails after its retry degrades completeness rather than failing the
    /// whole request (spec.md §4.5).
    pub async fn search(&self, tenant_id: &str, request: SearchRequest) -> Result<SearchResponse, QueryError> {
        let _permit = self.admit(tenant_id).await?;

        let query = if request.query.trim().is_empty() {
            Query::default()
        } else {
            crate::traceql::parse(&request.query)?
        };

        let candidates = self.list_block_metas(tenant_id).await?;
        let jobs = plan_search(&candidates, request.start_unix_nano, request.end_unix_nano, &self.config);
        let total_jobs = jobs.len() as u64;

        if jobs.is_empty() {
            return Ok(SearchResponse::default());
        }

        let deadline_secs = request.deadline_secs.clamp(1, self.config.max_deadline_secs.max(1));
        let per_job_deadline = Duration::from_secs(deadline_secs) / (total_jobs as u32).max(1);
        let limit = if request.limit == 0 { usize::MAX } else { request.limit };

        let futures = jobs.iter().map(|job| async {
            let attempt = tokio::time::timeout(per_job_deadline, run_job(self.store.as_ref(), tenant_id, job, &query, &request, limit)).await;
            match attempt {
                Ok(Ok(result)) => Some(result),
                _ => {
                    let retry = tokio::time::timeout(per_job_deadline, run_job(self.store.as_ref(), tenant_id, job, &query, &request, limit)).await;
                    match retry {
                        Ok(Ok(result)) => Some(result),
                        _ => None,
                    }
                }
            }
        });

        let results = join_all(futures).await;

        let mut metrics = Metrics { total_jobs, ..Default::default() };
        let mut by_trace = HashMap::new();
        for result in results.into_iter().flatten() {
            metrics.inspected_traces += result.metrics.inspected_traces;
            metrics.inspected_bytes += result.metrics.inspected_bytes;
            metrics.completed_jobs += 1;
            for meta in result.matched {
                by_trace.entry(meta.trace_id).or_insert(meta);
            }
        }

        let mut traces: Vec<_> = by_trace.into_values().collect();
        traces.sort_by(|a, b| b.start_time_unix_nano.cmp(&a.start_time_unix_nano));
        traces.truncate(limit);

        Ok(SearchResponse { traces, metrics })
    }

    /// Runs `FindTraceById`: bloom-gates every candidate block, reads only
    /// the row groups the page index says could hold the id, and
    /// concatenates (never deduplicates) every match found — a trace mid-
    /// compaction can legitimately appear in both an input and its not-yet-
    /// swept output, and both copies' spans belong in the answer (spec.md
    /// §4.5: "FindTraceById merges by concatenation, not dedup"). Unlike
    /// `search`, a block read that fails twice fails the whole request: a
    /// single trace's completeness can't be bounded the way a search's can.
    pub async fn find_trace_by_id(
        &self,
        tenant_id: &str,
        trace_id: TraceId,
        start_unix_nano: u64,
        end_unix_nano: u64,
    ) -> Result<Option<Trace>, QueryError> {
        let _permit = self.admit(tenant_id).await?;

        let candidates = self.list_block_metas(tenant_id).await?;
        let mut merged: Option<Trace> = None;

        for meta in candidates {
            if !meta.overlaps(start_unix_nano, end_unix_nano) {
                continue;
            }

            let handle = match read_with_retry(|| BlockHandle::open(self.store.as_ref(), tenant_id, meta.clone())).await {
                Some(handle) => handle,
                None => return Err(QueryError::Unavailable),
            };
            if !handle.may_contain(trace_id) {
                continue;
            }

            let row_groups = handle.row_groups_containing(trace_id);
            let (start, count) = if row_groups.is_empty() {
                (0, handle.row_group_count())
            } else {
                let min = *row_groups.iter().min().unwrap();
                let max = *row_groups.iter().max().unwrap();
                (min, max - min + 1)
            };

            let traces = match read_with_retry(|| {
                let store = self.store.as_ref();
                let meta = &meta;
                async move {
                    let iter = PartialIterator::open(store, tenant_id, meta, start..(start + count)).await?;
                    iter.read_all()
                }
            })
            .await
            {
                Some(traces) => traces,
                None => return Err(QueryError::Unavailable),
            };

            for found in traces.into_iter().filter(|t| t.trace_id == trace_id) {
                match &mut merged {
                    Some(acc) => acc.merge_from(found),
                    None => merged = Some(found),
                }
            }
        }

        if let Some(trace) = &mut merged {
            trace.recompute_derived_fields();
        }
        Ok(merged)
    }
}

async fn read_with_retry<F, Fut, T, E>(mut attempt: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    if let Ok(value) = attempt().await {
        return Some(value);
    }
    attempt().await.ok()
}

/// A plain trace-metadata projection helper retained for callers (e.g. the
/// HTTP layer) that want a summary without pulling in `worker` directly.
pub fn summarize(trace: &Trace) -> crate::types::TraceMetadata {
    trace_metadata(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_config::BlockConfig;
    use trace_objectstore::LocalDisk;
    use trace_types::{Resource, ResourceSpans, ScopeSpans, Span, SpanId, SpanKind, StatusCode};

    fn span(id: u8, service_marker: &str) -> Span {
        Span {
            span_id: SpanId([id; 8]),
            parent_span_id: SpanId::ZERO,
            name: format!("/op-{service_marker}"),
            kind: SpanKind::Server,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 1_000,
            end_time_unix_nano: 6_000,
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

    fn trace(id: u8, service: &str) -> Trace {
        let mut t = Trace::new(TraceId([id; 16]));
        t.resource_spans.push(ResourceSpans {
            resource: Resource { service_name: Some(service.into()), ..Default::default() },
            scope_spans: vec![ScopeSpans { scope: Default::default(), spans: vec![span(id, service)] }],
        });
        t.recompute_derived_fields();
        t
    }

    #[tokio::test]
    async fn search_finds_and_ranks_matching_traces() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.path()));
        let block_config = BlockConfig::default();
        trace_block::seal("tenant-a", vec![trace(1, "api"), trace(2, "worker")], &block_config, store.as_ref())
            .await
            .unwrap();

        let coordinator = Coordinator::new(store, QueryConfig::default());
        let request = SearchRequest {
            query: r#"resource.service.name="api""#.into(),
            start_unix_nano: 0,
            end_unix_nano: 10_000,
            limit: 10,
            deadline_secs: 5,
            ..Default::default()
        };
        let response = coordinator.search("tenant-a", request).await.unwrap();
        assert_eq!(response.traces.len(), 1);
        assert_eq!(response.traces[0].trace_id, TraceId([1; 16]));
        assert_eq!(response.metrics.total_jobs, response.metrics.completed_jobs);
    }

    #[tokio::test]
    async fn run_worker_job_answers_a_single_named_block() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.path()));
        let block_config = BlockConfig::default();
        let meta = trace_block::seal("tenant-a", vec![trace(1, "api")], &block_config, store.as_ref())
            .await
            .unwrap();

        let coordinator = Coordinator::new(store, QueryConfig::default());
        let query = crate::traceql::parse(r#"resource.service.name="api""#).unwrap();
        let request = SearchRequest { limit: 10, ..Default::default() };

        let result = coordinator
            .run_worker_job("tenant-a", &meta.block_id.to_string(), 0, meta.row_group_count(), &query, &request, 10)
            .await
            .unwrap();
        assert_eq!(result.matched.len(), 1);
    }

    #[tokio::test]
    async fn find_trace_by_id_concatenates_across_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.path()));
        let block_config = BlockConfig::default();

        let mut first_half = Trace::new(TraceId([9; 16]));
        first_half.resource_spans.push(ResourceSpans {
            resource: Resource { service_name: Some("frontend".into()), ..Default::default() },
            scope_spans: vec![ScopeSpans { scope: Default::default(), spans: vec![span(9, "frontend")] }],
        });
        first_half.recompute_derived_fields();

        let mut second_half = Trace::new(TraceId([9; 16]));
        second_half.resource_spans.push(ResourceSpans {
            resource: Resource { service_name: Some("backend".into()), ..Default::default() },
            scope_spans: vec![ScopeSpans { scope: Default::default(), spans: vec![span(10, "backend")] }],
        });
        second_half.recompute_derived_fields();

        trace_block::seal("tenant-a", vec![first_half], &block_config, store.as_ref()).await.unwrap();
        trace_block::seal("tenant-a", vec![second_half], &block_config, store.as_ref()).await.unwrap();

        let coordinator = Coordinator::new(store, QueryConfig::default());
        let found = coordinator
            .find_trace_by_id("tenant-a", TraceId([9; 16]), 0, 100_000)
            .await
            .unwrap()
            .expect("trace present across both blocks");
        assert_eq!(found.resource_spans.len(), 2);
    }

    #[tokio::test]
    async fn find_trace_by_id_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.path()));
        let block_config = BlockConfig::default();
        trace_block::seal("tenant-a", vec![trace(1, "api")], &block_config, store.as_ref()).await.unwrap();

        let coordinator = Coordinator::new(store, QueryConfig::default());
        let found = coordinator.find_trace_by_id("tenant-a", TraceId([0xaa; 16]), 0, 100_000).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn admission_rejects_once_the_tenant_queue_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalDisk::new(dir.path()));
        let mut config = QueryConfig::default();
        config.max_outstanding_per_tenant = 1;
        let coordinator = Coordinator::new(store, config);

        let _held = coordinator.admit("tenant-a").await.unwrap();
        let rejected = coordinator.admit("tenant-a").await;
        assert!(matches!(rejected, Err(QueryError::TooManyRequests { .. })));
    }
}
