use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use futures::future::try_join_all;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, instrument, warn};
use trace_config::{AccumulatorConfig, Limits, OverrideTable};
use trace_types::{DataQuality, Trace, TraceId};
use trace_wal::Wal;

use crate::builder::{append_into, IngestSpan, TraceBuilder};
use crate::error::{IngestError, RejectKind};
use crate::stripe::Stripe;
use crate::token_bucket::TokenBucket;

/// A trace removed from the accumulator, ready to hand off to the block
/// writer (spec.md §3 lifecycle: "Closed traces flow to C3").
#[derive(Clone)]
pub struct SealedTrace {
    pub tenant_id: String,
    pub trace: Trace,
    pub data_quality: DataQuality,
}

struct TenantState {
    bucket: Mutex<TokenBucket>,
    live_traces: AtomicU64,
}

struct Metrics {
    attributes_truncated_total: prometheus::IntCounter,
    disconnected_trace_flushed_to_wal: prometheus::IntCounter,
    rootless_trace_flushed_to_wal: prometheus::IntCounter,
    rejected_total: prometheus::IntCounterVec,
}

impl Metrics {
    fn new() -> Self {
        Self {
            attributes_truncated_total: prometheus::IntCounter::new(
                "attributes_truncated_total",
                "attributes truncated for exceeding max_attribute_bytes",
            )
            .expect("valid metric"),
            disconnected_trace_flushed_to_wal: prometheus::IntCounter::new(
                "disconnected_trace_flushed_to_wal",
                "traces sealed with a non-root span whose parent is missing",
            )
            .expect("valid metric"),
            rootless_trace_flushed_to_wal: prometheus::IntCounter::new(
                "rootless_trace_flushed_to_wal",
                "traces sealed with no root span",
            )
            .expect("valid metric"),
            rejected_total: prometheus::IntCounterVec::new(
                prometheus::Opts::new("push_rejected_total", "rejected pushes by reason"),
                &["kind"],
            )
            .expect("valid metric"),
        }
    }
}

fn unix_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Owns the in-memory state of in-flight traces across `stripes` shards of
/// the key space (spec.md §4.1 C1). Each stripe is independently locked;
/// traces never move between stripes.
pub struct TraceAccumulator {
    stripes: Vec<Mutex<Stripe>>,
    wal: Arc<Wal>,
    overrides: Arc<OverrideTable>,
    tenants: RwLock<AHashMap<String, Arc<TenantState>>>,
    config: AccumulatorConfig,
    metrics: Metrics,
    sealed_tx: mpsc::UnboundedSender<SealedTrace>,
}

impl TraceAccumulator {
    pub fn new(config: AccumulatorConfig, overrides: Arc<OverrideTable>, wal: Arc<Wal>) -> (Arc<Self>, mpsc::UnboundedReceiver<SealedTrace>) {
        let (sealed_tx, sealed_rx) = mpsc::unbounded_channel();
        let stripes = (0..config.stripes).map(|_| Mutex::new(Stripe::default())).collect();
        let this = Arc::new(Self {
            stripes,
            wal,
            overrides,
            tenants: RwLock::new(AHashMap::new()),
            config,
            metrics: Metrics::new(),
            sealed_tx,
        });
        (this, sealed_rx)
    }

    fn stripe_index(&self, trace_id: TraceId) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in trace_id.0 {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash as usize) % self.stripes.len()
    }

    async fn tenant_state(&self, tenant: &str, limits: &Limits) -> Arc<TenantState> {
        if let Some(state) = self.tenants.read().await.get(tenant) {
            return state.clone();
        }
        let mut guard = self.tenants.write().await;
        guard
            .entry(tenant.to_string())
            .or_insert_with(|| {
                Arc::new(TenantState {
                    bucket: Mutex::new(TokenBucket::new(limits.burst_bytes, limits.bytes_per_sec)),
                    live_traces: AtomicU64::new(0),
                })
            })
            .clone()
    }

    /// Accepts a batch of spans for `tenant`. Returns once every span is
    /// durable in the WAL (spec.md §4.1 `Push` contract).
    #[instrument(skip(self, spans))]
    pub async fn push(&self, tenant: &str, spans: Vec<IngestSpan>) -> Result<(), IngestError> {
        let limits = self.overrides.limits_for(tenant).ok_or_else(|| {
            self.metrics.rejected_total.with_label_values(&["tenant_unknown"]).inc();
            RejectKind::TenantUnknown
        })?;
        let tenant_state = self.tenant_state(tenant, &limits).await;

        let total_bytes: u64 = spans.iter().map(|s| crate::builder::approx_span_bytes(&s.span) as u64).sum();
        {
            let mut bucket = tenant_state.bucket.lock().await;
            if !bucket.try_consume(total_bytes) {
                self.metrics.rejected_total.with_label_values(&["rate_limited"]).inc();
                return Err(RejectKind::RateLimited.into());
            }
        }

        let mut grouped: AHashMap<TraceId, Vec<IngestSpan>> = AHashMap::new();
        for s in spans {
            grouped.entry(s.trace_id).or_default().push(s);
        }

        // Pass 1: validate every group before mutating any stripe, so a
        // rejection never leaves a partially-admitted push visible in the
        // accumulator.
        for (trace_id, group) in &grouped {
            let stripe = self.stripes[self.stripe_index(*trace_id)].lock().await;
            let is_new = !stripe.traces.contains_key(trace_id);
            if is_new && tenant_state.live_traces.load(Ordering::Relaxed) >= limits.max_live_traces {
                self.metrics.rejected_total.with_label_values(&["live_traces_exceeded"]).inc();
                return Err(RejectKind::LiveTracesExceeded.into());
            }
            let incoming_bytes: usize = group.iter().map(|s| crate::builder::approx_span_bytes(&s.span)).sum();
            let existing_bytes = stripe.traces.get(trace_id).map(|b| b.bytes).unwrap_or(0);
            if (existing_bytes + incoming_bytes) as u64 > limits.max_trace_bytes {
                self.metrics.rejected_total.with_label_values(&["trace_too_large"]).inc();
                return Err(RejectKind::TraceTooLarge.into());
            }
        }

        // Pass 2: commit, building the exact WAL delta for each trace group.
        let now = Instant::now();
        let ingest_time_unix_nano = unix_nanos_now();
        let idle_period = Duration::from_secs(limits.trace_idle_period_secs);
        let max_duration = Duration::from_secs(limits.max_trace_duration_secs);

        // Each group's stripe lock is released before its WAL append is
        // awaited (spec.md §5: blocking I/O suspension points must not hold
        // the stripe mutex). `commits` owns every delta so the futures built
        // from it below can borrow safely across the final `await`.
        let mut commits: Vec<(TraceId, Vec<trace_types::ResourceSpans>)> = Vec::with_capacity(grouped.len());
        for (trace_id, group) in grouped {
            let mut stripe = self.stripes[self.stripe_index(trace_id)].lock().await;
            let builder = stripe.traces.entry(trace_id).or_insert_with(|| {
                tenant_state.live_traces.fetch_add(1, Ordering::Relaxed);
                TraceBuilder::new(tenant.to_string(), trace_id, idle_period, max_duration, now)
            });

            let mut delta = Vec::new();
            let mut incoming_bytes = 0u64;
            for ingest_span in group {
                let resource = ingest_span.resource;
                let scope = ingest_span.scope;
                incoming_bytes += crate::builder::approx_span_bytes(&ingest_span.span) as u64;
                let truncated = builder.push(resource.clone(), scope.clone(), ingest_span.span, self.config.max_attribute_bytes, now);
                if truncated.dropped_attributes_count > 0 {
                    self.metrics.attributes_truncated_total.inc_by(truncated.dropped_attributes_count as u64);
                }
                append_into(&mut delta, resource, scope, truncated);
            }
            stripe.live_bytes += incoming_bytes;

            // Completion policy 3: shard-wide soft limit, eldest first.
            while stripe.live_bytes > self.config.soft_limit_bytes {
                let Some(oldest) = stripe.oldest() else { break };
                if self.seal_locked(&mut stripe, oldest).is_none() {
                    break;
                }
            }

            commits.push((trace_id, delta));
        }

        let wal_futures = commits
            .iter()
            .map(|(trace_id, delta)| self.wal.append(tenant, ingest_time_unix_nano, delta, std::slice::from_ref(trace_id)));
        try_join_all(wal_futures).await?;
        Ok(())
    }

    /// Re-admits spans recovered from a WAL replay at startup. Unlike
    /// [`Self::push`], this skips tenant rate-limiting and the WAL append
    /// itself — the data is already durable and was already accepted once;
    /// replaying it a second time against the bucket would double-charge it
    /// and re-appending would grow the segment that is about to be dropped
    /// from in-flight tracking anyway.
    pub async fn replay(&self, tenant: &str, spans: Vec<IngestSpan>) {
        let Some(limits) = self.overrides.limits_for(tenant) else {
            warn!(%tenant, "dropping replayed spans for a tenant with no resolvable overrides");
            return;
        };
        let tenant_state = self.tenant_state(tenant, &limits).await;
        let now = Instant::now();
        let idle_period = Duration::from_secs(limits.trace_idle_period_secs);
        let max_duration = Duration::from_secs(limits.max_trace_duration_secs);

        let mut grouped: AHashMap<TraceId, Vec<IngestSpan>> = AHashMap::new();
        for s in spans {
            grouped.entry(s.trace_id).or_default().push(s);
        }

        for (trace_id, group) in grouped {
            let mut stripe = self.stripes[self.stripe_index(trace_id)].lock().await;
            let builder = stripe.traces.entry(trace_id).or_insert_with(|| {
                tenant_state.live_traces.fetch_add(1, Ordering::Relaxed);
                TraceBuilder::new(tenant.to_string(), trace_id, idle_period, max_duration, now)
            });
            let mut incoming_bytes = 0u64;
            for ingest_span in group {
                incoming_bytes += crate::builder::approx_span_bytes(&ingest_span.span) as u64;
                builder.push(ingest_span.resource, ingest_span.scope, ingest_span.span, self.config.max_attribute_bytes, now);
            }
            stripe.live_bytes += incoming_bytes;
        }
    }

    /// Forces immediate sealing of every in-flight trace for `tenant`
    /// (spec.md §4.1 `Flush`).
    pub async fn flush(&self, tenant: &str) -> Vec<SealedTrace> {
        let mut out = Vec::new();
        for stripe_lock in &self.stripes {
            let mut stripe = stripe_lock.lock().await;
            let ids: Vec<TraceId> = stripe
                .traces
                .iter()
                .filter(|(_, b)| b.tenant_id == tenant)
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                if let Some(sealed) = self.seal_locked(&mut stripe, id) {
                    out.push(sealed);
                }
            }
        }
        out
    }

    /// Applies the idle-timeout and max-duration completion-policy rules
    /// across every stripe (spec.md §4.1 completion policy 1-2). Intended
    /// to be driven by a periodic caller (e.g. `trace-cli`'s DAG-owned
    /// ticker).
    pub async fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let mut sealed_count = 0;
        for stripe_lock in &self.stripes {
            let mut stripe = stripe_lock.lock().await;
            for id in stripe.due_for_seal(now) {
                if self.seal_locked(&mut stripe, id).is_some() {
                    sealed_count += 1;
                }
            }
        }
        sealed_count
    }

    /// Drains every stripe unconditionally (spec.md §4.1 `Shutdown`).
    pub async fn shutdown(&self) -> Vec<SealedTrace> {
        let mut out = Vec::new();
        for stripe_lock in &self.stripes {
            let mut stripe = stripe_lock.lock().await;
            let ids: Vec<TraceId> = stripe.traces.keys().copied().collect();
            for id in ids {
                if let Some(sealed) = self.seal_locked(&mut stripe, id) {
                    out.push(sealed);
                }
            }
        }
        out
    }

    /// Removes a trace from its stripe, finalizes its derived fields and
    /// data-quality flags, publishes it on the sealed-trace channel, and
    /// also returns it so synchronous callers (`flush`, `shutdown`) don't
    /// need to race the channel.
    fn seal_locked(&self, stripe: &mut Stripe, id: TraceId) -> Option<SealedTrace> {
        let builder = stripe.remove(&id)?;
        let mut trace = builder.trace;
        trace.recompute_derived_fields();
        let data_quality = trace.data_quality();
        if data_quality.disconnected_trace {
            self.metrics.disconnected_trace_flushed_to_wal.inc();
        }
        if data_quality.rootless_trace {
            self.metrics.rootless_trace_flushed_to_wal.inc();
        }
        let sealed = SealedTrace {
            tenant_id: builder.tenant_id,
            trace,
            data_quality,
        };
        info!(trace_id = %id, tenant = %sealed.tenant_id, "sealing trace");
        if self.sealed_tx.send(sealed.clone()).is_err() {
            warn!("sealed-trace receiver dropped; trace lost from channel but already logged");
        }
        Some(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use trace_config::{TenantOverrides, WILDCARD};
    use trace_types::{InstrumentationScope, Resource, Span, SpanId, SpanKind, StatusCode};

    fn wildcard_overrides() -> Arc<OverrideTable> {
        let mut per_tenant = HashMap::new();
        per_tenant.insert(WILDCARD.to_string(), TenantOverrides::default());
        Arc::new(OverrideTable::new(AccumulatorConfig::default(), per_tenant))
    }

    /// Returns the `Wal` alongside its backing `TempDir`, which must stay
    /// alive for the directory to persist for the duration of the test.
    async fn test_wal() -> (Arc<Wal>, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let wal = Wal::open(dir.path(), 64 * 1024 * 1024).await.expect("wal open");
        (Arc::new(wal), dir)
    }

    fn span(trace_id: TraceId, id: u8, parent: SpanId) -> IngestSpan {
        IngestSpan {
            trace_id,
            resource: Resource::default(),
            scope: InstrumentationScope::default(),
            span: Span {
                span_id: SpanId([id; 8]),
                parent_span_id: parent,
                name: "/hi".into(),
                kind: SpanKind::Server,
                status: StatusCode::Ok,
                status_message: String::new(),
                start_time_unix_nano: 0,
                end_time_unix_nano: 0,
                trace_state: String::new(),
                http_method: None,
                http_url: None,
                http_status_code: None,
                attrs: vec![],
                events: vec![],
                links: vec![],
                dropped_attributes_count: 0,
                dropped_events_count: 0,
                dropped_links_count: 0,
            },
        }
    }

    #[tokio::test]
    async fn push_then_flush_round_trips_a_trace() {
        let (wal, _dir) = test_wal().await;
        let (acc, _sealed_rx) = TraceAccumulator::new(AccumulatorConfig::default(), wildcard_overrides(), wal);

        let trace_id = TraceId([7; 16]);
        acc.push("acme", vec![span(trace_id, 1, SpanId::ZERO)]).await.expect("push ok");

        let sealed = acc.flush("acme").await;
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].trace.trace_id, trace_id);
        assert_eq!(sealed[0].trace.span_count(), 1);
        assert!(!sealed[0].data_quality.rootless_trace);
    }

    #[tokio::test]
    async fn unknown_tenant_is_rejected() {
        let (wal, _dir) = test_wal().await;
        let table = Arc::new(OverrideTable::new(AccumulatorConfig::default(), HashMap::new()));
        let (acc, _rx) = TraceAccumulator::new(AccumulatorConfig::default(), table, wal);

        let err = acc.push("acme", vec![span(TraceId([1; 16]), 1, SpanId::ZERO)]).await.unwrap_err();
        assert!(matches!(err, IngestError::Rejected(RejectKind::TenantUnknown)));
    }

    #[tokio::test]
    async fn rootless_trace_is_flagged_at_seal() {
        let (wal, _dir) = test_wal().await;
        let (acc, _rx) = TraceAccumulator::new(AccumulatorConfig::default(), wildcard_overrides(), wal);

        let trace_id = TraceId([9; 16]);
        // Every span has a non-zero parent: no root span exists.
        acc.push("acme", vec![span(trace_id, 1, SpanId([2; 8]))]).await.expect("push ok");

        let sealed = acc.flush("acme").await;
        assert_eq!(sealed.len(), 1);
        assert!(sealed[0].data_quality.rootless_trace);
    }

    #[tokio::test]
    async fn shutdown_drains_every_tenant() {
        let (wal, _dir) = test_wal().await;
        let (acc, _rx) = TraceAccumulator::new(AccumulatorConfig::default(), wildcard_overrides(), wal);

        acc.push("acme", vec![span(TraceId([1; 16]), 1, SpanId::ZERO)]).await.expect("push ok");
        acc.push("globex", vec![span(TraceId([2; 16]), 1, SpanId::ZERO)]).await.expect("push ok");

        let sealed = acc.shutdown().await;
        assert_eq!(sealed.len(), 2);
    }

    #[tokio::test]
    async fn trace_too_large_is_rejected_without_partial_commit() {
        let mut per_tenant = HashMap::new();
        per_tenant.insert(
            WILDCARD.to_string(),
            TenantOverrides {
                max_trace_bytes: Some(1),
                ..Default::default()
            },
        );
        let table = Arc::new(OverrideTable::new(AccumulatorConfig::default(), per_tenant));
        let (wal, _dir) = test_wal().await;
        let (acc, _rx) = TraceAccumulator::new(AccumulatorConfig::default(), table, wal);

        let err = acc.push("acme", vec![span(TraceId([3; 16]), 1, SpanId::ZERO)]).await.unwrap_err();
        assert!(matches!(err, IngestError::Rejected(RejectKind::TraceTooLarge)));

        // Nothing should have been admitted: flush sees no traces at all.
        assert!(acc.flush("acme").await.is_empty());
    }
}
