use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::BytesMut;
use prost::Message;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{info, instrument, warn};
use trace_types::{ResourceSpans, TraceId};

use crate::error::WalError;
use crate::proto::{self, PushRecord};
use crate::segment::{self, replay_segment, truncate_segment, Segment};

/// A config-level knob: segments rotate once they reach this many bytes.
/// spec.md §4.2 suggests 128 MiB as a representative default.
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 128 * 1024 * 1024;

/// One decoded WAL record, as produced by recovery, ready to be re-pushed
/// into the accumulator.
pub struct ReplayedPush {
    pub tenant_id: String,
    pub ingest_time_unix_nano: u64,
    pub resource_spans: Vec<ResourceSpans>,
    pub trace_ids: Vec<TraceId>,
}

struct PendingAppend {
    payload: Vec<u8>,
    trace_ids: Vec<TraceId>,
    reply: oneshot::Sender<Result<(), WalError>>,
}

/// Durable, append-only log of accepted pushes, with segment rotation,
/// crash recovery, and retention-driven truncation (spec.md §4.2).
///
/// Durability is provided by a single background task that owns the
/// current segment: `append` sends its encoded record over a channel and
/// awaits a reply; the task drains everything currently queued, writes it
/// as one buffer, and fsyncs once — "the engine MAY coalesce N pending
/// appends into one fsync, in which case all N callers unblock together"
/// (spec.md §4.2).
pub struct Wal {
    dir: PathBuf,
    tx: mpsc::Sender<PendingAppend>,
    segment_trace_ids: Arc<Mutex<BTreeMap<u64, HashSet<TraceId>>>>,
    corruption_counter: prometheus::IntCounter,
}

impl Wal {
    pub async fn open(dir: impl AsRef<Path>, max_segment_bytes: u64) -> Result<Self, WalError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| WalError::Io {
                path: dir.clone(),
                source,
            })?;

        let next_sequence = next_segment_sequence(&dir).await?;
        let segment = Segment::create(&dir, next_sequence, max_segment_bytes).await?;

        let (tx, rx) = mpsc::channel(1024);
        let segment_trace_ids: Arc<Mutex<BTreeMap<u64, HashSet<TraceId>>>> =
            Arc::new(Mutex::new(BTreeMap::new()));

        let corruption_counter = prometheus::IntCounter::new(
            "wal_corruption_total",
            "count of corrupt WAL records encountered",
        )
        .expect("valid metric");

        tokio::spawn(run_writer(
            dir.clone(),
            segment,
            max_segment_bytes,
            rx,
            segment_trace_ids.clone(),
        ));

        Ok(Self {
            dir,
            tx,
            segment_trace_ids,
            corruption_counter,
        })
    }

    /// Appends one push to the log, returning only once it is durable
    /// (written + fsynced). This is the gate `trace-ingester`'s `Push`
    /// waits on before acking the caller (spec.md §4.1).
    #[instrument(skip(self, resource_spans, trace_ids))]
    pub async fn append(
        &self,
        tenant_id: &str,
        ingest_time_unix_nano: u64,
        resource_spans: &[ResourceSpans],
        trace_ids: &[TraceId],
    ) -> Result<(), WalError> {
        let record = PushRecord {
            tenant_id: tenant_id.to_string(),
            ingest_time_unix_nano,
            resource_spans: resource_spans.iter().map(proto::ResourceSpans::from).collect(),
            trace_ids: trace_ids.iter().map(|id| id.0.to_vec()).collect(),
        };
        let payload = record.encode_to_vec();
        let trace_ids = trace_ids.to_vec();

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingAppend {
                payload,
                trace_ids,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WalError::ShuttingDown)?;

        reply_rx.await.map_err(|_| WalError::ShuttingDown)?
    }

    /// Scans every segment in order, replaying valid records and stopping
    /// replay of each segment at its first corruption or partial tail
    /// (spec.md §4.2). Corrupt segments are truncated in place so future
    /// appends pick up cleanly.
    pub async fn recover(&self) -> Result<Vec<ReplayedPush>, WalError> {
        let mut sequences = list_segment_sequences(&self.dir).await?;
        sequences.sort_unstable();

        let mut out = Vec::new();
        for seq in sequences {
            let path = segment::segment_path(&self.dir, seq);
            let replayed = replay_segment(&path, seq).await?;

            if replayed.had_corruption {
                self.corruption_counter.inc();
                warn!(segment = seq, "wal_corruption: truncating segment at corruption point");
                let valid_len: u64 = replayed
                    .records
                    .iter()
                    .map(|r| (crate::record::HEADER_LEN + r.len()) as u64)
                    .sum();
                truncate_segment(&path, valid_len).await?;
            }

            let mut segment_ids = HashSet::new();
            for bytes in replayed.records {
                let record = PushRecord::decode(bytes)?;
                let trace_ids = record
                    .trace_ids
                    .iter()
                    .filter_map(|b| TraceId::from_bytes(b).ok())
                    .collect::<Vec<_>>();
                segment_ids.extend(trace_ids.iter().copied());
                let resource_spans = record
                    .resource_spans
                    .into_iter()
                    .map(trace_types::ResourceSpans::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                out.push(ReplayedPush {
                    tenant_id: record.tenant_id,
                    ingest_time_unix_nano: record.ingest_time_unix_nano,
                    resource_spans,
                    trace_ids,
                });
            }
            self.segment_trace_ids.lock().await.insert(seq, segment_ids);
            info!(segment = seq, records = out.len(), "wal segment replayed");
        }

        Ok(out)
    }

    /// Deletes WAL segments whose every record belongs to blocks already
    /// durably uploaded. `sealed_trace_ids` is the set of trace ids now
    /// covered by an uploaded block; a segment is eligible once all trace
    /// ids it recorded are in that set (spec.md §4.2 "Truncation").
    pub async fn truncate_sealed(&self, sealed_trace_ids: &HashSet<TraceId>) -> Result<Vec<u64>, WalError> {
        let mut deleted = Vec::new();
        let mut guard = self.segment_trace_ids.lock().await;
        let mut done = Vec::new();
        for (seq, ids) in guard.iter() {
            if ids.is_subset(sealed_trace_ids) {
                done.push(*seq);
            }
        }
        for seq in done {
            guard.remove(&seq);
            let path = segment::segment_path(&self.dir, seq);
            if tokio::fs::remove_file(&path).await.is_ok() {
                deleted.push(seq);
            }
        }
        Ok(deleted)
    }

    /// Registers which trace ids a still-open segment covers, so future
    /// truncation can reason about it. Called by the writer task whenever
    /// it rotates to a new segment (see `run_writer`), and also exposed here
    /// for tests that append directly.
    pub async fn record_trace_ids(&self, sequence: u64, trace_ids: &[TraceId]) {
        let mut guard = self.segment_trace_ids.lock().await;
        guard.entry(sequence).or_default().extend(trace_ids.iter().copied());
    }
}

async fn run_writer(
    dir: PathBuf,
    mut segment: Segment,
    max_segment_bytes: u64,
    mut rx: mpsc::Receiver<PendingAppend>,
    segment_trace_ids: Arc<Mutex<BTreeMap<u64, HashSet<TraceId>>>>,
) {
    let mut next_sequence = segment.sequence + 1;

    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        // Drain whatever else is already queued so concurrent callers share
        // this fsync (spec.md §4.2 batching).
        while let Ok(more) = rx.try_recv() {
            batch.push(more);
        }

        let mut buf = BytesMut::new();
        let total_len: usize = batch.iter().map(|p| p.payload.len() + crate::record::HEADER_LEN).sum();

        if !segment.has_room_for(total_len) {
            let new_segment = match Segment::create(&dir, next_sequence, max_segment_bytes).await {
                Ok(s) => s,
                Err(e) => {
                    for pending in batch {
                        let _ = pending.reply.send(Err(WalError::Io {
                            path: dir.clone(),
                            source: std::io::Error::other(e.to_string()),
                        }));
                    }
                    continue;
                }
            };
            segment = new_segment;
            next_sequence += 1;
        }

        for pending in &batch {
            segment::encode_into(&pending.payload, &mut buf);
        }

        let result = segment.append_and_sync(&buf).await;
        let mut guard = segment_trace_ids.lock().await;
        let entry = guard.entry(segment.sequence).or_default();
        for pending in &batch {
            entry.extend(pending.trace_ids.iter().copied());
        }
        drop(guard);

        for pending in batch {
            let reply = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(WalError::Io {
                    path: dir.clone(),
                    source: std::io::Error::other(e.to_string()),
                }),
            };
            let _ = pending.reply.send(reply);
        }
    }
}

async fn list_segment_sequences(dir: &Path) -> Result<Vec<u64>, WalError> {
    let mut out = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| WalError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(entry) = entries.next_entry().await.map_err(|source| WalError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(stem) = name.strip_suffix(".wal") {
            if let Ok(seq) = stem.parse::<u64>() {
                out.push(seq);
            }
        }
    }
    Ok(out)
}

async fn next_segment_sequence(dir: &Path) -> Result<u64, WalError> {
    let existing = list_segment_sequences(dir).await?;
    Ok(existing.into_iter().max().map(|s| s + 1).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trace_types::{InstrumentationScope, Resource, ScopeSpans, Span, SpanId, SpanKind, StatusCode};

    fn sample_resource_spans() -> Vec<ResourceSpans> {
        let span = Span {
            span_id: SpanId([0xA; 8]),
            parent_span_id: SpanId::ZERO,
            name: "/hi".into(),
            kind: SpanKind::Server,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 1_000_000_000,
            end_time_unix_nano: 1_050_000_000,
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
        };
        vec![ResourceSpans {
            resource: Resource::default(),
            scope_spans: vec![ScopeSpans {
                scope: InstrumentationScope::default(),
                spans: vec![span],
            }],
        }]
    }

    fn sample_trace_id() -> TraceId {
        TraceId([1; 16])
    }

    #[tokio::test]
    async fn append_then_recover_round_trips() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), DEFAULT_MAX_SEGMENT_BYTES).await.unwrap();
        wal.append("tenant-a", 42, &sample_resource_spans(), &[sample_trace_id()])
            .await
            .unwrap();

        let replayed = wal.recover().await.unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].tenant_id, "tenant-a");
        assert_eq!(replayed[0].ingest_time_unix_nano, 42);
        assert_eq!(replayed[0].trace_ids, vec![sample_trace_id()]);
        assert_eq!(replayed[0].resource_spans[0].scope_spans[0].spans[0].name, "/hi");
    }

    #[tokio::test]
    async fn concurrent_appends_all_succeed() {
        let dir = tempdir().unwrap();
        let wal = Arc::new(Wal::open(dir.path(), DEFAULT_MAX_SEGMENT_BYTES).await.unwrap());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let wal = wal.clone();
            handles.push(tokio::spawn(async move {
                wal.append("tenant-a", 0, &sample_resource_spans(), &[sample_trace_id()])
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let replayed = wal.recover().await.unwrap();
        assert_eq!(replayed.len(), 16);
    }

    #[tokio::test]
    async fn segment_rotation_on_size_cap() {
        let dir = tempdir().unwrap();
        // A tiny cap forces rotation after the very first record.
        let wal = Wal::open(dir.path(), 64).await.unwrap();
        wal.append("tenant-a", 0, &sample_resource_spans(), &[sample_trace_id()])
            .await
            .unwrap();
        wal.append("tenant-a", 0, &sample_resource_spans(), &[sample_trace_id()])
            .await
            .unwrap();

        let mut sequences = list_segment_sequences(dir.path()).await.unwrap();
        sequences.sort_unstable();
        assert!(sequences.len() >= 2, "expected rotation to produce >=2 segments, got {sequences:?}");
    }

    #[tokio::test]
    async fn truncate_sealed_removes_fully_covered_segments() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), DEFAULT_MAX_SEGMENT_BYTES).await.unwrap();
        let id = sample_trace_id();
        wal.append("tenant-a", 0, &sample_resource_spans(), &[id])
            .await
            .unwrap();

        let mut sealed = HashSet::new();
        sealed.insert(id);
        let deleted = wal.truncate_sealed(&sealed).await.unwrap();
        assert_eq!(deleted.len(), 1);

        let remaining = list_segment_sequences(dir.path()).await.unwrap();
        assert!(remaining.is_empty());
    }
}
