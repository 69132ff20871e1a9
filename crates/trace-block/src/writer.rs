use std::collections::BTreeMap;

use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use trace_config::BlockConfig;
use trace_objectstore::ObjectStore;
use trace_types::{BlockId, BlockMeta, Trace};

use crate::bloom::BloomFilter;
use crate::encode::encode_traces;
use crate::error::BlockError;
use crate::index::PageIndex;
use crate::schema::block_schema;

/// Current on-disk encoding tag, recorded in `BlockMeta::encoding` so a
/// future incompatible layout can be rejected rather than silently
/// misread (spec.md §6 reader-compatibility notes).
const ENCODING: &str = "parquet-snappy-v1";
const VERSION: &str = "1";

/// Seals a batch of finished traces into a new immutable block (spec.md
/// §4.3, the five-step seal protocol): assigns a block id, streams row
/// groups of Parquet, builds the bloom filter and page index, uploads all
/// three objects plus the metadata sidecar, and returns the resulting
/// `BlockMeta`.
///
/// Traces are sorted by trace id before chunking so row groups are
/// contiguous trace-id ranges — required both for bloom-gated lookup and
/// for the compactor's k-way merge over sorted inputs.
pub async fn seal(
    tenant_id: &str,
    mut traces: Vec<Trace>,
    config: &BlockConfig,
    store: &dyn ObjectStore,
) -> Result<BlockMeta, BlockError> {
    traces.sort_by_key(|t| t.trace_id);

    let block_id = BlockId::new();
    let schema = block_schema();
    let rows_per_row_group = config.rows_per_row_group.max(1);

    let chunks: Vec<&[Trace]> = traces.chunks(rows_per_row_group).collect();

    let mut parquet_bytes = Vec::new();
    {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_max_row_group_size(rows_per_row_group)
            .build();
        let mut writer = ArrowWriter::try_new(&mut parquet_bytes, schema.clone(), Some(props))?;
        for chunk in &chunks {
            let batch = encode_traces(schema.clone(), chunk)?;
            writer.write(&batch)?;
        }
        writer.close()?;
    }

    let bloom_params = BloomFilter::params_for(traces.len() as u64, config.bloom_target_fp_rate);
    let mut bloom = BloomFilter::from_params(bloom_params);
    for trace in &traces {
        bloom.insert(trace.trace_id);
    }
    // The bloom and index sections get their own Snappy framing, separate
    // from Parquet's own per-page codec, since they are never read through
    // the Parquet reader (spec.md §4.3 lists them as distinct sections).
    let bloom_bytes = snap::raw::Encoder::new()
        .compress_vec(&bloom.to_bytes())
        .map_err(|e| BlockError::BadBlock { block_id: block_id.to_string(), reason: e.to_string() })?;

    let index = PageIndex::build(&chunks);
    let index_bytes = snap::raw::Encoder::new()
        .compress_vec(&index.to_bytes()?)
        .map_err(|e| BlockError::BadBlock { block_id: block_id.to_string(), reason: e.to_string() })?;

    let min_timestamp = traces.iter().map(|t| t.start_time_unix_nano).min().unwrap_or(0);
    let max_timestamp = traces.iter().map(|t| t.end_time_unix_nano).max().unwrap_or(0);

    let prefix = format!("{tenant_id}/{block_id}");

    // "Any error during upload abandons the block-id; no partial block is
    // ever referenced" (spec.md §4.3) — nothing publishes `meta.json` until
    // every prior object has landed, so a crash mid-upload just leaves
    // orphan objects the compactor's garbage pass will eventually reclaim.
    store.write(&format!("{prefix}/data.parquet"), parquet_bytes.into()).await?;
    store.write(&format!("{prefix}/bloom"), bloom_bytes.into()).await?;
    store.write(&format!("{prefix}/index"), index_bytes.into()).await?;

    let now = now_unix_nano();
    let meta = BlockMeta {
        tenant_id: tenant_id.to_string(),
        block_id,
        version: VERSION.to_string(),
        encoding: ENCODING.to_string(),
        min_timestamp_unix_nano: min_timestamp,
        max_timestamp_unix_nano: max_timestamp,
        start_ingestion_time_unix_nano: now,
        end_ingestion_time_unix_nano: now,
        total_records: traces.len() as u64,
        column_sizes_bytes: BTreeMap::new(),
        bloom_params,
        total_records_per_row_group: rows_per_row_group as u64,
        index_page_size_bytes: config.index_page_size_bytes as u32,
        footer_offset: 0,
        compacted_by: None,
        compacted_at_unix_nano: None,
    };

    let meta_bytes = serde_json::to_vec(&meta)?;
    store.write(&format!("{prefix}/meta.json"), meta_bytes.into()).await?;

    Ok(meta)
}

fn now_unix_nano() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_objectstore::LocalDisk;
    use trace_types::{Resource, ResourceSpans, ScopeSpans, Span, SpanId, SpanKind, StatusCode, TraceId};

    fn span(id: u8, parent: u8, name: &str) -> Span {
        Span {
            span_id: SpanId([id; 8]),
            parent_span_id: if parent == 0 { SpanId::ZERO } else { SpanId([parent; 8]) },
            name: name.to_string(),
            kind: SpanKind::Server,
            status: StatusCode::Ok,
            status_message: String::new(),
            start_time_unix_nano: 1_000,
            end_time_unix_nano: 2_000,
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

    fn trace(id: u8) -> Trace {
        let mut t = Trace::new(TraceId([id; 16]));
        t.resource_spans.push(ResourceSpans {
            resource: Resource {
                service_name: Some("svc".into()),
                ..Default::default()
            },
            scope_spans: vec![ScopeSpans {
                scope: Default::default(),
                spans: vec![span(id, 0, "/root")],
            }],
        });
        t.recompute_derived_fields();
        t
    }

    #[tokio::test]
    async fn seal_uploads_all_four_objects() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDisk::new(dir.path());
        let config = BlockConfig::default();
        let traces = vec![trace(1), trace(2), trace(3)];

        let meta = seal("tenant-a", traces, &config, &store).await.unwrap();

        assert_eq!(meta.total_records, 3);
        let prefix = meta.object_path();
        assert!(store.read(&format!("{prefix}/data.parquet"), None).await.is_ok());
        assert!(store.read(&format!("{prefix}/bloom"), None).await.is_ok());
        assert!(store.read(&format!("{prefix}/index"), None).await.is_ok());
        assert!(store.read(&format!("{prefix}/meta.json"), None).await.is_ok());
    }
}
