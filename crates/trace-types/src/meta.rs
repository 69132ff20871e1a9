use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::BlockId;

/// Bloom filter construction parameters, recorded in `BlockMeta` so a reader
/// can decide whether to trust the bloom section without re-deriving them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomParams {
    pub target_false_positive_rate: f64,
    pub bits_per_block: u32,
    pub num_blocks: u32,
}

/// Per-block sidecar metadata. Readable without touching the block body —
/// "BlockMeta is readable without touching the block body" (spec.md §3) — so
/// it is its own small JSON file rather than a trailer inside the Parquet
/// footer.
///
/// Field set matches spec.md §3 verbatim; `version` and `encoding` are plain
/// strings rather than enums so that a minor-version reader can round-trip
/// metadata it doesn't fully understand (spec.md §6: "reader compatibility
/// is value-based: unknown fields are ignored, missing optional fields take
/// defaults").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockMeta {
    pub tenant_id: String,
    pub block_id: BlockId,
    pub version: String,
    pub encoding: String,

    pub min_timestamp_unix_nano: u64,
    pub max_timestamp_unix_nano: u64,

    pub start_ingestion_time_unix_nano: u64,
    pub end_ingestion_time_unix_nano: u64,

    pub total_records: u64,
    /// Byte size per column, keyed by dotted column path (e.g.
    /// `ResourceSpans.ScopeSpans.Spans.Name`).
    pub column_sizes_bytes: BTreeMap<String, u64>,

    pub bloom_params: BloomParams,
    pub total_records_per_row_group: u64,
    pub index_page_size_bytes: u32,
    pub footer_offset: u64,

    /// Set once the block has been folded into a compaction output; inputs
    /// are retained for `compacted_grace_period` beyond this point (spec.md
    /// §4.4) before they become eligible for deletion.
    #[serde(default)]
    pub compacted_by: Option<BlockId>,
    #[serde(default)]
    pub compacted_at_unix_nano: Option<u64>,
}

impl BlockMeta {
    /// Whether this block's `[min, max]` timestamp range overlaps the query
    /// window `[start, end)` — the first-pass filter in job planning
    /// (spec.md §4.5).
    pub fn overlaps(&self, start_unix_nano: u64, end_unix_nano: u64) -> bool {
        self.min_timestamp_unix_nano < end_unix_nano && self.max_timestamp_unix_nano >= start_unix_nano
    }

    pub fn row_group_count(&self) -> u64 {
        if self.total_records_per_row_group == 0 {
            return 0;
        }
        self.total_records
            .div_ceil(self.total_records_per_row_group)
    }

    pub fn object_path(&self) -> String {
        format!("{}/{}", self.tenant_id, self.block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> BlockMeta {
        BlockMeta {
            tenant_id: "t1".into(),
            block_id: BlockId::new(),
            version: "v1".into(),
            encoding: "parquet-snappy".into(),
            min_timestamp_unix_nano: 1_000,
            max_timestamp_unix_nano: 2_000,
            start_ingestion_time_unix_nano: 0,
            end_ingestion_time_unix_nano: 0,
            total_records: 25_000,
            column_sizes_bytes: BTreeMap::new(),
            bloom_params: BloomParams {
                target_false_positive_rate: 0.01,
                bits_per_block: 256,
                num_blocks: 100,
            },
            total_records_per_row_group: 10_000,
            index_page_size_bytes: 64 * 1024,
            footer_offset: 0,
            compacted_by: None,
            compacted_at_unix_nano: None,
        }
    }

    #[test]
    fn overlap_detection() {
        let m = meta();
        assert!(m.overlaps(500, 1_500));
        assert!(m.overlaps(1_500, 2_500));
        assert!(!m.overlaps(3_000, 4_000));
        assert!(!m.overlaps(0, 500));
    }

    #[test]
    fn row_group_count_rounds_up() {
        assert_eq!(meta().row_group_count(), 3);
    }

    #[test]
    fn unknown_fields_ignored_on_deserialize() {
        let m = meta();
        let mut value = serde_json::to_value(&m).unwrap();
        value["some_future_field"] = serde_json::json!("ignored");
        let round_tripped: BlockMeta = serde_json::from_value(value).unwrap();
        assert_eq!(round_tripped.block_id, m.block_id);
    }
}
