use trace_config::CompactorConfig;
use trace_types::BlockMeta;

/// Chooses up to `config.selection_group_size` blocks below the compaction
/// threshold, preferring overlapping time windows "so that partial traces
/// (same trace-id across inputs) are merged in the same pass" (spec.md
/// §4.4). Already-compacted blocks (awaiting grace-period deletion) are
/// never reselected.
pub fn select_group(metas: &[BlockMeta], config: &CompactorConfig) -> Option<Vec<BlockMeta>> {
    let mut candidates: Vec<&BlockMeta> = metas
        .iter()
        .filter(|m| m.compacted_by.is_none())
        .filter(|m| m.total_records < config.compaction_threshold_records)
        .collect();
    if candidates.len() < 2 {
        return None;
    }

    candidates.sort_by_key(|m| m.min_timestamp_unix_nano);

    // Slide a window over the time-sorted candidates and take the densest
    // cluster of overlapping blocks, capped at the configured group size —
    // a simple greedy stand-in for a real interval-scheduling pass.
    let mut best_start = 0;
    let mut best_len = 1;
    for start in 0..candidates.len() {
        let mut end = start;
        let mut window_max_end = candidates[start].max_timestamp_unix_nano;
        while end + 1 < candidates.len() && end + 1 - start < config.selection_group_size.max(2) {
            let next = candidates[end + 1];
            if next.min_timestamp_unix_nano <= window_max_end {
                window_max_end = window_max_end.max(next.max_timestamp_unix_nano);
                end += 1;
            } else {
                break;
            }
        }
        let len = end - start + 1;
        if len > best_len {
            best_start = start;
            best_len = len;
        }
    }

    // No overlapping cluster of size >= 2 found: still compact the two
    // smallest blocks rather than never making progress.
    if best_len < 2 {
        best_start = 0;
        best_len = candidates.len().min(config.selection_group_size.max(2));
    }

    Some(
        candidates[best_start..best_start + best_len]
            .iter()
            .map(|m| (*m).clone())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_types::{BlockId, BloomParams};

    fn meta(min: u64, max: u64, records: u64) -> BlockMeta {
        BlockMeta {
            tenant_id: "t".into(),
            block_id: BlockId::new(),
            version: "1".into(),
            encoding: "parquet-snappy-v1".into(),
            min_timestamp_unix_nano: min,
            max_timestamp_unix_nano: max,
            start_ingestion_time_unix_nano: 0,
            end_ingestion_time_unix_nano: 0,
            total_records: records,
            column_sizes_bytes: Default::default(),
            bloom_params: BloomParams { target_false_positive_rate: 0.01, bits_per_block: 256, num_blocks: 1 },
            total_records_per_row_group: 1000,
            index_page_size_bytes: 65536,
            footer_offset: 0,
            compacted_by: None,
            compacted_at_unix_nano: None,
        }
    }

    #[test]
    fn prefers_overlapping_blocks_over_disjoint_ones() {
        let config = CompactorConfig::default();
        let metas = vec![
            meta(0, 100, 10),
            meta(50, 150, 10),
            meta(1_000, 1_100, 10),
        ];
        let group = select_group(&metas, &config).unwrap();
        assert_eq!(group.len(), 2);
        assert!(group.iter().all(|m| m.max_timestamp_unix_nano <= 150));
    }

    #[test]
    fn skips_already_compacted_blocks() {
        let config = CompactorConfig::default();
        let mut compacted = meta(0, 100, 10);
        compacted.compacted_by = Some(BlockId::new());
        let metas = vec![compacted, meta(50, 150, 10)];
        assert!(select_group(&metas, &config).is_none());
    }

    #[test]
    fn skips_blocks_at_or_above_the_threshold() {
        let mut config = CompactorConfig::default();
        config.compaction_threshold_records = 20;
        let metas = vec![meta(0, 100, 50), meta(0, 100, 50)];
        assert!(select_group(&metas, &config).is_none());
    }
}
