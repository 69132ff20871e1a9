use trace_config::QueryConfig;
use trace_types::BlockMeta;

/// One unit of work: decode and evaluate a contiguous row-group range out of
/// a single block (spec.md §4.5: "Search jobs are subdivided by row-group
/// range so no single job has to materialize a whole block").
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub block: BlockMeta,
    pub start_row_group: u64,
    pub row_group_count: u64,
}

/// Plans the job list for a `Search`: every block whose timestamp range
/// overlaps the query window is split into `config.row_group_job_batch`-row-
/// group chunks. Pure and synchronous — no bloom gating here, since a
/// row-group's trace-id range is irrelevant to a time/attribute search
/// (that's `FindTraceById`'s planning path, in `coordinator.rs`).
pub fn plan_search(candidates: &[BlockMeta], start_unix_nano: u64, end_unix_nano: u64, config: &QueryConfig) -> Vec<Job> {
    let batch = config.row_group_job_batch.max(1) as u64;
    let mut jobs = Vec::new();

    for block in candidates {
        if !block.overlaps(start_unix_nano, end_unix_nano) {
            continue;
        }
        let total = block.row_group_count();
        let mut start = 0u64;
        while start < total {
            let count = batch.min(total - start);
            jobs.push(Job { block: block.clone(), start_row_group: start, row_group_count: count });
            start += count;
        }
    }

    jobs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use trace_types::{BlockId, BloomParams};

    fn meta(min: u64, max: u64, total_records: u64, per_row_group: u64) -> BlockMeta {
        BlockMeta {
            tenant_id: "t1".into(),
            block_id: BlockId::new(),
            version: "v1".into(),
            encoding: "parquet-snappy".into(),
            min_timestamp_unix_nano: min,
            max_timestamp_unix_nano: max,
            start_ingestion_time_unix_nano: 0,
            end_ingestion_time_unix_nano: 0,
            total_records,
            column_sizes_bytes: BTreeMap::new(),
            bloom_params: BloomParams { target_false_positive_rate: 0.01, bits_per_block: 256, num_blocks: 4 },
            total_records_per_row_group: per_row_group,
            index_page_size_bytes: 64 * 1024,
            footer_offset: 0,
            compacted_by: None,
            compacted_at_unix_nano: None,
        }
    }

    #[test]
    fn skips_blocks_outside_the_window() {
        let blocks = vec![meta(0, 100, 10, 5)];
        let jobs = plan_search(&blocks, 1_000, 2_000, &QueryConfig::default());
        assert!(jobs.is_empty());
    }

    #[test]
    fn splits_an_overlapping_block_into_row_group_batches() {
        let blocks = vec![meta(0, 1_000, 25, 10)];
        let mut config = QueryConfig::default();
        config.row_group_job_batch = 1;
        let jobs = plan_search(&blocks, 0, 1_000, &config);
        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].start_row_group, 0);
        assert_eq!(jobs[2].start_row_group, 2);
    }

    #[test]
    fn larger_batch_produces_fewer_jobs() {
        let blocks = vec![meta(0, 1_000, 25, 10)];
        let mut config = QueryConfig::default();
        config.row_group_job_batch = 2;
        let jobs = plan_search(&blocks, 0, 1_000, &config);
        assert_eq!(jobs.len(), 2);
    }
}
