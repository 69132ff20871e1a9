use serde::{Deserialize, Serialize};
use trace_types::{Trace, TraceId};

/// One row group's worth of min/max stats, letting a reader skip row groups
/// outright before touching the Parquet footer (spec.md §4.3: "page index
/// ... lets a reader skip whole pages without touching row data").
///
/// Row groups are written trace-id sorted (spec.md §4.4 invariant for
/// compaction outputs, and true of fresh blocks too since the writer sorts
/// before chunking), so `min_trace_id`/`max_trace_id` bound a contiguous
/// range rather than an arbitrary set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowGroupStats {
    pub row_group: u64,
    pub row_count: u64,
    pub min_trace_id: TraceId,
    pub max_trace_id: TraceId,
    pub min_start_time_unix_nano: u64,
    pub max_end_time_unix_nano: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PageIndex {
    pub row_groups: Vec<RowGroupStats>,
}

impl PageIndex {
    /// Builds the index from the same trace chunking the writer used for
    /// Parquet row groups, so row-group numbering lines up exactly.
    pub fn build(chunks: &[&[Trace]]) -> Self {
        let row_groups = chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let min_trace_id = chunk.iter().map(|t| t.trace_id).min().unwrap_or_default();
                let max_trace_id = chunk.iter().map(|t| t.trace_id).max().unwrap_or_default();
                let min_start = chunk
                    .iter()
                    .map(|t| t.start_time_unix_nano)
                    .min()
                    .unwrap_or(0);
                let max_end = chunk.iter().map(|t| t.end_time_unix_nano).max().unwrap_or(0);
                RowGroupStats {
                    row_group: i as u64,
                    row_count: chunk.len() as u64,
                    min_trace_id,
                    max_trace_id,
                    min_start_time_unix_nano: min_start,
                    max_end_time_unix_nano: max_end,
                }
            })
            .collect();
        Self { row_groups }
    }

    /// Row groups whose trace-id range could contain `id` — a bloom hit
    /// still needs this to find which row group(s) to actually read.
    pub fn row_groups_containing(&self, id: TraceId) -> Vec<u64> {
        self.row_groups
            .iter()
            .filter(|rg| id >= rg.min_trace_id && id <= rg.max_trace_id)
            .map(|rg| rg.row_group)
            .collect()
    }

    /// Row groups overlapping a query time window, for `Search` job planning
    /// (spec.md §4.5: "split by row-group range").
    pub fn row_groups_overlapping(&self, start_unix_nano: u64, end_unix_nano: u64) -> Vec<u64> {
        self.row_groups
            .iter()
            .filter(|rg| rg.min_start_time_unix_nano < end_unix_nano && rg.max_end_time_unix_nano >= start_unix_nano)
            .map(|rg| rg.row_group)
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
