//! The block writer/reader (C3): Arrow schema, encode/decode between
//! `Trace` and `RecordBatch`, the split-block bloom filter, the page index,
//! and the seal protocol that publishes a block to object storage.

mod bloom;
mod decode;
mod encode;
mod error;
mod index;
mod reader;
mod schema;
mod writer;

pub use bloom::BloomFilter;
pub use decode::{decode_trace_scalars, decode_traces, TraceScalarRow};
pub use encode::encode_traces;
pub use error::BlockError;
pub use index::{PageIndex, RowGroupStats};
pub use reader::{BlockHandle, PartialIterator};
pub use schema::{block_schema, METADATA_ONLY_COLUMNS};
pub use writer::seal;
