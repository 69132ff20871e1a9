//! The write-ahead log (C2): length-prefixed CRC-tagged records, segment
//! rotation, crash recovery, and sealed-trace-driven truncation.

mod error;
mod proto;
mod record;
mod segment;
mod wal;

pub use error::WalError;
pub use proto::PushRecord;
pub use record::{decode_record, encode_record, DecodeOutcome, HEADER_LEN};
pub use segment::{segment_file_name, segment_path, ReplayedSegment, Segment};
pub use wal::{ReplayedPush, Wal, DEFAULT_MAX_SEGMENT_BYTES};
