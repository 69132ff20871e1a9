use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::WalError;
use crate::record::{decode_record, encode_record, DecodeOutcome};

/// Segment file names are monotonic and zero-padded so a directory listing
/// sorts in write order — the same convention the teacher's persist layer
/// uses for blob keys.
pub fn segment_file_name(sequence: u64) -> String {
    format!("{sequence:020}.wal")
}

pub fn segment_path(dir: &Path, sequence: u64) -> PathBuf {
    dir.join(segment_file_name(sequence))
}

/// One append-only segment file, capped at `max_bytes`.
pub struct Segment {
    pub sequence: u64,
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
}

impl Segment {
    pub async fn create(dir: &Path, sequence: u64, max_bytes: u64) -> Result<Self, WalError> {
        let path = segment_path(dir, sequence);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|source| WalError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            sequence,
            path,
            file,
            size: 0,
            max_bytes,
        })
    }

    /// Appends `records` (already-encoded, concatenated) and fsyncs once.
    /// The caller is responsible for batching multiple logical records into
    /// one buffer before calling this, which is how group-commit fsync
    /// coalescing (spec.md §4.2) is implemented one layer up in `Wal`.
    pub async fn append_and_sync(&mut self, buf: &[u8]) -> Result<(), WalError> {
        self.file
            .write_all(buf)
            .await
            .map_err(|source| WalError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.file.sync_data().await.map_err(|source| WalError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.size += buf.len() as u64;
        Ok(())
    }

    pub fn has_room_for(&self, additional: usize) -> bool {
        self.size + additional as u64 <= self.max_bytes
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of scanning one segment during recovery.
pub struct ReplayedSegment {
    pub sequence: u64,
    pub records: Vec<Bytes>,
    /// True if the segment ended with a partial (incomplete) trailing
    /// record — spec.md §4.2: "a trailing partial record terminates replay
    /// without error."
    pub truncated_tail: bool,
    /// True if a checksum mismatch was found before the end of the file.
    pub had_corruption: bool,
}

/// Reads and validates every record in a segment file, stopping at the
/// first corrupt or incomplete record (spec.md §4.2 recovery + truncation).
pub async fn replay_segment(path: &Path, sequence: u64) -> Result<ReplayedSegment, WalError> {
    let mut file = File::open(path).await.map_err(|source| WalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut buf = BytesMut::new();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut records = Vec::new();
    let mut truncated_tail = false;
    let mut had_corruption = false;

    loop {
        match decode_record(&buf) {
            DecodeOutcome::Record(payload, consumed) => {
                records.push(payload);
                let _ = buf.split_to(consumed);
                continue;
            }
            DecodeOutcome::Corrupt => {
                had_corruption = true;
                break;
            }
            DecodeOutcome::Incomplete => {
                let n = file.read(&mut chunk).await.map_err(|source| WalError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                if n == 0 {
                    // EOF. Anything still buffered is a partial trailing
                    // record.
                    truncated_tail = !buf.is_empty();
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }

    Ok(ReplayedSegment {
        sequence,
        records,
        truncated_tail,
        had_corruption,
    })
}

/// Truncates a segment file at `valid_len` bytes, discarding anything after
/// a detected corruption point.
pub async fn truncate_segment(path: &Path, valid_len: u64) -> Result<(), WalError> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .await
        .map_err(|source| WalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    file.set_len(valid_len).await.map_err(|source| WalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Encodes one record into a scratch buffer, returning the number of bytes
/// written — a thin wrapper kept here so `Wal` doesn't need to import
/// `record` directly.
pub fn encode_into(payload: &[u8], buf: &mut BytesMut) {
    encode_record(payload, buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn append_then_replay() {
        let dir = tempdir().unwrap();
        let mut seg = Segment::create(dir.path(), 0, 1 << 20).await.unwrap();
        let mut buf = BytesMut::new();
        encode_into(b"one", &mut buf);
        encode_into(b"two", &mut buf);
        seg.append_and_sync(&buf).await.unwrap();

        let replayed = replay_segment(seg.path(), 0).await.unwrap();
        assert_eq!(replayed.records.len(), 2);
        assert!(!replayed.truncated_tail);
        assert!(!replayed.had_corruption);
    }

    #[tokio::test]
    async fn trailing_partial_record_stops_replay_cleanly() {
        let dir = tempdir().unwrap();
        let mut seg = Segment::create(dir.path(), 0, 1 << 20).await.unwrap();
        let mut buf = BytesMut::new();
        encode_into(b"complete", &mut buf);
        buf.extend_from_slice(&[1, 2, 3]); // partial trailing record header
        seg.append_and_sync(&buf).await.unwrap();

        let replayed = replay_segment(seg.path(), 0).await.unwrap();
        assert_eq!(replayed.records.len(), 1);
        assert!(replayed.truncated_tail);
        assert!(!replayed.had_corruption);
    }

    #[tokio::test]
    async fn corruption_is_detected_and_stops_replay() {
        let dir = tempdir().unwrap();
        let mut seg = Segment::create(dir.path(), 0, 1 << 20).await.unwrap();
        let mut buf = BytesMut::new();
        encode_into(b"good", &mut buf);
        let corrupt_start = buf.len();
        encode_into(b"bad", &mut buf);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        let _ = corrupt_start;
        seg.append_and_sync(&buf).await.unwrap();

        let replayed = replay_segment(seg.path(), 0).await.unwrap();
        assert_eq!(replayed.records.len(), 1);
        assert!(replayed.had_corruption);
    }
}
