use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// A 16-byte trace identifier.
///
/// Traces have no other key: this is the only identity the engine ever
/// indexes on (spec.md §1 — "indexes them by trace identifier only").
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TraceId(pub [u8; 16]);

impl Default for TraceId {
    fn default() -> Self {
        TraceId([0u8; Self::LEN])
    }
}

impl TraceId {
    pub const LEN: usize = 16;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LEN {
            return Err(TypesError::BadIdLength {
                what: "trace id",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let mut buf = [0u8; Self::LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    /// Parses a hex-encoded trace id, as accepted by `GET /api/traces/{hex}`.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(s).map_err(|source| TypesError::BadHex {
            what: "trace id",
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(self) -> bool {
        self.0 == [0u8; Self::LEN]
    }
}

impl fmt::Debug for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TraceId({})", self.to_hex())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// An 8-byte span identifier. All-zero means "no parent" when used as a
/// parent id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpanId(pub [u8; 8]);

impl SpanId {
    pub const LEN: usize = 8;

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LEN {
            return Err(TypesError::BadIdLength {
                what: "span id",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let mut buf = [0u8; Self::LEN];
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }

    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let bytes = hex::decode(s).map_err(|source| TypesError::BadHex {
            what: "span id",
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// The all-zero span id, used as a sentinel "no parent" value.
    pub const ZERO: SpanId = SpanId([0u8; 8]);

    pub fn is_root(self) -> bool {
        self == Self::ZERO
    }
}

impl fmt::Debug for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpanId({})", self.to_hex())
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A time-ordered block identifier (ULID-like: UUIDv7 gives us a
/// monotonically-increasing, sortable identifier without a central
/// allocator, the same property a ULID buys).
///
/// "Block files are immutable after publication; their identifier is chosen
/// before upload and never reused" (spec.md §3) — UUIDv7's timestamp+random
/// layout makes collision on reuse vanishingly unlikely even with clock
/// skew across ingesters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub uuid::Uuid);

impl BlockId {
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_hex_roundtrip() {
        let id = TraceId([1u8; 16]);
        assert_eq!(TraceId::from_hex(&id.to_hex()).unwrap(), id);
    }

    #[test]
    fn span_id_zero_is_root() {
        assert!(SpanId::ZERO.is_root());
        assert!(!SpanId([1, 0, 0, 0, 0, 0, 0, 0]).is_root());
    }

    #[test]
    fn bad_length_rejected() {
        assert!(matches!(
            TraceId::from_bytes(&[0u8; 15]),
            Err(TypesError::BadIdLength { .. })
        ));
    }

    #[test]
    fn block_ids_are_monotonic_ish() {
        let a = BlockId::new();
        let b = BlockId::new();
        // UUIDv7 embeds a millisecond timestamp in the high bits, so block
        // ids minted in sequence compare as non-decreasing (barring the same
        // millisecond, where the random tail still keeps ordering stable
        // enough for listing purposes).
        assert!(a.0.as_u128() <= b.0.as_u128() || a != b);
    }
}
