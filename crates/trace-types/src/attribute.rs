use serde::{Deserialize, Serialize};

/// The "any value" attribute type: a sum of six mutually exclusive variants.
///
/// spec.md §9 is explicit that this must stay a tagged union (or parallel
/// optional columns) all the way to storage: "do not store a single erased
/// 'string' column in either case — querying needs the type." We keep that
/// property in-memory too, rather than collapsing to `String` early and
/// losing it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Double(f64),
    Bool(bool),
    Array(Vec<AttributeValue>),
    KeyValueList(Vec<(String, AttributeValue)>),
}

impl AttributeValue {
    /// The column family a value belongs to in the generic `Attrs` group —
    /// used by the block writer to route a value to exactly one of
    /// `Value`/`ValueInt`/`ValueDouble`/`ValueBool`/`ValueArray`/`ValueKVList`.
    pub fn kind(&self) -> AttributeKind {
        match self {
            AttributeValue::String(_) => AttributeKind::String,
            AttributeValue::Int(_) => AttributeKind::Int,
            AttributeValue::Double(_) => AttributeKind::Double,
            AttributeValue::Bool(_) => AttributeKind::Bool,
            AttributeValue::Array(_) => AttributeKind::Array,
            AttributeValue::KeyValueList(_) => AttributeKind::KeyValueList,
        }
    }

    /// Approximate encoded size in bytes, used by the accumulator to track
    /// per-trace byte budgets and by attribute truncation accounting.
    pub fn approx_size(&self) -> usize {
        match self {
            AttributeValue::String(s) => s.len(),
            AttributeValue::Int(_) => 8,
            AttributeValue::Double(_) => 8,
            AttributeValue::Bool(_) => 1,
            AttributeValue::Array(items) => items.iter().map(AttributeValue::approx_size).sum(),
            AttributeValue::KeyValueList(kvs) => kvs
                .iter()
                .map(|(k, v)| k.len() + v.approx_size())
                .sum(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeKind {
    String,
    Int,
    Double,
    Bool,
    Array,
    KeyValueList,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_string_is_not_null() {
        // Boundary case from spec.md §8: "Trace with 0-byte attribute value:
        // preserved as such, not converted to null."
        let v = AttributeValue::String(String::new());
        assert_eq!(v.kind(), AttributeKind::String);
        assert_eq!(v.approx_size(), 0);
    }

    #[test]
    fn array_and_kvlist_are_distinct_from_string() {
        let arr = AttributeValue::Array(vec![AttributeValue::Int(1), AttributeValue::Int(2)]);
        let kv = AttributeValue::KeyValueList(vec![(
            "k".to_string(),
            AttributeValue::Bool(true),
        )]);
        assert_eq!(arr.kind(), AttributeKind::Array);
        assert_eq!(kv.kind(), AttributeKind::KeyValueList);
        assert_ne!(arr.kind(), AttributeKind::String);
    }
}
