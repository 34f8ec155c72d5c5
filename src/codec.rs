//! MessagePack encoding of queries and values.

use crate::error::{QueryError, Result};
use crate::query::{FilteredQuery, Range, SnapshotLimit};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value as MessagePack.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|e| QueryError::Serialization(e.to_string()))
}

/// Decodes a value from MessagePack.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    rmp_serde::from_slice(bytes).map_err(|e| QueryError::Serialization(e.to_string()))
}

/// In-place decoding that leaves the target in a safe state on failure.
pub trait Receive: DeserializeOwned + Sized {
    /// Puts the value into its safe fallback state.
    fn reset(&mut self);

    /// Decodes `bytes` into `self`. On failure `self` is reset and a
    /// `Serialization` error is returned.
    fn receive(&mut self, bytes: &[u8]) -> Result<()> {
        match decode(bytes) {
            Ok(value) => {
                *self = value;
                Ok(())
            }
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }
}

impl Receive for SnapshotLimit {
    fn reset(&mut self) {
        *self = SnapshotLimit::NONE;
    }
}

impl Receive for FilteredQuery {
    fn reset(&mut self) {
        *self = FilteredQuery::exclude_all();
    }
}

impl Receive for Range {
    fn reset(&mut self) {
        *self = Range::EMPTY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;
    use crate::query::SnapshotLimitType;
    use crate::types::Sequence;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct RawLimit {
        limit_type: i32,
        size: i32,
    }

    #[derive(Serialize, Deserialize)]
    struct RawFilter {
        filter: Expression,
    }

    #[test]
    fn test_negative_size_resets_to_none() {
        let bytes = encode(&RawLimit { limit_type: 1, size: -3 }).unwrap();
        let mut limit = SnapshotLimit::tail(5);
        let result = limit.receive(&bytes);
        assert!(matches!(result, Err(QueryError::Serialization(_))));
        assert_eq!(limit, SnapshotLimit::NONE);
        assert_eq!(limit.limit_type(), SnapshotLimitType::Head);
    }

    #[test]
    fn test_invalid_type_resets_to_none() {
        let bytes = encode(&RawLimit { limit_type: 9, size: 3 }).unwrap();
        let mut limit = SnapshotLimit::tail(5);
        assert!(limit.receive(&bytes).is_err());
        assert_eq!(limit, SnapshotLimit::NONE);
    }

    #[test]
    fn test_valid_limit_received() {
        let bytes = encode(&SnapshotLimit::tail(7)).unwrap();
        let mut limit = SnapshotLimit::NONE;
        limit.receive(&bytes).unwrap();
        assert_eq!(limit, SnapshotLimit::tail(7));
    }

    #[test]
    fn test_non_boolean_filter_resets_to_false() {
        let bytes = encode(&RawFilter {
            filter: Expression::constant(12),
        })
        .unwrap();
        let mut query = FilteredQuery::default();
        let result = query.receive(&bytes);
        assert!(matches!(result, Err(QueryError::Serialization(_))));
        assert_eq!(query.filter(), &Expression::constant(false));
    }

    #[test]
    fn test_garbage_resets_range() {
        let mut range = Range::new(Sequence(1), Sequence(2));
        assert!(range.receive(&[0xc1]).is_err());
        assert_eq!(range, Range::EMPTY);
    }

    #[test]
    fn test_sequence_roundtrip() {
        let bytes = encode(&Sequence(42)).unwrap();
        assert_eq!(decode::<Sequence>(&bytes).unwrap(), Sequence(42));
    }
}
