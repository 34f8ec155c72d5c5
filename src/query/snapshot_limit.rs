//! Limits on the size of a query's historical snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which end of the history a snapshot is taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotLimitType {
    Head,
    Tail,
}

impl SnapshotLimitType {
    fn code(self) -> i32 {
        match self {
            SnapshotLimitType::Head => 0,
            SnapshotLimitType::Tail => 1,
        }
    }

    fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(SnapshotLimitType::Head),
            1 => Some(SnapshotLimitType::Tail),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotLimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotLimitType::Head => f.write_str("HEAD"),
            SnapshotLimitType::Tail => f.write_str("TAIL"),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct SnapshotLimitRepr {
    #[serde(rename = "type")]
    limit_type: i32,
    size: i32,
}

/// Bounds a snapshot to its first or last `size` values.
///
/// A size of zero is [`SnapshotLimit::NONE`] and `i32::MAX` is
/// [`SnapshotLimit::UNLIMITED`]; both are always `Head`, and equality ignores
/// the type for them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(try_from = "SnapshotLimitRepr", into = "SnapshotLimitRepr")]
pub struct SnapshotLimit {
    limit_type: SnapshotLimitType,
    size: i32,
}

impl SnapshotLimit {
    /// No historical values.
    pub const NONE: SnapshotLimit = SnapshotLimit {
        limit_type: SnapshotLimitType::Head,
        size: 0,
    };

    /// Every historical value.
    pub const UNLIMITED: SnapshotLimit = SnapshotLimit {
        limit_type: SnapshotLimitType::Head,
        size: i32::MAX,
    };

    /// Negative sizes are clamped to zero.
    pub fn new(limit_type: SnapshotLimitType, size: i32) -> Self {
        let size = size.max(0);
        let limit_type = if size == 0 || size == i32::MAX {
            SnapshotLimitType::Head
        } else {
            limit_type
        };
        Self { limit_type, size }
    }

    pub fn head(size: i32) -> Self {
        Self::new(SnapshotLimitType::Head, size)
    }

    pub fn tail(size: i32) -> Self {
        Self::new(SnapshotLimitType::Tail, size)
    }

    pub fn limit_type(&self) -> SnapshotLimitType {
        self.limit_type
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    /// The size as a collection capacity.
    pub fn len(&self) -> usize {
        usize::try_from(self.size).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl Default for SnapshotLimit {
    fn default() -> Self {
        Self::NONE
    }
}

impl PartialEq for SnapshotLimit {
    fn eq(&self, other: &Self) -> bool {
        if self.size == 0 {
            return other.size == 0;
        }
        if self.size == i32::MAX {
            return other.size == i32::MAX;
        }
        self.limit_type == other.limit_type && self.size == other.size
    }
}

impl Eq for SnapshotLimit {}

impl TryFrom<SnapshotLimitRepr> for SnapshotLimit {
    type Error = String;

    fn try_from(repr: SnapshotLimitRepr) -> Result<Self, Self::Error> {
        if repr.size < 0 {
            return Err(format!("invalid snapshot limit size {}", repr.size));
        }
        let limit_type = SnapshotLimitType::from_code(repr.limit_type)
            .ok_or_else(|| format!("invalid snapshot limit type {}", repr.limit_type))?;
        Ok(SnapshotLimit::new(limit_type, repr.size))
    }
}

impl From<SnapshotLimit> for SnapshotLimitRepr {
    fn from(limit: SnapshotLimit) -> Self {
        SnapshotLimitRepr {
            limit_type: limit.limit_type.code(),
            size: limit.size,
        }
    }
}

impl fmt::Display for SnapshotLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == SnapshotLimit::NONE {
            f.write_str("None")
        } else if *self == SnapshotLimit::UNLIMITED {
            f.write_str("Unlimited")
        } else {
            write!(f, "({} {})", self.limit_type, self.size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_and_max_force_head() {
        assert_eq!(SnapshotLimit::tail(0).limit_type(), SnapshotLimitType::Head);
        assert_eq!(
            SnapshotLimit::tail(i32::MAX).limit_type(),
            SnapshotLimitType::Head
        );
        assert_eq!(SnapshotLimit::tail(3).limit_type(), SnapshotLimitType::Tail);
    }

    #[test]
    fn test_negative_size_clamps() {
        assert_eq!(SnapshotLimit::tail(-4).size(), 0);
        assert_eq!(SnapshotLimit::tail(-4), SnapshotLimit::NONE);
    }

    #[test]
    fn test_canonical_equality() {
        assert_eq!(SnapshotLimit::head(0), SnapshotLimit::tail(0));
        assert_eq!(SnapshotLimit::head(i32::MAX), SnapshotLimit::tail(i32::MAX));
        assert_ne!(SnapshotLimit::head(5), SnapshotLimit::tail(5));
        assert_ne!(SnapshotLimit::head(5), SnapshotLimit::head(6));
    }

    #[test]
    fn test_display() {
        assert_eq!(SnapshotLimit::NONE.to_string(), "None");
        assert_eq!(SnapshotLimit::UNLIMITED.to_string(), "Unlimited");
        assert_eq!(SnapshotLimit::tail(12).to_string(), "(TAIL 12)");
    }

    #[test]
    fn test_invalid_wire_values_fail() {
        for (limit_type, size) in [(0, -1), (7, 3)] {
            let bytes = rmp_serde::to_vec(&SnapshotLimitRepr { limit_type, size }).unwrap();
            assert!(rmp_serde::from_slice::<SnapshotLimit>(&bytes).is_err());
        }
    }

    proptest! {
        #[test]
        fn prop_roundtrip(tail in any::<bool>(), size in 0i32..=i32::MAX) {
            let limit = if tail { SnapshotLimit::tail(size) } else { SnapshotLimit::head(size) };
            let bytes = rmp_serde::to_vec(&limit).unwrap();
            let decoded: SnapshotLimit = rmp_serde::from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded, limit);
            prop_assert_eq!(decoded.limit_type(), limit.limit_type());
        }
    }
}
