//! Core types: sequences, timestamps, and sequenced/indexed values.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Bit widths of the date components packed into the top of a sequence.
const YEAR_SIZE: u32 = 13;
const MONTH_SIZE: u32 = 4;
const DAY_SIZE: u32 = 6;
const ENCODING_SIZE: u32 = YEAR_SIZE + MONTH_SIZE + DAY_SIZE;

/// Total-order token used for ordering and deduplication.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sequence {
    /// The first possible sequence.
    pub const FIRST: Sequence = Sequence(0);

    /// The last possible sequence.
    pub const LAST: Sequence = Sequence(u64::MAX);

    /// Marks the boundary between historical and real-time data.
    pub const PRESENT: Sequence = Sequence(u64::MAX - 1);

    /// The immediately following sequence, saturating at `LAST`.
    pub fn increment(self) -> Self {
        Sequence(self.0.saturating_add(1))
    }

    /// The immediately preceding sequence, saturating at `FIRST`.
    pub fn decrement(self) -> Self {
        Sequence(self.0.saturating_sub(1))
    }

    pub fn ordinal(self) -> u64 {
        self.0
    }
}

/// A point in time, including the special values a range endpoint may hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timestamp {
    NegInfinity,
    At(NaiveDateTime),
    PosInfinity,
    NotADateTime,
}

impl Timestamp {
    /// Current time (UTC).
    pub fn now() -> Self {
        Timestamp::At(Utc::now().naive_utc())
    }

    /// Builds a timestamp from calendar components; invalid components give
    /// `NotADateTime`.
    pub fn ymd_hms(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .map(Timestamp::At)
            .unwrap_or(Timestamp::NotADateTime)
    }

    /// Whether this is one of the special values rather than a real time.
    pub fn is_special(&self) -> bool {
        !matches!(self, Timestamp::At(_))
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Timestamp::NegInfinity | Timestamp::PosInfinity)
    }

    /// Midnight of this timestamp's date, if it has one.
    pub fn date_start(&self) -> Option<Timestamp> {
        match self {
            Timestamp::At(time) => time.date().and_hms_opt(0, 0, 0).map(Timestamp::At),
            _ => None,
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(time: NaiveDateTime) -> Self {
        Timestamp::At(time)
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Timestamp::*;
        match (self, other) {
            (NotADateTime, NotADateTime) => Some(Ordering::Equal),
            (NotADateTime, _) | (_, NotADateTime) => None,
            (NegInfinity, NegInfinity) | (PosInfinity, PosInfinity) => Some(Ordering::Equal),
            (NegInfinity, _) | (_, PosInfinity) => Some(Ordering::Less),
            (PosInfinity, _) | (_, NegInfinity) => Some(Ordering::Greater),
            (At(lhs), At(rhs)) => lhs.partial_cmp(rhs),
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::NegInfinity => f.write_str("-infinity"),
            Timestamp::At(time) => write!(f, "{}", time),
            Timestamp::PosInfinity => f.write_str("+infinity"),
            Timestamp::NotADateTime => f.write_str("not-a-date-time"),
        }
    }
}

/// Encodes a timestamp's date into the high bits of a sequence.
///
/// Negative infinity maps to `FIRST`, positive infinity to `LAST` and
/// not-a-date-time to `Sequence(0)`.
pub fn encode_timestamp(timestamp: Timestamp) -> Sequence {
    match timestamp {
        Timestamp::NegInfinity => Sequence::FIRST,
        Timestamp::PosInfinity => Sequence::LAST,
        Timestamp::NotADateTime => Sequence(0),
        Timestamp::At(time) => {
            let date = time.date();
            let year = (date.year().max(0) as u64) & ((1 << YEAR_SIZE) - 1);
            let month = u64::from(date.month());
            let day = u64::from(date.day());
            Sequence(
                (year << (64 - YEAR_SIZE))
                    + (month << (64 - (YEAR_SIZE + MONTH_SIZE)))
                    + (day << (64 - ENCODING_SIZE)),
            )
        }
    }
}

/// Encodes a timestamp's date and offsets it by `sequence`.
pub fn encode_timestamp_with(timestamp: Timestamp, sequence: Sequence) -> Sequence {
    match timestamp {
        Timestamp::NotADateTime => sequence,
        Timestamp::At(_) => {
            Sequence(encode_timestamp(timestamp).0.wrapping_add(sequence.0))
        }
        _ => encode_timestamp(timestamp),
    }
}

/// Recovers the date (as midnight) encoded within a sequence.
pub fn decode_timestamp(sequence: Sequence) -> Timestamp {
    if sequence == Sequence::FIRST {
        return Timestamp::NegInfinity;
    } else if sequence == Sequence::LAST {
        return Timestamp::PosInfinity;
    } else if sequence == Sequence::PRESENT {
        return Timestamp::NotADateTime;
    }
    let mut encoding = sequence.0 >> (64 - ENCODING_SIZE);
    let day = (encoding & ((1 << DAY_SIZE) - 1)) as u32;
    encoding >>= DAY_SIZE;
    let month = (encoding & ((1 << MONTH_SIZE) - 1)) as u32;
    encoding >>= MONTH_SIZE;
    let year = (encoding & ((1 << YEAR_SIZE) - 1)) as i32;
    if year == 0 {
        return Timestamp::NotADateTime;
    }
    Timestamp::ymd_hms(year, month, day, 0, 0, 0)
}

/// Provides access to a value's timestamp, used when a range endpoint is a
/// point in time rather than a sequence.
pub trait Timestamped {
    fn timestamp(&self) -> Timestamp;
}

impl Timestamped for Timestamp {
    fn timestamp(&self) -> Timestamp {
        *self
    }
}

// Plain scalars carry no time of their own, so they never fall inside a
// timestamp-bounded range.
macro_rules! untimestamped {
    ($($t:ty),*) => {
        $(
            impl Timestamped for $t {
                fn timestamp(&self) -> Timestamp {
                    Timestamp::NotADateTime
                }
            }
        )*
    };
}

untimestamped!(bool, i32, i64, u32, u64, f64, String, &str);

/// Identifier of a query registered for live updates.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QueryId(pub i32);

impl QueryId {
    /// Sentinel for a query that is not (or not yet) registered.
    pub const UNASSIGNED: QueryId = QueryId(-1);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value that is part of a sequence. Ordering is by `sequence` only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencedValue<T> {
    pub value: T,
    pub sequence: Sequence,
}

impl<T> SequencedValue<T> {
    pub fn new(value: T, sequence: Sequence) -> Self {
        Self { value, sequence }
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn into_value(self) -> T {
        self.value
    }

    /// Maps the wrapped value, keeping the sequence.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SequencedValue<U> {
        SequencedValue {
            value: f(self.value),
            sequence: self.sequence,
        }
    }
}

impl<T> Deref for SequencedValue<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for SequencedValue<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Timestamped> Timestamped for SequencedValue<T> {
    fn timestamp(&self) -> Timestamp {
        self.value.timestamp()
    }
}

impl<T: fmt::Display> fmt::Display for SequencedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {})", self.value, self.sequence)
    }
}

/// Orders two sequenced values by their sequences.
pub fn sequence_order<T, U>(lhs: &SequencedValue<T>, rhs: &SequencedValue<U>) -> Ordering {
    lhs.sequence.cmp(&rhs.sequence)
}

/// A value tagged with the index it belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedValue<T, I> {
    pub value: T,
    pub index: I,
}

impl<T, I> IndexedValue<T, I> {
    pub fn new(value: T, index: I) -> Self {
        Self { value, index }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T, I> Deref for IndexedValue<T, I> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Timestamped, I> Timestamped for IndexedValue<T, I> {
    fn timestamp(&self) -> Timestamp {
        self.value.timestamp()
    }
}

impl<T, I: Clone> SequencedValue<IndexedValue<T, I>> {
    /// Splits off the index, leaving the base sequenced value.
    pub fn into_base(self) -> (I, SequencedValue<T>) {
        let SequencedValue { value, sequence } = self;
        (value.index, SequencedValue::new(value.value, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sequence_sentinels() {
        assert_eq!(Sequence::FIRST, Sequence(0));
        assert_eq!(Sequence::LAST, Sequence(u64::MAX));
        assert_eq!(Sequence::PRESENT, Sequence::LAST.decrement());
        assert!(Sequence::FIRST < Sequence::PRESENT);
    }

    #[test]
    fn test_sequence_saturation() {
        assert_eq!(Sequence::LAST.increment(), Sequence::LAST);
        assert_eq!(Sequence::FIRST.decrement(), Sequence::FIRST);
        assert_eq!(Sequence(5).increment(), Sequence(6));
        assert_eq!(Sequence(5).decrement(), Sequence(4));
    }

    #[test]
    fn test_timestamp_ordering() {
        let early = Timestamp::ymd_hms(1984, 5, 6, 0, 0, 0);
        let late = Timestamp::ymd_hms(2014, 5, 6, 0, 0, 0);
        assert!(early < late);
        assert!(Timestamp::NegInfinity < early);
        assert!(late < Timestamp::PosInfinity);
        assert!(Timestamp::NotADateTime.partial_cmp(&early).is_none());
        assert!(!(Timestamp::NotADateTime <= early));
        assert!(!(Timestamp::NotADateTime >= early));
    }

    #[test]
    fn test_invalid_components_are_not_a_date_time() {
        assert_eq!(Timestamp::ymd_hms(2024, 2, 30, 0, 0, 0), Timestamp::NotADateTime);
    }

    #[test]
    fn test_encode_special_timestamps() {
        assert_eq!(encode_timestamp(Timestamp::NegInfinity), Sequence::FIRST);
        assert_eq!(encode_timestamp(Timestamp::PosInfinity), Sequence::LAST);
        assert_eq!(encode_timestamp(Timestamp::NotADateTime), Sequence(0));
        assert_eq!(
            encode_timestamp_with(Timestamp::NotADateTime, Sequence(42)),
            Sequence(42)
        );
    }

    #[test]
    fn test_encode_decode_date() {
        let timestamp = Timestamp::ymd_hms(2024, 1, 15, 10, 30, 0);
        let encoded = encode_timestamp(timestamp);
        assert_eq!(decode_timestamp(encoded), Timestamp::ymd_hms(2024, 1, 15, 0, 0, 0));
        let offset = encode_timestamp_with(timestamp, Sequence(17));
        assert_eq!(offset.0 - encoded.0, 17);
        assert_eq!(decode_timestamp(offset), Timestamp::ymd_hms(2024, 1, 15, 0, 0, 0));
    }

    #[test]
    fn test_later_dates_encode_higher() {
        let a = encode_timestamp(Timestamp::ymd_hms(2024, 1, 31, 23, 59, 59));
        let b = encode_timestamp(Timestamp::ymd_hms(2024, 2, 1, 0, 0, 0));
        assert!(a < b);
    }

    #[test]
    fn test_decode_special_sequences() {
        assert_eq!(decode_timestamp(Sequence::FIRST), Timestamp::NegInfinity);
        assert_eq!(decode_timestamp(Sequence::LAST), Timestamp::PosInfinity);
        assert_eq!(decode_timestamp(Sequence::PRESENT), Timestamp::NotADateTime);
        assert_eq!(decode_timestamp(Sequence(12)), Timestamp::NotADateTime);
    }

    #[test]
    fn test_query_id_sentinel() {
        assert!(!QueryId::UNASSIGNED.is_assigned());
        assert!(QueryId(1).is_assigned());
        assert_eq!(QueryId::default(), QueryId::UNASSIGNED);
    }

    #[test]
    fn test_sequenced_value_deref_and_split() {
        let value = SequencedValue::new(IndexedValue::new(100, "IndexA"), Sequence(3));
        assert_eq!(**value, 100);
        assert_eq!(value.index(), &"IndexA");
        let (index, base) = value.into_base();
        assert_eq!(index, "IndexA");
        assert_eq!(base, SequencedValue::new(100, Sequence(3)));
    }

    proptest! {
        #[test]
        fn prop_increment_never_wraps(ordinal in any::<u64>()) {
            let sequence = Sequence(ordinal);
            prop_assert!(sequence.increment() >= sequence);
            prop_assert!(sequence.decrement() <= sequence);
        }

        #[test]
        fn prop_sequence_roundtrip(ordinal in any::<u64>()) {
            let sequence = Sequence(ordinal);
            let bytes = rmp_serde::to_vec(&sequence).unwrap();
            let decoded: Sequence = rmp_serde::from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded, sequence);
        }

        #[test]
        fn prop_date_partition_roundtrip(year in 1i32..8000, month in 1u32..=12, day in 1u32..=28) {
            let midnight = Timestamp::ymd_hms(year, month, day, 0, 0, 0);
            prop_assert_eq!(decode_timestamp(encode_timestamp(midnight)), midnight);
        }
    }
}
