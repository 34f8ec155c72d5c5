//! Ranges of sequences or timestamps a query covers.

use crate::types::{Sequence, SequencedValue, Timestamp, Timestamped};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One endpoint of a [`Range`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Point {
    Sequence(Sequence),
    Timestamp(Timestamp),
}

impl From<Sequence> for Point {
    fn from(sequence: Sequence) -> Self {
        Point::Sequence(sequence)
    }
}

impl From<Timestamp> for Point {
    fn from(timestamp: Timestamp) -> Self {
        Point::Timestamp(timestamp)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Sequence(sequence) => write!(f, "{}", sequence),
            Point::Timestamp(timestamp) => write!(f, "{}", timestamp),
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct RangeRepr {
    start: Point,
    end: Point,
}

/// Closed interval `[start, end]`.
///
/// Construction normalizes the endpoints: infinite timestamps become
/// `Sequence::FIRST`/`Sequence::LAST`, while an invalid timestamp or a pair of
/// endpoints in the wrong order collapses the range to [`Range::EMPTY`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RangeRepr", into = "RangeRepr")]
pub struct Range {
    start: Point,
    end: Point,
}

impl Range {
    /// Matches nothing.
    pub const EMPTY: Range = Range::sequences(Sequence::FIRST, Sequence::FIRST);

    /// All stored data, no live updates.
    pub const HISTORICAL: Range = Range::sequences(Sequence::FIRST, Sequence::PRESENT);

    /// All stored data followed by live updates.
    pub const TOTAL: Range = Range::sequences(Sequence::FIRST, Sequence::LAST);

    /// Live updates only.
    pub const REAL_TIME: Range = Range::sequences(Sequence::PRESENT, Sequence::LAST);

    const fn sequences(start: Sequence, end: Sequence) -> Self {
        Range {
            start: Point::Sequence(start),
            end: Point::Sequence(end),
        }
    }

    pub fn new(start: impl Into<Point>, end: impl Into<Point>) -> Self {
        let (start, end) = (start.into(), end.into());
        if !is_valid(&start) || !is_valid(&end) || out_of_order(&start, &end) {
            return Range::EMPTY;
        }
        Range {
            start: normalize(start),
            end: normalize(end),
        }
    }

    pub fn start(&self) -> Point {
        self.start
    }

    pub fn end(&self) -> Point {
        self.end
    }

    /// Whether the range reaches into live data.
    pub fn is_open_ended(&self) -> bool {
        self.end == Point::Sequence(Sequence::LAST)
    }

    /// Whether `value` falls within the range.
    pub fn contains<T: Timestamped>(&self, value: &SequencedValue<T>) -> bool {
        range_point_greater_or_equal(value, &self.start)
            && range_point_lesser_or_equal(value, &self.end)
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::EMPTY
    }
}

impl From<RangeRepr> for Range {
    fn from(repr: RangeRepr) -> Self {
        Range::new(repr.start, repr.end)
    }
}

impl From<Range> for RangeRepr {
    fn from(range: Range) -> Self {
        RangeRepr {
            start: range.start,
            end: range.end,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Range::EMPTY {
            f.write_str("Empty")
        } else if *self == Range::TOTAL {
            f.write_str("Total")
        } else {
            write!(f, "({} {})", self.start, self.end)
        }
    }
}

fn is_valid(point: &Point) -> bool {
    match point {
        Point::Timestamp(timestamp) => !timestamp.is_special() || timestamp.is_infinity(),
        Point::Sequence(_) => true,
    }
}

fn out_of_order(start: &Point, end: &Point) -> bool {
    match (start, end) {
        (Point::Sequence(start), Point::Sequence(end)) => start > end,
        (Point::Timestamp(start), Point::Timestamp(end)) => {
            start.partial_cmp(end) == Some(Ordering::Greater)
        }
        _ => false,
    }
}

fn normalize(point: Point) -> Point {
    match point {
        Point::Timestamp(Timestamp::NegInfinity) => Point::Sequence(Sequence::FIRST),
        Point::Timestamp(Timestamp::PosInfinity) => Point::Sequence(Sequence::LAST),
        other => other,
    }
}

/// Whether `value` comes at or after `point`.
pub fn range_point_greater_or_equal<T: Timestamped>(
    value: &SequencedValue<T>,
    point: &Point,
) -> bool {
    match point {
        Point::Sequence(sequence) => value.sequence >= *sequence,
        Point::Timestamp(timestamp) => value.timestamp() >= *timestamp,
    }
}

/// Whether `value` comes at or before `point`.
pub fn range_point_lesser_or_equal<T: Timestamped>(
    value: &SequencedValue<T>,
    point: &Point,
) -> bool {
    match point {
        Point::Sequence(sequence) => value.sequence <= *sequence,
        Point::Timestamp(timestamp) => value.timestamp() <= *timestamp,
    }
}
