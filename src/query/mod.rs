//! Query shape: what range to cover, how much history to return, how to
//! react to interruptions and which values to keep.

mod basic;
mod filtered;
mod range;
mod snapshot_limit;

pub use basic::{BasicQuery, InterruptionPolicy, QueryResult, UpdatePolicy};
pub use filtered::FilteredQuery;
pub use range::{range_point_greater_or_equal, range_point_lesser_or_equal, Point, Range};
pub use snapshot_limit::{SnapshotLimit, SnapshotLimitType};
