//! Query composition and results.

use super::filtered::FilteredQuery;
use super::range::Range;
use super::snapshot_limit::SnapshotLimit;
use crate::error::Result;
use crate::expression::{Evaluator, Expression};
use crate::types::QueryId;
use serde::{Deserialize, Serialize};

/// What a live query does when its delivery path breaks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptionPolicy {
    /// End the query with `QueryInterrupted`.
    #[default]
    BreakQuery,
    /// Resume at the present, skipping anything missed.
    IgnoreContinue,
    /// Resume from the last delivered value.
    RecoverData,
}

/// Which evaluated outputs an expression subscription delivers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// Every output.
    #[default]
    All,
    /// Only outputs that differ from the previous one.
    Change,
}

/// A query over one index: range, snapshot limit, interruption policy and
/// filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasicQuery<I> {
    index: I,
    range: Range,
    snapshot_limit: SnapshotLimit,
    interruption_policy: InterruptionPolicy,
    filter: FilteredQuery,
}

impl<I> BasicQuery<I> {
    /// An empty-range query with no snapshot that accepts every value.
    pub fn new(index: I) -> Self {
        Self {
            index,
            range: Range::EMPTY,
            snapshot_limit: SnapshotLimit::NONE,
            interruption_policy: InterruptionPolicy::default(),
            filter: FilteredQuery::default(),
        }
    }

    /// Live updates only.
    pub fn real_time(index: I) -> Self {
        Self::new(index).with_range(Range::REAL_TIME)
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    pub fn with_snapshot_limit(mut self, snapshot_limit: SnapshotLimit) -> Self {
        self.snapshot_limit = snapshot_limit;
        self
    }

    pub fn with_interruption_policy(mut self, policy: InterruptionPolicy) -> Self {
        self.interruption_policy = policy;
        self
    }

    pub fn with_filter(mut self, filter: Expression) -> Result<Self> {
        self.filter.set_filter(filter)?;
        Ok(self)
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn set_index(&mut self, index: I) {
        self.index = index;
    }

    pub fn range(&self) -> &Range {
        &self.range
    }

    pub fn set_range(&mut self, range: Range) {
        self.range = range;
    }

    pub fn snapshot_limit(&self) -> SnapshotLimit {
        self.snapshot_limit
    }

    pub fn set_snapshot_limit(&mut self, snapshot_limit: SnapshotLimit) {
        self.snapshot_limit = snapshot_limit;
    }

    pub fn interruption_policy(&self) -> InterruptionPolicy {
        self.interruption_policy
    }

    pub fn set_interruption_policy(&mut self, policy: InterruptionPolicy) {
        self.interruption_policy = policy;
    }

    pub fn filter(&self) -> &Expression {
        self.filter.filter()
    }

    /// Fails with `TypeCompatibility` unless `filter` is boolean, keeping the
    /// previous filter.
    pub fn set_filter(&mut self, filter: Expression) -> Result<()> {
        self.filter.set_filter(filter)
    }

    pub fn filtered(&self) -> &FilteredQuery {
        &self.filter
    }

    /// Compiles the filter.
    pub fn filter_evaluator(&self) -> Result<Evaluator> {
        self.filter.evaluator()
    }
}

/// Outcome of submitting a query: the id it was registered under for live
/// updates (or `QueryId::UNASSIGNED`) and its historical snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult<T> {
    pub id: QueryId,
    pub snapshot: Vec<T>,
}

impl<T> QueryResult<T> {
    pub fn new(id: QueryId, snapshot: Vec<T>) -> Self {
        Self { id, snapshot }
    }
}

impl<T> Default for QueryResult<T> {
    fn default() -> Self {
        Self {
            id: QueryId::UNASSIGNED,
            snapshot: Vec::new(),
        }
    }
}
