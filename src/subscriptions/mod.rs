//! Registries of live queries.
//!
//! Every registry follows the same two-phase protocol so that a snapshot
//! loaded concurrently with live publication loses nothing and repeats
//! nothing:
//! - `init` registers the query as *initializing*. Matching values published
//!   from then on are buffered in the entry's write log.
//! - The caller loads the historical snapshot from a store.
//! - `commit` appends the buffered values that come after the snapshot's last
//!   sequence, marks the entry *committed* and hands the reconciled result to
//!   the caller. Later matches are delivered directly.
//!
//! Entries are locked individually, so publishing to one subscription never
//! waits on another. Delivery callbacks run after the registry's own locks are
//! released.
//!
//! # Example
//!
//! ```ignore
//! let subscriptions = Subscriptions::new();
//! let id = subscriptions.init(client, Range::TOTAL, filter);
//! let snapshot = store.load(&query)?;
//! subscriptions.commit(QueryResult::new(id, snapshot), |result| {
//!     send_result(client, result);
//! });
//!
//! subscriptions.publish(&value, |clients| {
//!     for client in clients {
//!         send_value(client, &value);
//!     }
//! });
//! ```

mod expression;
mod indexed;
mod indexed_expression;
mod registry;

pub use expression::ExpressionSubscriptions;
pub use indexed::IndexedSubscriptions;
pub use indexed_expression::IndexedExpressionSubscriptions;
pub use registry::Subscriptions;

use crate::expression::{test_filter, Bindable, Evaluator};
use crate::query::{range_point_greater_or_equal, range_point_lesser_or_equal, Point, Range};
use crate::types::{Sequence, SequencedValue, Timestamped};

/// Lifecycle of a registered query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SubscriptionState {
    Initializing,
    Committed,
}

/// Whether a published value belongs to a subscription. A subscription
/// starting at `PRESENT` accepts any sequence.
pub(crate) fn accepts<V: Bindable + Timestamped>(
    range: &Range,
    filter: &mut Evaluator,
    value: &SequencedValue<V>,
) -> bool {
    (range.start() == Point::Sequence(Sequence::PRESENT)
        || range_point_greater_or_equal(value, &range.start()))
        && range_point_lesser_or_equal(value, &range.end())
        && test_filter(filter, value)
}

/// Appends the write log to the snapshot, keeping only values after the
/// snapshot's last sequence.
pub(crate) fn reconcile<T>(snapshot: &mut Vec<SequencedValue<T>>, write_log: Vec<SequencedValue<T>>) {
    match snapshot.last().map(|last| last.sequence) {
        None => *snapshot = write_log,
        Some(last) => snapshot.extend(write_log.into_iter().filter(|v| v.sequence > last)),
    }
}
