//! # Sequenced Queries
//!
//! Snapshot-plus-live queries over ordered, indexed streams of values.
//!
//! ## Core Concepts
//!
//! - **Sequences**: Every stored value carries a monotonically increasing
//!   sequence, optionally encoding the day it was recorded
//! - **Queries**: A range, a snapshot limit, a filter expression and an
//!   interruption policy
//! - **Stores**: Per-index ordered collections answering historical queries
//! - **Subscriptions**: Two-phase registries that stitch a historical snapshot
//!   to live publication without gaps or duplicates
//! - **Publishers**: Client-side adapters that deduplicate, buffer during
//!   snapshot loads and recover after interruption
//!
//! ## Example
//!
//! ```ignore
//! use seqquery::{BasicQuery, DataStore, LocalDataStore, QueryResult, Range, Subscriptions};
//!
//! let store = LocalDataStore::new();
//! let subscriptions = Subscriptions::new();
//!
//! let query = BasicQuery::new("hello").with_range(Range::TOTAL);
//! let id = subscriptions.init(client, *query.range(), query.filter_evaluator()?);
//! let snapshot = store.load(&query)?;
//! subscriptions.commit(QueryResult::new(id, snapshot), |result| {
//!     send_result(client, result);
//! });
//! ```

pub mod codec;
pub mod error;
pub mod expression;
pub mod publisher;
pub mod query;
pub mod sequencer;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{QueryError, Result};
pub use expression::{translate, Bindable, DataType, EvalError, Evaluator, Expression, Value};
pub use publisher::{channel_sink, ChannelSink, SequencedValuePublisher, Sink, SinkConfig, SinkReceiver};
pub use query::{
    BasicQuery, FilteredQuery, InterruptionPolicy, Point, QueryResult, Range, SnapshotLimit,
    SnapshotLimitType, UpdatePolicy,
};
pub use sequencer::Sequencer;
pub use store::{DataStore, LocalDataStore, LocalDataStoreEntry};
pub use subscriptions::{
    ExpressionSubscriptions, IndexedExpressionSubscriptions, IndexedSubscriptions, Subscriptions,
};
pub use types::*;
