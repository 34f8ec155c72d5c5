//! Expression subscriptions sharded by index.

use super::expression::ExpressionSubscriptions;
use crate::error::{QueryError, Result};
use crate::expression::{Bindable, Evaluator, FromValue};
use crate::query::{QueryResult, Range, SnapshotLimit, UpdatePolicy};
use crate::types::{IndexedValue, QueryId, SequencedValue, Timestamped};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

/// One [`ExpressionSubscriptions`] registry per index.
///
/// Remembers which index each `(client, id)` was registered under, so a
/// query can be ended by id alone.
pub struct IndexedExpressionSubscriptions<In, Out, I, C> {
    shards: RwLock<HashMap<I, Arc<ExpressionSubscriptions<In, Out, C>>>>,
    indexes: RwLock<BTreeMap<C, HashMap<QueryId, I>>>,
}

impl<In, Out, I, C> IndexedExpressionSubscriptions<In, Out, I, C>
where
    In: Clone + Bindable + Timestamped,
    Out: FromValue + Clone + PartialEq,
    I: Clone + Eq + Hash,
    C: Clone + Ord,
{
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            indexes: RwLock::new(BTreeMap::new()),
        }
    }

    fn shard(&self, index: &I) -> Arc<ExpressionSubscriptions<In, Out, C>> {
        if let Some(shard) = self.shards.read().get(index) {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write();
        Arc::clone(shards.entry(index.clone()).or_default())
    }

    fn existing_shard(&self, index: &I) -> Option<Arc<ExpressionSubscriptions<In, Out, C>>> {
        self.shards.read().get(index).cloned()
    }

    /// Registers a query under `index`. Fails with `DuplicateQuery` if
    /// `client` already has a query `id` on any index.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &self,
        index: I,
        client: C,
        id: QueryId,
        range: Range,
        filter: Evaluator,
        update_policy: UpdatePolicy,
        expression: Evaluator,
    ) -> Result<()> {
        // The mapping and the shard entry change under the same `indexes` lock.
        let mut indexes = self.indexes.write();
        if indexes.get(&client).map_or(false, |ids| ids.contains_key(&id)) {
            return Err(QueryError::DuplicateQuery(id));
        }
        self.shard(&index)
            .init(client.clone(), id, range, filter, update_policy, expression)?;
        indexes.entry(client).or_default().insert(id, index);
        Ok(())
    }

    pub fn commit<F>(
        &self,
        index: &I,
        client: &C,
        snapshot_limit: SnapshotLimit,
        result: QueryResult<SequencedValue<Out>>,
        snapshot: Vec<SequencedValue<In>>,
        f: F,
    ) where
        F: FnOnce(QueryResult<SequencedValue<Out>>),
    {
        if let Some(shard) = self.existing_shard(index) {
            shard.commit(client, snapshot_limit, result, snapshot, f);
        }
    }

    /// Ends a query wherever it was registered. Unknown queries are ignored.
    pub fn end(&self, client: &C, id: QueryId) {
        let mut indexes = self.indexes.write();
        let Some(ids) = indexes.get_mut(client) else {
            return;
        };
        let Some(index) = ids.remove(&id) else {
            return;
        };
        if ids.is_empty() {
            indexes.remove(client);
        }
        if let Some(shard) = self.existing_shard(&index) {
            shard.end(client, id);
        }
    }

    /// Removes every query belonging to `client` on every index.
    pub fn remove_all(&self, client: &C) {
        let mut indexes = self.indexes.write();
        indexes.remove(client);
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        for shard in shards {
            shard.remove_all(client);
        }
    }

    /// Publishes an indexed input to the queries on its index.
    pub fn publish<S>(&self, value: &SequencedValue<IndexedValue<In, I>>, sender: S)
    where
        S: FnMut(&C, QueryId, SequencedValue<Out>),
    {
        if let Some(shard) = self.existing_shard(value.index()) {
            let base = SequencedValue::new(value.value.value.clone(), value.sequence);
            shard.publish(&base, sender);
        }
    }

    /// Number of registered queries across every index.
    pub fn subscription_count(&self) -> usize {
        self.shards.read().values().map(|shard| shard.subscription_count()).sum()
    }
}

impl<In, Out, I, C> Default for IndexedExpressionSubscriptions<In, Out, I, C>
where
    In: Clone + Bindable + Timestamped,
    Out: FromValue + Clone + PartialEq,
    I: Clone + Eq + Hash,
    C: Clone + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
