//! Subscriptions sharded by index.

use super::registry::Subscriptions;
use crate::expression::{Bindable, Evaluator};
use crate::query::{QueryResult, Range};
use crate::types::{IndexedValue, QueryId, SequencedValue, Timestamped};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// One [`Subscriptions`] registry per index, created on demand.
///
/// Ids are only unique within an index, so every call names the index it
/// refers to.
pub struct IndexedSubscriptions<V, I, C> {
    shards: RwLock<HashMap<I, Arc<Subscriptions<V, C>>>>,
}

impl<V, I, C> IndexedSubscriptions<V, I, C>
where
    V: Clone + Bindable + Timestamped,
    I: Clone + Eq + Hash,
    C: Clone + Ord,
{
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
        }
    }

    fn shard(&self, index: &I) -> Arc<Subscriptions<V, C>> {
        if let Some(shard) = self.shards.read().get(index) {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write();
        Arc::clone(shards.entry(index.clone()).or_default())
    }

    fn existing_shard(&self, index: &I) -> Option<Arc<Subscriptions<V, C>>> {
        self.shards.read().get(index).cloned()
    }

    pub fn add(&self, index: &I, client: C, range: Range, filter: Evaluator) -> QueryId {
        self.shard(index).add(client, range, filter)
    }

    pub fn init(&self, index: &I, client: C, range: Range, filter: Evaluator) -> QueryId {
        self.shard(index).init(client, range, filter)
    }

    pub fn commit<F>(&self, index: &I, result: QueryResult<SequencedValue<V>>, f: F)
    where
        F: FnOnce(QueryResult<SequencedValue<V>>),
    {
        match self.existing_shard(index) {
            Some(shard) => shard.commit(result, f),
            None if !result.id.is_assigned() => f(result),
            None => {}
        }
    }

    pub fn end(&self, index: &I, id: QueryId) {
        if let Some(shard) = self.existing_shard(index) {
            shard.end(id);
        }
    }

    /// Removes `client`'s subscriptions from every index.
    pub fn remove_all(&self, client: &C) {
        let shards: Vec<_> = self.shards.read().values().cloned().collect();
        for shard in shards {
            shard.remove_all(client);
        }
    }

    /// Publishes an indexed value to the subscriptions of its index.
    pub fn publish<S>(&self, value: &SequencedValue<IndexedValue<V, I>>, sender: S)
    where
        S: FnOnce(&[C]),
    {
        self.publish_filtered(value, |_| true, sender);
    }

    pub fn publish_filtered<F, S>(
        &self,
        value: &SequencedValue<IndexedValue<V, I>>,
        client_filter: F,
        sender: S,
    ) where
        F: Fn(&C) -> bool,
        S: FnOnce(&[C]),
    {
        if let Some(shard) = self.existing_shard(value.index()) {
            let base = SequencedValue::new(value.value.value.clone(), value.sequence);
            shard.publish_filtered(&base, client_filter, sender);
        }
    }
}

impl<V, I, C> Default for IndexedSubscriptions<V, I, C>
where
    V: Clone + Bindable + Timestamped,
    I: Clone + Eq + Hash,
    C: Clone + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
