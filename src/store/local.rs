//! In-memory data store sharded by index.

use super::entry::LocalDataStoreEntry;
use super::DataStore;
use crate::error::Result;
use crate::expression::Bindable;
use crate::query::BasicQuery;
use crate::types::{IndexedValue, SequencedValue, Timestamped};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Keeps every stored value in memory, one [`LocalDataStoreEntry`] per
/// index. Entries are created on first store.
pub struct LocalDataStore<I, V> {
    entries: RwLock<HashMap<I, LocalDataStoreEntry<V>>>,
}

impl<I: Eq + Hash + Clone, V: Clone> LocalDataStore<I, V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Every stored value across all indices, tagged with its index.
    pub fn load_all(&self) -> Vec<SequencedValue<IndexedValue<V, I>>> {
        let entries = self.entries.read();
        let mut values = Vec::new();
        for (index, entry) in entries.iter() {
            values.extend(entry.load_all().into_iter().map(|value| {
                let sequence = value.sequence;
                SequencedValue::new(IndexedValue::new(value.value, index.clone()), sequence)
            }));
        }
        values
    }

    /// Number of indices with at least one stored value.
    pub fn index_count(&self) -> usize {
        self.entries.read().len()
    }

    fn store_value(&self, value: SequencedValue<IndexedValue<V, I>>) {
        let (index, value) = value.into_base();
        trace!(sequence = ?value.sequence, "storing value");
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.get(&index) {
                entry.store(value);
                return;
            }
        }
        self.entries.write().entry(index).or_default().store(value);
    }
}

impl<I: Eq + Hash + Clone, V: Clone> Default for LocalDataStore<I, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, V> DataStore<I, V> for LocalDataStore<I, V>
where
    I: Eq + Hash + Clone,
    V: Clone + Bindable + Timestamped,
{
    fn load(&self, query: &BasicQuery<I>) -> Result<Vec<SequencedValue<V>>> {
        match self.entries.read().get(query.index()) {
            Some(entry) => entry.load(query),
            None => Ok(Vec::new()),
        }
    }

    fn store(&self, value: SequencedValue<IndexedValue<V, I>>) -> Result<()> {
        self.store_value(value);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
