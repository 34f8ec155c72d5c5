//! Ordered values of a single index.

use crate::error::Result;
use crate::expression::{test_filter, Bindable};
use crate::query::{BasicQuery, Point, SnapshotLimitType};
use crate::types::{Sequence, SequencedValue, Timestamped};
use parking_lot::RwLock;

/// Values of one index, kept sorted by sequence.
pub struct LocalDataStoreEntry<V> {
    values: RwLock<Vec<SequencedValue<V>>>,
}

impl<V> LocalDataStoreEntry<V> {
    pub fn new() -> Self {
        Self {
            values: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }

    /// Stores a value. A value whose sequence is already present replaces
    /// the stored one.
    pub fn store(&self, value: SequencedValue<V>) {
        let mut values = self.values.write();
        let appends = values
            .last()
            .map_or(true, |last| value.sequence > last.sequence);
        if appends {
            values.push(value);
            return;
        }
        match values.binary_search_by(|v| v.sequence.cmp(&value.sequence)) {
            Ok(position) => values[position] = value,
            Err(position) => values.insert(position, value),
        }
    }

    pub fn store_all(&self, values: impl IntoIterator<Item = SequencedValue<V>>) {
        for value in values {
            self.store(value);
        }
    }
}

impl<V: Clone> LocalDataStoreEntry<V> {
    /// Every stored value in sequence order.
    pub fn load_all(&self) -> Vec<SequencedValue<V>> {
        self.values.read().clone()
    }
}

impl<V: Clone + Bindable + Timestamped> LocalDataStoreEntry<V> {
    /// Values matching the query's range and filter, bounded by its snapshot
    /// limit and returned in sequence order.
    pub fn load<I>(&self, query: &BasicQuery<I>) -> Result<Vec<SequencedValue<V>>> {
        let limit = query.snapshot_limit();
        let start = query.range().start();
        if limit.is_empty()
            || start == Point::Sequence(Sequence::PRESENT)
            || start == Point::Sequence(Sequence::LAST)
        {
            return Ok(Vec::new());
        }
        let mut filter = query.filter_evaluator()?;
        let range = query.range();
        let values = self.values.read();
        let mut matches = Vec::new();
        let mut accept = |value: &SequencedValue<V>| {
            if range.contains(value) && test_filter(&mut filter, value) {
                matches.push(value.clone());
            }
            matches.len() >= limit.len()
        };
        match limit.limit_type() {
            SnapshotLimitType::Tail => {
                for value in values.iter().rev() {
                    if accept(value) {
                        break;
                    }
                }
                matches.reverse();
            }
            SnapshotLimitType::Head => {
                for value in values.iter() {
                    if accept(value) {
                        break;
                    }
                }
            }
        }
        Ok(matches)
    }
}

impl<V> Default for LocalDataStoreEntry<V> {
    fn default() -> Self {
        Self::new()
    }
}
