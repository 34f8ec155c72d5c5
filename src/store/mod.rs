//! Data stores answering queries with historical values.
//!
//! [`DataStore`] is the contract every backend implements; this crate ships
//! the in-memory [`LocalDataStore`]. Persistent and cached backends live
//! elsewhere and implement the same trait.

mod entry;
mod local;

pub use entry::LocalDataStoreEntry;
pub use local::LocalDataStore;

use crate::error::Result;
use crate::query::BasicQuery;
use crate::types::{IndexedValue, SequencedValue};

/// Loads and stores sequenced values by index.
pub trait DataStore<I, V> {
    /// Values matching `query`, in sequence order.
    fn load(&self, query: &BasicQuery<I>) -> Result<Vec<SequencedValue<V>>>;

    fn store(&self, value: SequencedValue<IndexedValue<V, I>>) -> Result<()>;

    fn store_all(&self, values: Vec<SequencedValue<IndexedValue<V, I>>>) -> Result<()> {
        for value in values {
            self.store(value)?;
        }
        Ok(())
    }

    /// Releases the store's resources.
    fn close(&self) -> Result<()>;
}
