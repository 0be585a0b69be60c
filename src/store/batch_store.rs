// In: src/store/batch_store.rs

use arrow::record_batch::RecordBatch;
use hashbrown::HashMap;

use crate::error::{BridgeError, Result};
use crate::store::key::ChannelKey;

/// Keyed cache holding the most recently staged batch per channel.
///
/// Writes are whole-batch replacements; nothing is merged or appended. The
/// single-session contract means there is at most one writer, so no locking
/// happens here.
#[derive(Debug, Default)]
pub struct BatchStore {
    flights: HashMap<ChannelKey, RecordBatch>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional upsert.
    pub fn put(&mut self, key: ChannelKey, batch: RecordBatch) {
        log::debug!("staging {} rows under {}", batch.num_rows(), key);
        self.flights.insert(key, batch);
    }

    /// Returns the staged batch. `RecordBatch` clones share their buffers.
    pub fn get(&self, key: &ChannelKey) -> Result<RecordBatch> {
        self.flights
            .get(key)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound {
                key: key.to_string(),
            })
    }

    /// Deletes the entry if present, handing back what was removed.
    pub fn remove(&mut self, key: &ChannelKey) -> Option<RecordBatch> {
        log::debug!("removing flight {}", key);
        self.flights.remove(key)
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.flights.contains_key(key)
    }

    /// Introspection only; iteration order is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &ChannelKey> {
        self.flights.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &RecordBatch)> {
        self.flights.iter()
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}
