//! Keyed, indexed storage of intermediate optimization results.
//!
//! Multi-stage optimization (layer-wise pretraining of a deep network)
//! parks each stage's outcome here under a per-stage key, to be consumed by
//! later stages or a final assembly step.

use std::collections::HashMap;

use crate::error::{Result, TrainError};

/// Position within a key's sequence of records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The most recent record (or the first free slot when writing to an
    /// empty sequence).
    Last,
    /// A specific index; writing at the next contiguous index appends.
    At(usize),
}

/// Append-or-overwrite store of opaque per-stage records.
#[derive(Clone, Debug)]
pub struct CheckpointStore<R> {
    records: HashMap<String, Vec<R>>,
}

impl<R> Default for CheckpointStore<R> {
    fn default() -> Self {
        Self { records: HashMap::new() }
    }
}

impl<R: Clone + Default> CheckpointStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record.
    ///
    /// With `append` the record is always pushed. Otherwise `Slot::Last`
    /// overwrites the latest record (or seeds an empty sequence), and
    /// `Slot::At(i)` appends when `i` is exactly the next free slot,
    /// overwrites when `i` already exists, and fails when it would leave a
    /// gap.
    pub fn write(&mut self, key: &str, slot: Slot, append: bool, record: R) -> Result<()> {
        let queue = self.records.entry(key.to_string()).or_default();

        if append {
            queue.push(record);
            return Ok(());
        }

        match slot {
            Slot::Last => {
                if let Some(last) = queue.last_mut() {
                    *last = record;
                } else {
                    queue.push(record);
                }
            }
            Slot::At(index) => {
                if index == queue.len() {
                    queue.push(record);
                } else if let Some(existing) = queue.get_mut(index) {
                    *existing = record;
                } else {
                    return Err(TrainError::CheckpointIndex {
                        key: key.to_string(),
                        index,
                        len: queue.len(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Read a record; an empty record when the sequence is shorter than
    /// required.
    pub fn read(&self, key: &str, slot: Slot) -> R {
        let Some(queue) = self.records.get(key) else {
            return R::default();
        };

        let record = match slot {
            Slot::Last => queue.last(),
            Slot::At(index) => queue.get(index),
        };

        record.cloned().unwrap_or_default()
    }

    /// Number of records stored under `key`.
    pub fn len(&self, key: &str) -> usize {
        self.records.get(key).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
