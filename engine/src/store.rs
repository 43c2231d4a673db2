//! Store - the per-node record container and change counter.
//!
//! Both the server and every client keep their records in a [`RecordStore`].
//! The store owns the node's monotonic counter and keeps two indexes (by
//! global id and by primary key) consistent with an insertion-ordered list of
//! records.

use crate::{error::Result, Counter, Error, GlobalId, PrimaryKey, Record, Timestamp};
use std::collections::HashMap;

/// How an incoming record matched a local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RecordMatch {
    /// Same global id: the same entity.
    GlobalId(usize),
    /// Different global id, same primary key: an identity collision.
    PrimaryKey(usize),
}

/// Records of one node, indexed by global id and by primary key.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    /// Monotonic change counter of the owning node
    counter: Counter,
    /// Records in insertion order
    records: Vec<Record>,
    by_global_id: HashMap<GlobalId, usize>,
    by_primary_key: HashMap<PrimaryKey, usize>,
}

impl RecordStore {
    /// Create an empty store with its counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value.
    pub fn counter(&self) -> Counter {
        self.counter
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by primary key (tombstones included).
    pub fn get(&self, primary_key: &str) -> Option<&Record> {
        self.by_primary_key
            .get(primary_key)
            .map(|&slot| &self.records[slot])
    }

    /// Get a record by global id (tombstones included).
    pub fn get_by_global_id(&self, global_id: &str) -> Option<&Record> {
        self.by_global_id
            .get(global_id)
            .map(|&slot| &self.records[slot])
    }

    /// All records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Records whose change version is strictly after `since`, in insertion order.
    pub fn changed_since(&self, since: Counter) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |r| r.change_version > since)
    }

    /// Create a record as a local mutation.
    pub fn create(
        &mut self,
        primary_key: impl Into<PrimaryKey>,
        name: impl Into<String>,
        value: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<&Record> {
        let primary_key = primary_key.into();
        if self.by_primary_key.contains_key(&primary_key) {
            return Err(Error::DuplicateIdentity(primary_key));
        }

        let version = self.tick();
        let slot = self.insert(Record::new(primary_key, name, value, timestamp, version));
        Ok(&self.records[slot])
    }

    /// Update a record's value as a local mutation.
    ///
    /// Tombstoned records may still be updated; the tombstone is kept.
    pub fn update(
        &mut self,
        primary_key: &str,
        value: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<&Record> {
        let slot = self.slot_of(primary_key)?;
        let version = self.tick();
        self.records[slot].update_value(value, timestamp, version);
        Ok(&self.records[slot])
    }

    /// Delete (tombstone) a record as a local mutation.
    pub fn delete(&mut self, primary_key: &str, timestamp: Timestamp) -> Result<&Record> {
        let slot = self.slot_of(primary_key)?;
        let version = self.tick();
        self.records[slot].mark_deleted(timestamp, version);
        Ok(&self.records[slot])
    }

    /// Find the local counterpart of a peer record: global id first, then
    /// primary key.
    pub(crate) fn locate(&self, global_id: &str, primary_key: &str) -> Option<RecordMatch> {
        if let Some(&slot) = self.by_global_id.get(global_id) {
            return Some(RecordMatch::GlobalId(slot));
        }
        self.by_primary_key
            .get(primary_key)
            .map(|&slot| RecordMatch::PrimaryKey(slot))
    }

    pub(crate) fn record(&self, slot: usize) -> &Record {
        &self.records[slot]
    }

    pub(crate) fn record_mut(&mut self, slot: usize) -> &mut Record {
        &mut self.records[slot]
    }

    /// Append a record whose primary key and global id are not yet present.
    pub(crate) fn insert(&mut self, record: Record) -> usize {
        let slot = self.records.len();
        self.by_global_id.insert(record.global_id.clone(), slot);
        self.by_primary_key.insert(record.primary_key.clone(), slot);
        self.records.push(record);
        slot
    }

    /// Re-key a record under a peer's global id.
    pub(crate) fn adopt_global_id(&mut self, slot: usize, global_id: GlobalId) {
        let record = &mut self.records[slot];
        if record.global_id == global_id {
            return;
        }
        self.by_global_id.remove(&record.global_id);
        self.by_global_id.insert(global_id.clone(), slot);
        record.global_id = global_id;
    }

    /// Increment the counter and stamp the record with the new value.
    pub(crate) fn stamp(&mut self, slot: usize) -> Counter {
        let version = self.tick();
        self.records[slot].change_version = version;
        version
    }

    /// Increment the counter and return the new value.
    pub(crate) fn tick(&mut self) -> Counter {
        self.counter += 1;
        self.counter
    }

    fn slot_of(&self, primary_key: &str) -> Result<usize> {
        self.by_primary_key
            .get(primary_key)
            .copied()
            .ok_or_else(|| Error::RecordNotFound(primary_key.to_string()))
    }
}
