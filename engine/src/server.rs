//! The authoritative server node.
//!
//! The server answers pull requests from a snapshot of its records and
//! applies push batches as the final word on a record's state. It never runs a
//! conflict policy: a push matched by global id overwrites, a push that only
//! matches on primary key is an identity collision and is refused.

use crate::{
    clock::{SystemClock, WallClock},
    error::Result,
    store::{RecordMatch, RecordStore},
    Counter, PullRequest, PullResponse, PushRequest, PushResponse, Record, RecordDto, SyncStatus,
};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

/// The single authoritative node.
#[derive(Debug)]
pub struct Server {
    name: String,
    store: RecordStore,
    clock: Arc<dyn WallClock>,
}

impl Server {
    /// Create a server using the system clock.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, Arc::new(SystemClock))
    }

    /// Create a server with an injected clock.
    pub fn with_clock(name: impl Into<String>, clock: Arc<dyn WallClock>) -> Self {
        Self {
            name: name.into(),
            store: RecordStore::new(),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current server counter.
    pub fn counter(&self) -> Counter {
        self.store.counter()
    }

    /// Get a record by primary key.
    pub fn get(&self, primary_key: &str) -> Option<&Record> {
        self.store.get(primary_key)
    }

    /// Get a record by global id.
    pub fn get_by_global_id(&self, global_id: &str) -> Option<&Record> {
        self.store.get_by_global_id(global_id)
    }

    /// All records, tombstones included, in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.store.records()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Create a record directly on the server.
    pub fn create(
        &mut self,
        primary_key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.create(primary_key, name, value, now)?;
        tracing::debug!(
            node = %self.name,
            pk = %record.primary_key,
            version = record.change_version,
            "created record"
        );
        Ok(record)
    }

    /// Update a record directly on the server.
    pub fn update(&mut self, primary_key: &str, value: impl Into<String>) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.update(primary_key, value, now)?;
        tracing::debug!(node = %self.name, pk = primary_key, version = record.change_version, "updated record");
        Ok(record)
    }

    /// Delete (tombstone) a record directly on the server.
    pub fn delete(&mut self, primary_key: &str) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.delete(primary_key, now)?;
        tracing::debug!(node = %self.name, pk = primary_key, version = record.change_version, "deleted record");
        Ok(record)
    }

    /// Serve every record changed after the client's cursor.
    pub fn handle_pull(&self, request: &PullRequest) -> PullResponse {
        let records: Vec<RecordDto> = self
            .store
            .changed_since(request.since)
            .map(RecordDto::from)
            .collect();

        tracing::debug!(
            node = %self.name,
            since = request.since,
            count = records.len(),
            server_counter = self.counter(),
            "serving pull"
        );

        PullResponse {
            status: SyncStatus::Ok,
            server_counter: self.counter(),
            records,
        }
    }

    /// Apply a batch of client records.
    ///
    /// Every candidate that can be applied is applied, even if another
    /// candidate in the same batch collides.
    pub fn handle_push(&mut self, request: &PushRequest) -> PushResponse {
        let mut status = SyncStatus::Ok;

        for candidate in &request.records {
            match self
                .store
                .locate(&candidate.global_id, &candidate.primary_key)
            {
                Some(RecordMatch::GlobalId(slot)) => {
                    self.store.record_mut(slot).apply_remote(candidate);
                    let version = self.store.stamp(slot);
                    tracing::debug!(
                        node = %self.name,
                        pk = %candidate.primary_key,
                        version,
                        deleted = candidate.deleted,
                        "applied pushed record"
                    );
                }
                Some(RecordMatch::PrimaryKey(slot)) => {
                    tracing::warn!(
                        node = %self.name,
                        pk = %candidate.primary_key,
                        pushed_global_id = %candidate.global_id,
                        server_global_id = %self.store.record(slot).global_id,
                        "identity collision: primary key already bound to another global id"
                    );
                    status = SyncStatus::Conflict;
                }
                None => {
                    let version = self.store.tick();
                    self.store.insert(Record::from_remote(candidate, version));
                    tracing::debug!(
                        node = %self.name,
                        pk = %candidate.primary_key,
                        version,
                        "inserted pushed record"
                    );
                }
            }
        }

        tracing::info!(
            node = %self.name,
            received = request.records.len(),
            status = %status,
            server_counter = self.counter(),
            "push processed"
        );

        PushResponse {
            status,
            server_counter: self.counter(),
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "server {} counter={}", self.name, self.counter())?;
        if self.store.is_empty() {
            writeln!(f, "  (no records)")?;
        }
        for record in self.store.records() {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}

/// A server shared by many clients.
///
/// Every pull and push runs under one exclusive lock, so counter increments
/// are never lost and a pull never observes a half-applied push.
#[derive(Debug, Clone)]
pub struct SharedServer {
    inner: Arc<Mutex<Server>>,
}

impl SharedServer {
    pub fn new(server: Server) -> Self {
        Self {
            inner: Arc::new(Mutex::new(server)),
        }
    }

    /// Lock the server for direct inspection or local mutation.
    pub fn lock(&self) -> MutexGuard<'_, Server> {
        self.inner.lock()
    }
}

impl From<Server> for SharedServer {
    fn from(server: Server) -> Self {
        Self::new(server)
    }
}
