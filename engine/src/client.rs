//! The client node: a local cache kept in sync with the server.
//!
//! # Sync cycle
//!
//! 1. **Pull** every server record changed after `last_pulled_server_counter`
//!    and reconcile it against local state:
//!    - match by global id, else by primary key (adopting the server's global
//!      id on a primary-key match);
//!    - a clean local record takes the server copy;
//!    - a dirty local record goes through the [`ConflictPolicy`];
//!    - an unknown record is inserted, stamped with the current counter.
//! 2. **Push** every record changed after `last_pushed_counter`.
//!
//! Pull always runs before push. Merging never ticks the client counter, so a
//! merged record is never pushed back as a local change.

use crate::{
    clock::{SystemClock, WallClock},
    error::Result,
    store::{RecordMatch, RecordStore},
    Conflict, ConflictPolicy, ConflictResolution, Counter, PullRequest, PushRequest, Record,
    RecordDto, SyncCursors, SyncStatus, SyncTransport,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Construction parameters for a [`Client`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Display name of the node
    pub name: String,
    /// Policy applied to dirty records during a pull
    #[serde(default)]
    pub policy: ConflictPolicy,
}

impl ClientConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: ConflictPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// What a pull did to local state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullReport {
    pub status: SyncStatus,
    pub server_counter: Counter,
    /// Records returned by the server
    pub received: usize,
    /// Unknown records inserted locally
    pub inserted: usize,
    /// Records whose value/tombstone was taken from the server
    pub applied: usize,
    /// Local records re-keyed under the server's global id
    pub adopted: usize,
    /// Dirty records that went through the conflict policy
    pub conflicts: Vec<Conflict>,
}

/// What a push sent and how the server answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub status: SyncStatus,
    pub server_counter: Counter,
    /// Records sent to the server
    pub sent: usize,
}

/// Result of a full pull-then-push cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub pull: PullReport,
    pub push: PushReport,
}

impl SyncReport {
    /// Whether both halves succeeded.
    pub fn is_ok(&self) -> bool {
        self.pull.status.is_ok() && self.push.status.is_ok()
    }

    pub fn status(&self) -> SyncStatus {
        if self.is_ok() {
            SyncStatus::Ok
        } else {
            SyncStatus::Conflict
        }
    }
}

/// A client node talking to the server through a transport.
#[derive(Debug)]
pub struct Client<T> {
    config: ClientConfig,
    store: RecordStore,
    cursors: SyncCursors,
    transport: T,
    clock: Arc<dyn WallClock>,
}

impl<T: SyncTransport> Client<T> {
    /// Create a client using the system clock.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_clock(config, transport, Arc::new(SystemClock))
    }

    /// Create a client with an injected clock.
    pub fn with_clock(config: ClientConfig, transport: T, clock: Arc<dyn WallClock>) -> Self {
        Self {
            config,
            store: RecordStore::new(),
            cursors: SyncCursors::default(),
            transport,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.config.policy
    }

    /// Current local counter.
    pub fn counter(&self) -> Counter {
        self.store.counter()
    }

    pub fn cursors(&self) -> SyncCursors {
        self.cursors
    }

    pub fn last_pushed_counter(&self) -> Counter {
        self.cursors.last_pushed_counter
    }

    pub fn last_pulled_server_counter(&self) -> Counter {
        self.cursors.last_pulled_server_counter
    }

    pub fn transport(&self) -> &T {
        &self.transport
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

    /// Records that the next push would send.
    pub fn dirty_records(&self) -> impl Iterator<Item = &Record> {
        self.store.changed_since(self.cursors.last_pushed_counter)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Create a record locally.
    pub fn create(
        &mut self,
        primary_key: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.create(primary_key, name, value, now)?;
        tracing::debug!(
            node = %self.config.name,
            pk = %record.primary_key,
            version = record.change_version,
            "created record"
        );
        Ok(record)
    }

    /// Update a record's value locally.
    pub fn update(&mut self, primary_key: &str, value: impl Into<String>) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.update(primary_key, value, now)?;
        tracing::debug!(node = %self.config.name, pk = primary_key, version = record.change_version, "updated record");
        Ok(record)
    }

    /// Delete (tombstone) a record locally.
    pub fn delete(&mut self, primary_key: &str) -> Result<&Record> {
        let now = self.clock.now();
        let record = self.store.delete(primary_key, now)?;
        tracing::debug!(node = %self.config.name, pk = primary_key, version = record.change_version, "deleted record");
        Ok(record)
    }

    /// Fetch server changes since the last pull and merge them locally.
    ///
    /// A transport error leaves local state and cursors untouched.
    pub fn pull(&mut self) -> Result<PullReport> {
        let request = PullRequest {
            since: self.cursors.last_pulled_server_counter,
        };
        let response = self.transport.pull(&request)?;

        let mut report = PullReport {
            status: response.status,
            server_counter: response.server_counter,
            received: response.records.len(),
            ..PullReport::default()
        };

        for remote in &response.records {
            self.merge_remote(remote, &mut report);
        }

        if response.status.is_ok() {
            self.cursors.advance_pulled(response.server_counter);
        }

        tracing::info!(
            node = %self.config.name,
            since = request.since,
            received = report.received,
            inserted = report.inserted,
            applied = report.applied,
            adopted = report.adopted,
            conflicts = report.conflicts.len(),
            status = %report.status,
            "pull complete"
        );

        Ok(report)
    }

    /// Send every record changed since the last successful push.
    ///
    /// On [`SyncStatus::Conflict`] the cursors stay where they are, so the same
    /// records are sent again on the next push.
    pub fn push(&mut self) -> Result<PushReport> {
        let records: Vec<RecordDto> = self.dirty_records().map(RecordDto::from).collect();
        let sent = records.len();
        let response = self.transport.push(&PushRequest { records })?;

        if response.status.is_ok() {
            let absorbed = self.cursors.acknowledge_push(
                self.store.counter(),
                sent as Counter,
                response.server_counter,
            );
            if !absorbed {
                tracing::debug!(
                    node = %self.config.name,
                    server_counter = response.server_counter,
                    last_pulled = self.cursors.last_pulled_server_counter,
                    "server moved on during push; keeping pull cursor"
                );
            }
        } else {
            tracing::warn!(
                node = %self.config.name,
                sent,
                "push refused with identity collision; cursors unchanged"
            );
        }

        tracing::info!(
            node = %self.config.name,
            sent,
            status = %response.status,
            server_counter = response.server_counter,
            "push complete"
        );

        Ok(PushReport {
            status: response.status,
            server_counter: response.server_counter,
            sent,
        })
    }

    /// Pull, then push.
    pub fn sync(&mut self) -> Result<SyncReport> {
        let pull = self.pull()?;
        let push = self.push()?;
        Ok(SyncReport { pull, push })
    }

    /// Forget both cursors and sync, re-exchanging every record in both
    /// directions.
    ///
    /// With both cursors at zero every local record counts as dirty, so each
    /// server record the client also holds goes through the conflict policy.
    pub fn full_sync(&mut self) -> Result<SyncReport> {
        tracing::info!(node = %self.config.name, "starting full sync");
        self.cursors.reset();
        self.sync()
    }

    fn merge_remote(&mut self, remote: &RecordDto, report: &mut PullReport) {
        let slot = match self.store.locate(&remote.global_id, &remote.primary_key) {
            Some(RecordMatch::GlobalId(slot)) => slot,
            Some(RecordMatch::PrimaryKey(slot)) => {
                tracing::debug!(
                    node = %self.config.name,
                    pk = %remote.primary_key,
                    local_global_id = %self.store.record(slot).global_id,
                    server_global_id = %remote.global_id,
                    "adopting server identity"
                );
                self.store.adopt_global_id(slot, remote.global_id.clone());
                report.adopted += 1;
                slot
            }
            None => {
                // Stamped with the current counter, never ahead of it
                let version = self.store.counter();
                self.store.insert(Record::from_remote(remote, version));
                report.inserted += 1;
                return;
            }
        };

        let local = self.store.record(slot);
        if !self.cursors.is_dirty(local) {
            self.store.record_mut(slot).apply_remote(remote);
            report.applied += 1;
            return;
        }

        let policy = self.config.policy;
        let resolution = policy.resolve(local, remote);
        let conflict = Conflict {
            global_id: remote.global_id.clone(),
            primary_key: remote.primary_key.clone(),
            policy,
            resolution,
            local_value: local.value.clone(),
            remote_value: remote.value.clone(),
        };

        if resolution == ConflictResolution::RemoteWins {
            let now = self.clock.now();
            let record = self.store.record_mut(slot);
            record.apply_remote(remote);
            if policy == ConflictPolicy::TimestampWins {
                // Resolution counts as a fresh local event for later comparisons
                record.updated_at = now;
            }
            report.applied += 1;
        }

        tracing::debug!(
            node = %self.config.name,
            pk = %conflict.primary_key,
            policy = %policy,
            resolution = ?resolution,
            local = %conflict.local_value,
            remote = %conflict.remote_value,
            "resolved conflict"
        );
        report.conflicts.push(conflict);
    }
}

impl<T> fmt::Display for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "client {} policy={} counter={} last_pushed={} last_pulled={}",
            self.config.name,
            self.config.policy,
            self.store.counter(),
            self.cursors.last_pushed_counter,
            self.cursors.last_pulled_server_counter,
        )?;
        if self.store.is_empty() {
            writeln!(f, "  (no records)")?;
        }
        for record in self.store.records() {
            writeln!(f, "  {record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, Error, Server, SharedServer};
    use chrono::Duration;

    struct Fixture {
        server: SharedServer,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::default());
            let server = SharedServer::new(Server::with_clock("server", clock.clone()));
            Self { server, clock }
        }

        fn client(&self, name: &str, policy: ConflictPolicy) -> Client<SharedServer> {
            Client::with_clock(
                ClientConfig::new(name).with_policy(policy),
                self.server.clone(),
                self.clock.clone(),
            )
        }

        fn tick(&self) {
            self.clock.advance(Duration::seconds(2));
        }
    }

    #[test]
    fn config_defaults_to_timestamp_wins() {
        let config = ClientConfig::new("c");
        assert_eq!(config.policy, ConflictPolicy::TimestampWins);

        let config: ClientConfig = serde_json::from_str(r#"{"name": "c"}"#).unwrap();
        assert_eq!(config.policy, ConflictPolicy::TimestampWins);

        let config: ClientConfig =
            serde_json::from_str(r#"{"name": "c", "policy": "client-wins"}"#).unwrap();
        assert_eq!(config.policy, ConflictPolicy::ClientWins);
    }

    #[test]
    fn local_create_rejects_duplicate() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("2014-05-10", "apples", "3").unwrap();

        let err = client.create("2014-05-10", "pears", "1").unwrap_err();
        assert_eq!(err, Error::DuplicateIdentity("2014-05-10".into()));
        assert_eq!(client.counter(), 1);
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn pull_inserts_at_current_counter() {
        let fx = Fixture::new();
        fx.server.lock().create("a", "n", "1").unwrap();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("b", "n", "2").unwrap();
        client.create("c", "n", "3").unwrap();

        let report = client.pull().unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(client.counter(), 2);
        assert_eq!(client.get("a").unwrap().change_version, 2);
        assert_eq!(client.last_pulled_server_counter(), 1);
    }

    #[test]
    fn pull_adopts_server_identity_on_primary_key_match() {
        let fx = Fixture::new();
        let server_gid = fx
            .server
            .lock()
            .create("2014-05-10", "apples", "3")
            .unwrap()
            .global_id
            .clone();
        let mut client = fx.client("c1", ConflictPolicy::ServerWins);
        let local_gid = client
            .create("2014-05-10", "apples", "9")
            .unwrap()
            .global_id
            .clone();

        let report = client.pull().unwrap();

        assert_eq!(report.adopted, 1);
        assert!(client.get_by_global_id(&local_gid).is_none());
        let record = client.get_by_global_id(&server_gid).unwrap();
        assert_eq!(record.value, "3");
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn clean_record_takes_server_copy() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::ClientWins);
        client.create("k", "n", "1").unwrap();
        client.sync().unwrap();

        fx.server.lock().update("k", "2").unwrap();
        let report = client.pull().unwrap();

        assert!(report.conflicts.is_empty());
        assert_eq!(report.applied, 1);
        assert_eq!(client.get("k").unwrap().value, "2");
        // Merge does not count as a local change
        assert_eq!(client.counter(), 1);
        assert_eq!(client.dirty_records().count(), 0);
    }

    #[test]
    fn server_wins_overwrites_dirty_record() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::ServerWins);
        client.create("k", "n", "1").unwrap();
        client.sync().unwrap();

        client.update("k", "local").unwrap();
        let local_updated_at = client.get("k").unwrap().updated_at;
        fx.tick();
        fx.server.lock().update("k", "remote").unwrap();

        let report = client.pull().unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].resolution, ConflictResolution::RemoteWins);
        let record = client.get("k").unwrap();
        assert_eq!(record.value, "remote");
        assert_eq!(record.updated_at, local_updated_at);
    }

    #[test]
    fn client_wins_keeps_dirty_record_and_pushes_it() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::ClientWins);
        client.create("k", "n", "1").unwrap();
        client.sync().unwrap();

        client.update("k", "local").unwrap();
        fx.tick();
        fx.server.lock().update("k", "remote").unwrap();

        let report = client.sync().unwrap();

        assert_eq!(report.pull.conflicts[0].resolution, ConflictResolution::LocalWins);
        assert_eq!(report.push.sent, 1);
        assert_eq!(client.get("k").unwrap().value, "local");
        assert_eq!(fx.server.lock().get("k").unwrap().value, "local");
    }

    #[test]
    fn timestamp_wins_resets_local_timestamp_when_remote_wins() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("k", "n", "1").unwrap();
        client.sync().unwrap();

        client.update("k", "5").unwrap();
        fx.tick();
        fx.server.lock().update("k", "7").unwrap();
        let server_updated_at = fx.server.lock().get("k").unwrap().updated_at;
        fx.tick();

        client.pull().unwrap();

        let record = client.get("k").unwrap();
        assert_eq!(record.value, "7");
        assert!(record.updated_at > server_updated_at);
        assert_eq!(record.updated_at, fx.clock.now());
    }

    #[test]
    fn timestamp_wins_keeps_newer_local_change() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("k", "n", "1").unwrap();
        client.sync().unwrap();

        fx.server.lock().update("k", "7").unwrap();
        fx.tick();
        client.update("k", "5").unwrap();
        let local_updated_at = client.get("k").unwrap().updated_at;

        let report = client.pull().unwrap();

        assert_eq!(report.conflicts[0].resolution, ConflictResolution::LocalWins);
        let record = client.get("k").unwrap();
        assert_eq!(record.value, "5");
        assert_eq!(record.updated_at, local_updated_at);
    }

    #[test]
    fn push_advances_both_cursors() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("a", "n", "1").unwrap();
        client.create("b", "n", "2").unwrap();

        let report = client.sync().unwrap();

        assert!(report.is_ok());
        assert_eq!(report.push.sent, 2);
        assert_eq!(client.last_pushed_counter(), 2);
        assert_eq!(client.last_pulled_server_counter(), 2);
        assert_eq!(fx.server.lock().counter(), 2);
    }

    #[test]
    fn conflicting_push_leaves_cursors_and_resends() {
        let fx = Fixture::new();
        fx.server.lock().create("k", "n", "server").unwrap();
        let mut client = fx.client("c1", ConflictPolicy::TimestampWins);
        client.create("k", "n", "client").unwrap();

        // Push without pulling first
        let report = client.push().unwrap();
        assert_eq!(report.status, SyncStatus::Conflict);
        assert_eq!(client.cursors(), SyncCursors::default());

        let report = client.push().unwrap();
        assert_eq!(report.status, SyncStatus::Conflict);
        assert_eq!(report.sent, 1);
        assert_eq!(fx.server.lock().get("k").unwrap().value, "server");
    }

    #[test]
    fn full_sync_resets_cursors_first() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::ServerWins);
        client.create("a", "n", "1").unwrap();
        client.sync().unwrap();

        let report = client.full_sync().unwrap();

        // Everything is re-exchanged: pulled back and pushed again
        assert_eq!(report.pull.received, 1);
        assert_eq!(report.push.sent, 1);
        assert_eq!(client.last_pushed_counter(), 1);
        assert_eq!(client.last_pulled_server_counter(), 2);
    }

    #[test]
    fn display_shows_cursors() {
        let fx = Fixture::new();
        let mut client = fx.client("c1", ConflictPolicy::ClientWins);
        assert!(client.to_string().contains("(no records)"));
        client.create("2014-05-10", "apples", "3").unwrap();
        let text = client.to_string();
        assert!(text.starts_with(
            "client c1 policy=client-wins counter=1 last_pushed=0 last_pulled=0"
        ));
        assert!(text.contains("pk=2014-05-10"));
    }
}
