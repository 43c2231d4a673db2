//! Record types for replicated data.

use crate::{Counter, GlobalId, PrimaryKey, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Generate a fresh global id for a locally created record.
pub fn new_global_id() -> GlobalId {
    uuid::Uuid::new_v4().to_string()
}

/// A replicated record held by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// User-chosen key; unique per node, not across nodes
    pub primary_key: PrimaryKey,
    /// Identity assigned by the creating node
    pub global_id: GlobalId,
    pub name: String,
    pub value: String,
    /// Soft delete flag (tombstone)
    pub deleted: bool,
    pub created_at: Timestamp,
    /// Advisory only; feeds timestamp-wins conflict resolution
    pub updated_at: Timestamp,
    /// Owning node's counter after the last mutation made on that node
    pub change_version: Counter,
}

impl Record {
    /// Create a record from a local mutation, with a fresh global id.
    pub fn new(
        primary_key: impl Into<PrimaryKey>,
        name: impl Into<String>,
        value: impl Into<String>,
        timestamp: Timestamp,
        change_version: Counter,
    ) -> Self {
        Self {
            primary_key: primary_key.into(),
            global_id: new_global_id(),
            name: name.into(),
            value: value.into(),
            deleted: false,
            created_at: timestamp,
            updated_at: timestamp,
            change_version,
        }
    }

    /// Build a record from a peer's copy. Identity, payload and timestamps are
    /// adopted as-is; only the change version is local.
    pub fn from_remote(remote: &RecordDto, change_version: Counter) -> Self {
        Self {
            primary_key: remote.primary_key.clone(),
            global_id: remote.global_id.clone(),
            name: remote.name.clone(),
            value: remote.value.clone(),
            deleted: remote.deleted,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            change_version,
        }
    }

    /// Check if record is active (not deleted).
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Set a new value as a local mutation.
    pub fn update_value(
        &mut self,
        value: impl Into<String>,
        timestamp: Timestamp,
        change_version: Counter,
    ) {
        self.value = value.into();
        self.updated_at = timestamp;
        self.change_version = change_version;
    }

    /// Mark record as deleted (tombstone) as a local mutation.
    pub fn mark_deleted(&mut self, timestamp: Timestamp, change_version: Counter) {
        self.deleted = true;
        self.updated_at = timestamp;
        self.change_version = change_version;
    }

    /// Copy the replicated state (value and tombstone) from a peer.
    ///
    /// Neither `updated_at` nor `change_version` is touched.
    pub fn apply_remote(&mut self, remote: &RecordDto) {
        self.value.clone_from(&remote.value);
        self.deleted = remote.deleted;
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pk={} name={} value={}{} updated={} version={}",
            self.global_id,
            self.primary_key,
            self.name,
            self.value,
            if self.deleted { " [deleted]" } else { "" },
            self.updated_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.change_version,
        )
    }
}

/// A record as it crosses the wire between nodes.
///
/// `change_version` is the sender's bookkeeping and is carried for
/// diagnostics only; the receiver assigns its own on apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDto {
    pub primary_key: PrimaryKey,
    pub global_id: GlobalId,
    pub name: String,
    pub value: String,
    pub deleted: bool,
    pub updated_at: Timestamp,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_version: Option<Counter>,
}

impl From<&Record> for RecordDto {
    fn from(record: &Record) -> Self {
        Self {
            primary_key: record.primary_key.clone(),
            global_id: record.global_id.clone(),
            name: record.name.clone(),
            value: record.value.clone(),
            deleted: record.deleted,
            updated_at: record.updated_at,
            created_at: record.created_at,
            change_version: Some(record.change_version),
        }
    }
}
