//! Request/response messages exchanged between a client and the server.
//!
//! These are transport-agnostic: the in-process [`SharedServer`](crate::SharedServer)
//! passes them by reference, a networked transport would serialize them.

use crate::{Counter, RecordDto};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a server call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// The whole request was applied.
    #[default]
    Ok,
    /// At least one pushed record collided with a server record on primary
    /// key under a different global id. Non-colliding records were applied.
    Conflict,
}

impl SyncStatus {
    pub fn is_ok(self) -> bool {
        self == SyncStatus::Ok
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Ok => f.write_str("OK"),
            SyncStatus::Conflict => f.write_str("CONFLICT"),
        }
    }
}

/// Ask the server for every record changed after a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Last server counter the client has seen
    pub since: Counter,
}

/// Records changed on the server since the requested cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResponse {
    pub status: SyncStatus,
    /// Server counter at the time of the snapshot
    pub server_counter: Counter,
    pub records: Vec<RecordDto>,
}

/// Records changed on the client since its last successful push.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    pub records: Vec<RecordDto>,
}

/// Result of applying a push batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    pub status: SyncStatus,
    /// Server counter after the batch was processed
    pub server_counter: Counter,
}
