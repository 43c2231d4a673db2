//! Conflict policy for records changed on both sides between syncs.
//!
//! A conflict only exists on the client, during a pull, when an incoming
//! server record matches a local record that is still dirty (changed since the
//! last successful push). The server never arbitrates: the last accepted push
//! wins there.

use crate::{Error, GlobalId, PrimaryKey, Record, RecordDto};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a client settles a dirty local record against a newer server copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The server copy always replaces the local change
    ServerWins,
    /// The local change is always kept (and pushed on the next push)
    ClientWins,
    /// The server copy wins only if its `updated_at` is strictly later (default)
    #[default]
    TimestampWins,
}

impl ConflictPolicy {
    /// Decide the winner for a dirty local record.
    pub fn resolve(self, local: &Record, remote: &RecordDto) -> ConflictResolution {
        match self {
            ConflictPolicy::ServerWins => ConflictResolution::RemoteWins,
            ConflictPolicy::ClientWins => ConflictResolution::LocalWins,
            ConflictPolicy::TimestampWins => {
                if remote.updated_at > local.updated_at {
                    ConflictResolution::RemoteWins
                } else {
                    ConflictResolution::LocalWins
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::ServerWins => "server-wins",
            ConflictPolicy::ClientWins => "client-wins",
            ConflictPolicy::TimestampWins => "timestamp-wins",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server-wins" | "server" => Ok(ConflictPolicy::ServerWins),
            "client-wins" | "client" => Ok(ConflictPolicy::ClientWins),
            "timestamp-wins" | "timestamp" => Ok(ConflictPolicy::TimestampWins),
            _ => Err(Error::InvalidPolicy(s.to_string())),
        }
    }
}

/// How a conflict was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// Local change was kept
    LocalWins,
    /// Server copy replaced the local change
    RemoteWins,
}

/// A conflict detected while pulling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub global_id: GlobalId,
    pub primary_key: PrimaryKey,
    pub policy: ConflictPolicy,
    pub resolution: ConflictResolution,
    /// Local value before resolution
    pub local_value: String,
    /// Server value offered by the pull
    pub remote_value: String,
}
