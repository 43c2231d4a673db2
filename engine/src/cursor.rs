//! Sync cursors a client keeps about itself and the server.

use crate::{Counter, Record};
use serde::{Deserialize, Serialize};

/// The two positions a client remembers between syncs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCursors {
    /// Client's own counter as of the last successful push
    pub last_pushed_counter: Counter,
    /// Server counter as of the last successful pull (or push)
    pub last_pulled_server_counter: Counter,
}

impl SyncCursors {
    /// A record is dirty if it changed locally after the last successful push.
    pub fn is_dirty(&self, record: &Record) -> bool {
        record.change_version > self.last_pushed_counter
    }

    /// Forget both positions, forcing a full re-exchange.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Record the server counter reported by a successful pull.
    pub fn advance_pulled(&mut self, server_counter: Counter) {
        self.last_pulled_server_counter = server_counter;
    }

    /// Record a successful push of `applied` records.
    ///
    /// The pulled cursor jumps to the post-push server counter only when that
    /// counter accounts exactly for our own records; if anything else landed
    /// on the server since our last pull, the cursor stays put so the next
    /// pull still fetches it. Returns whether the pulled cursor moved.
    pub fn acknowledge_push(
        &mut self,
        local_counter: Counter,
        applied: Counter,
        server_counter: Counter,
    ) -> bool {
        self.last_pushed_counter = local_counter;
        if server_counter == self.last_pulled_server_counter + applied {
            self.last_pulled_server_counter = server_counter;
            true
        } else {
            false
        }
    }
}
