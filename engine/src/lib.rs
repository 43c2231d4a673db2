//! # Tally Engine
//!
//! A two-tier replication engine: one authoritative [`Server`] and any number
//! of [`Client`]s holding eventually-consistent copies of a shared record set.
//!
//! Ordering comes from monotonic per-node counters and cursors, not from
//! wall-clock time. Timestamps only matter to the
//! [`ConflictPolicy::TimestampWins`] policy.
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] carries:
//! - a user-chosen primary key (unique per node, not across nodes)
//! - a global id assigned by the creating node
//! - an opaque name/value payload
//! - a tombstone flag (deletion is an update, records are never removed)
//! - created/updated timestamps
//! - a change version: the owning node's counter at its last local mutation
//!
//! ### Counters and cursors
//!
//! Every node ticks its counter once per local mutation (the server also ticks
//! once per applied pushed record). A client remembers two cursors
//! ([`SyncCursors`]): its own counter at the last successful push, and the
//! server counter at the last successful pull. A local record is *dirty* when
//! its change version is past the push cursor.
//!
//! ### Sync
//!
//! [`Client::sync`] pulls first, then pushes:
//! - pull matches server records to local ones by global id, then by primary
//!   key (adopting the server's global id), and settles dirty records with
//!   the client's [`ConflictPolicy`];
//! - push sends every dirty record; the server overwrites by global id and
//!   refuses records whose primary key is bound to another global id,
//!   answering [`SyncStatus::Conflict`].
//!
//! ## Quick Start
//!
//! ```rust
//! use tally_engine::{Client, ClientConfig, ConflictPolicy, Server, SharedServer};
//!
//! let server = SharedServer::new(Server::new("server"));
//! let mut alice = Client::new(
//!     ClientConfig::new("alice").with_policy(ConflictPolicy::TimestampWins),
//!     server.clone(),
//! );
//! let mut bob = Client::new(ClientConfig::new("bob"), server.clone());
//!
//! alice.create("2014-05-10", "apples", "3").unwrap();
//! alice.sync().unwrap();
//! bob.sync().unwrap();
//!
//! assert_eq!(bob.get("2014-05-10").unwrap().value, "3");
//! assert_eq!(server.lock().len(), 1);
//! ```

pub mod client;
pub mod clock;
pub mod cursor;
pub mod error;
pub mod protocol;
pub mod reconcile;
pub mod record;
pub mod server;
pub mod store;
pub mod transport;

// Re-export main types at crate root
pub use client::{Client, ClientConfig, PullReport, PushReport, SyncReport};
pub use clock::{ManualClock, SystemClock, WallClock};
pub use cursor::SyncCursors;
pub use error::{Error, Result};
pub use protocol::{PullRequest, PullResponse, PushRequest, PushResponse, SyncStatus};
pub use reconcile::{Conflict, ConflictPolicy, ConflictResolution};
pub use record::{Record, RecordDto};
pub use server::{Server, SharedServer};
pub use store::RecordStore;
pub use transport::SyncTransport;

/// Type aliases for clarity
pub type PrimaryKey = String;
pub type GlobalId = String;
pub type Counter = u64;
pub type Timestamp = chrono::DateTime<chrono::Utc>;
