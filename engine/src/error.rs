//! Error types for the Tally engine.

use crate::PrimaryKey;
use thiserror::Error;

/// All possible errors from the Tally engine.
///
/// Identity collisions detected by the server during a push are not errors;
/// they travel back to the client as [`SyncStatus::Conflict`](crate::SyncStatus).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Local mutation errors
    #[error("primary key already in use: {0}")]
    DuplicateIdentity(PrimaryKey),

    #[error("record not found: {0}")]
    RecordNotFound(PrimaryKey),

    // Configuration errors
    #[error("unknown conflict policy: {0}")]
    InvalidPolicy(String),

    // Transport errors
    #[error("transport unavailable: {0}")]
    Transport(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DuplicateIdentity("2014-05-10".into());
        assert_eq!(err.to_string(), "primary key already in use: 2014-05-10");

        let err = Error::RecordNotFound("2014-05-11".into());
        assert_eq!(err.to_string(), "record not found: 2014-05-11");

        let err = Error::InvalidPolicy("newest".into());
        assert_eq!(err.to_string(), "unknown conflict policy: newest");

        let err = Error::Transport("connection reset".into());
        assert_eq!(err.to_string(), "transport unavailable: connection reset");
    }
}
