//! Unified error handling for the simulator.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Engine error: {0}")]
    Engine(#[from] tally_engine::Error),

    #[error("Client task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Nodes diverged after final sync: {0}")]
    Diverged(String),
}

/// Result type alias for the simulator.
pub type Result<T> = std::result::Result<T, AppError>;
