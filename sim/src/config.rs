//! Configuration management for the simulator.

use std::env;
use tally_engine::ConflictPolicy;

/// Simulation configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of concurrently syncing clients
    pub clients: usize,
    /// Mutate-then-sync rounds each client runs
    pub rounds: usize,
    /// Size of the primary-key space the workload draws from
    pub keys: usize,
    /// Conflict policy given to every client
    pub policy: ConflictPolicy,
    /// Base seed; client `i` uses `seed + i`
    pub seed: u64,
    /// Print final state as JSON instead of text
    pub dump_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clients: 3,
            rounds: 5,
            keys: 8,
            policy: ConflictPolicy::default(),
            seed: 42,
            dump_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let clients = parse_or(&lookup, "TALLY_CLIENTS", defaults.clients)?;
        if clients == 0 {
            return Err(ConfigError::NoClients);
        }

        let policy = match lookup("TALLY_POLICY") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidPolicy(raw.clone()))?,
            None => defaults.policy,
        };

        let dump_json = match lookup("TALLY_DUMP_JSON") {
            Some(raw) => matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            None => defaults.dump_json,
        };

        Ok(Self {
            clients,
            rounds: parse_or(&lookup, "TALLY_ROUNDS", defaults.rounds)?,
            keys: parse_or(&lookup, "TALLY_KEYS", defaults.keys)?.max(1),
            policy,
            seed: parse_or(&lookup, "TALLY_SEED", defaults.seed)?,
            dump_json,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {var} value: {value}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("Invalid TALLY_POLICY value: {0} (expected server-wins, client-wins or timestamp-wins)")]
    InvalidPolicy(String),

    #[error("TALLY_CLIENTS must be at least 1")]
    NoClients,
}
