//! Process configuration.
//!
//! Read from environment variables by [`fetch_config`] or from a JSON file
//! by [`AppConfig::load`]. Every value has a default:
//! - `SWITCHBOARD_LOG_LEVEL`: tracing level filter (default `info`)
//! - `SWITCHBOARD_AUDIT_QUEUE`: audit channel capacity (default 1024)
//! - `SWITCHBOARD_RNG_SEED`: when set, destination selection is seeded
//!
//! Empty environment values are treated as absent.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use tracing::Level;

use crate::SwitchboardError;
use crate::random::{RandomSource, SeededRandom, ThreadRandom};

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_AUDIT_QUEUE: usize = 1024;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub audit: AuditConfig,
    pub routing: RoutingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            audit: AuditConfig::default(),
            routing: RoutingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Events buffered before [`AuditSink::record`](crate::audit::AuditSink::record)
    /// starts reporting a full queue.
    pub queue_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_AUDIT_QUEUE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub rng_seed: Option<u64>,
}

impl RoutingConfig {
    /// Builds the random source used for destination selection.
    pub fn random_source(&self) -> Arc<dyn RandomSource> {
        match self.rng_seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a JSON file. Missing sections take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SwitchboardError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed tracing level.
    ///
    /// # Errors
    ///
    /// Returns [`SwitchboardError::Config`] for an unknown level name.
    pub fn level(&self) -> crate::Result<Level> {
        Level::from_str(self.log_level.trim()).map_err(|_| {
            SwitchboardError::Config(format!("invalid log level {:?}", self.log_level))
        })
    }

    fn validate(&self) -> crate::Result<()> {
        self.level()?;
        if self.audit.queue_capacity == 0 {
            return Err(SwitchboardError::Config(
                "audit queue capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads the configuration from environment variables.
///
/// # Errors
///
/// Returns [`SwitchboardError::Config`] if a variable is set but cannot be
/// parsed.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let mut config = AppConfig::default();

    if let Some(level) = non_empty_var("SWITCHBOARD_LOG_LEVEL") {
        config.log_level = level;
    }
    if let Some(raw) = non_empty_var("SWITCHBOARD_AUDIT_QUEUE") {
        config.audit.queue_capacity = raw.parse().map_err(|_| {
            SwitchboardError::Config(format!("SWITCHBOARD_AUDIT_QUEUE is not a number: {raw}"))
        })?;
    }
    if let Some(raw) = non_empty_var("SWITCHBOARD_RNG_SEED") {
        config.routing.rng_seed = Some(raw.parse().map_err(|_| {
            SwitchboardError::Config(format!("SWITCHBOARD_RNG_SEED is not a u64: {raw}"))
        })?);
    }

    config.validate()?;
    Ok(config)
}

/// Installs the global `fmt` subscriber at the configured level.
///
/// # Errors
///
/// Fails on an invalid level or if a global subscriber is already set.
pub fn init_tracing(config: &AppConfig) -> crate::Result<()> {
    let level = config.level()?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .map_err(|e| SwitchboardError::Config(format!("failed to install subscriber: {e}")))
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}
