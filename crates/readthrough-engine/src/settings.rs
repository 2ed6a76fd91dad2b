//! Layered settings: optional file, then `READTHROUGH__*` environment variables.
//!
//! ```toml
//! [policy]
//! refresh_after_ms = 30000
//! expire_after_ms = 300000
//! acquire_timeout_ms = 60000
//!
//! [locks]
//! prune_idle = false
//!
//! [store]
//! max_capacity = 10000
//! ```
//!
//! Every key can be overridden from the environment, for example
//! `READTHROUGH__POLICY__REFRESH_AFTER_MS=5000`.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use readthrough_core::{CachePolicy, PolicyError};
use readthrough_memory::{MemoryStore, MemoryStoreConfig};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::orchestrator::CacheOrchestrator;

const ENV_PREFIX: &str = "READTHROUGH";
const ENV_SEPARATOR: &str = "__";

/// Errors loading or applying settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file or environment could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] ConfigError),

    /// The loaded durations do not form a valid policy.
    #[error("invalid cache policy: {0}")]
    Policy(#[from] PolicyError),
}

/// Durations in milliseconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicySettings {
    pub refresh_after_ms: u64,
    pub expire_after_ms: u64,
    pub acquire_timeout_ms: u64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        let defaults = CachePolicy::default();
        Self {
            refresh_after_ms: millis(defaults.refresh_after),
            expire_after_ms: millis(defaults.expire_after),
            acquire_timeout_ms: millis(defaults.acquire_timeout),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LockSettings {
    /// Drop a key's lock entry when it goes idle.
    pub prune_idle: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreSettings {
    pub max_capacity: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_capacity: MemoryStoreConfig::default().max_capacity,
        }
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub policy: PolicySettings,
    pub locks: LockSettings,
    pub store: StoreSettings,
}

impl Settings {
    /// Loads settings from `path` (if given and present) and the process
    /// environment. Environment values win.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with(path, None)
    }

    /// Loads settings from the environment only.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::load(None)
    }

    fn load_with(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "loading settings file");
            builder = builder.add_source(File::from(path).required(false));
        }

        let environment = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(env);

        let settings = builder
            .add_source(environment)
            .build()?
            .try_deserialize::<Settings>()?;

        info!(
            refresh_after_ms = settings.policy.refresh_after_ms,
            expire_after_ms = settings.policy.expire_after_ms,
            acquire_timeout_ms = settings.policy.acquire_timeout_ms,
            prune_idle = settings.locks.prune_idle,
            max_capacity = settings.store.max_capacity,
            "settings loaded"
        );
        Ok(settings)
    }

    /// Validated default policy.
    pub fn cache_policy(&self) -> Result<CachePolicy, SettingsError> {
        let policy = CachePolicy::new(
            Duration::from_millis(self.policy.refresh_after_ms),
            Duration::from_millis(self.policy.expire_after_ms),
            Duration::from_millis(self.policy.acquire_timeout_ms),
        );
        policy.validate()?;
        Ok(policy)
    }

    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig {
            max_capacity: self.store.max_capacity,
        }
    }

    /// Builds an orchestrator over a [`MemoryStore`] sized and tuned by these
    /// settings.
    pub fn build_orchestrator(&self) -> Result<CacheOrchestrator<MemoryStore>, SettingsError> {
        let policy = self.cache_policy()?;
        let store = MemoryStore::new(self.store_config());

        let orchestrator = CacheOrchestrator::builder(store)
            .defaults(policy)
            .prune_idle_locks(self.locks.prune_idle)
            .build()?;

        Ok(orchestrator)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
