//! Configuration
//!
//! Read from `<config_dir>/semantic-sync/config.toml` (or an explicit path),
//! then overridden from the environment. Every key has a default, so an
//! empty or missing file is a valid configuration.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connector::{FileConnector, SourceConnector, TargetConnector};
use crate::diff::SyncMode;
use crate::model::Dialect;
use crate::resilience::RetryConfig;
use crate::snapshot::RestorePolicy;
use crate::sync::SyncRequest;

pub const DATABASE_ENV: &str = "SEMANTIC_SYNC_DB";
pub const KEEP_SNAPSHOTS_ENV: &str = "SEMANTIC_SYNC_KEEP_SNAPSHOTS";

const APP_DIR: &str = "semantic-sync";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub retention: RetentionConfig,
    pub retry: RetrySection,
    pub sync: SyncSection,
    pub restore: RestoreSection,
    /// Stores addressable by tag
    pub connectors: BTreeMap<String, ConnectorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            retention: RetentionConfig::default(),
            retry: RetrySection::default(),
            sync: SyncSection::default(),
            restore: RestoreSection::default(),
            connectors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub keep_snapshots: usize,
    pub keep_sync_runs: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            keep_snapshots: 10,
            keep_sync_runs: 50,
        }
    }
}

/// Backoff for read-only connector calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub mode: SyncMode,
    pub case_insensitive: bool,
    pub ignore_hidden: bool,
    pub snapshot_before_apply: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            mode: SyncMode::Incremental,
            case_insensitive: true,
            ignore_hidden: false,
            snapshot_before_apply: true,
            timeout_secs: None,
        }
    }
}

impl SyncSection {
    /// Request carrying the configured defaults
    pub fn request(&self) -> SyncRequest {
        SyncRequest::default()
            .mode(self.mode)
            .case_insensitive(self.case_insensitive)
            .ignore_hidden(self.ignore_hidden)
            .snapshot_before_apply(self.snapshot_before_apply)
            .timeout(self.timeout_secs.map(Duration::from_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreSection {
    pub retain_new_tables: bool,
}

impl Default for RestoreSection {
    fn default() -> Self {
        Self {
            retain_new_tables: true,
        }
    }
}

impl RestoreSection {
    pub fn policy(&self) -> RestorePolicy {
        RestorePolicy {
            retain_new_tables: self.retain_new_tables,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConnectorConfig {
    /// Raw schema kept in a JSON file
    File {
        path: PathBuf,
        dialect: Dialect,
        #[serde(default = "default_true")]
        alter_column_type: bool,
    },
}

fn default_true() -> bool {
    true
}

impl ConnectorConfig {
    fn file_connector(&self, tag: &str) -> FileConnector {
        match self {
            ConnectorConfig::File {
                path,
                dialect,
                alter_column_type,
            } => {
                let connector = FileConnector::new(tag, path.clone(), *dialect);
                if *alter_column_type {
                    connector
                } else {
                    connector.without_alter_column_type()
                }
            }
        }
    }

    pub fn build_source(&self, tag: &str) -> Box<dyn SourceConnector> {
        Box::new(self.file_connector(tag))
    }

    pub fn build_target(&self, tag: &str) -> Box<dyn TargetConnector> {
        Box::new(self.file_connector(tag))
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("semantic-sync.db")
}

impl Config {
    /// `<config_dir>/semantic-sync/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load from `path`, or from the default location when it exists, then
    /// apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    /// Apply `SEMANTIC_SYNC_*` overrides looked up through `var`
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var(DATABASE_ENV) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(keep) = var(KEEP_SNAPSHOTS_ENV) {
            self.retention.keep_snapshots = keep
                .trim()
                .parse()
                .with_context(|| format!("{} must be a count, got '{}'", KEEP_SNAPSHOTS_ENV, keep))?;
        }
        Ok(())
    }

    fn lookup(&self, tag: &str) -> Result<&ConnectorConfig> {
        self.connectors.get(tag).ok_or_else(|| {
            let known: Vec<&str> = self.connectors.keys().map(String::as_str).collect();
            anyhow::anyhow!(
                "Unknown connector '{}' (configured: {})",
                tag,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            )
        })
    }

    /// Connector registered under `tag`, opened for reading
    pub fn source(&self, tag: &str) -> Result<Box<dyn SourceConnector>> {
        Ok(self.lookup(tag)?.build_source(tag))
    }

    /// Connector registered under `tag`, opened for writing
    pub fn target(&self, tag: &str) -> Result<Box<dyn TargetConnector>> {
        Ok(self.lookup(tag)?.build_target(tag))
    }
}
