//! # Configuration Module
//!
//! Data directory layout and runtime tuning for vibegraph.
//!
//! ## Data Storage
//!
//! Everything lives in the platform-standard data directory:
//! - Linux: `~/.local/share/vibegraph/`
//! - macOS: `~/Library/Application Support/vibegraph/`
//! - Windows: `%APPDATA%\vibegraph\`
//!
//! | File          | Contents                                    |
//! |---------------|---------------------------------------------|
//! | `tokens.db`   | SQLite token vault                          |
//! | `config.toml` | [`RuntimeConfig`] overrides (optional)      |
//!
//! ## Runtime Configuration
//!
//! Every field of [`RuntimeConfig`] has a default, so a missing file or a file
//! that sets a single key are both valid:
//!
//! ```toml
//! sync_interval_ms = 500
//! graph_path = "/home/me/graph.json"
//! ```

use crate::algorithm::{RankingConfig, DEFAULT_DEPTH_DECAY};
use crate::sync::SyncConfig;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "vibegraph";

/// Returns the vibegraph data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or the subdirectory cannot be
/// created.
///
/// # Examples
///
/// ```no_run
/// use vibegraph::config::get_data_dir;
///
/// let dir = get_data_dir()?;
/// println!("Data lives in {}", dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. \
             Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create vibegraph data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Path of the SQLite token vault.
pub fn get_vault_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("tokens.db"))
}

/// Path of the optional TOML configuration file.
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("config.toml"))
}

/// Tunables read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Session poll period.
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Upper bound on one poll tick.
    #[serde(default = "default_tick_timeout_ms")]
    pub tick_timeout_ms: u64,
    /// Upper bound on one backend call made by the registry or the engine.
    #[serde(default = "default_service_timeout_ms")]
    pub service_timeout_ms: u64,
    /// Per-hop ranking discount, in (0, 1).
    #[serde(default = "default_depth_decay")]
    pub depth_decay: f64,
    /// Graph snapshot loaded when no `--graph` is given.
    #[serde(default)]
    pub graph_path: Option<PathBuf>,
    #[serde(default = "default_vault_path")]
    pub vault_path: PathBuf,
}

fn default_sync_interval_ms() -> u64 {
    1000
}

fn default_tick_timeout_ms() -> u64 {
    10_000
}

fn default_service_timeout_ms() -> u64 {
    10_000
}

fn default_depth_decay() -> f64 {
    DEFAULT_DEPTH_DECAY
}

fn default_vault_path() -> PathBuf {
    get_vault_path().unwrap_or_else(|_| PathBuf::from("tokens.db"))
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            tick_timeout_ms: default_tick_timeout_ms(),
            service_timeout_ms: default_service_timeout_ms(),
            depth_decay: default_depth_decay(),
            graph_path: None,
            vault_path: default_vault_path(),
        }
    }
}

impl RuntimeConfig {
    /// Load from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed files, and values rejected by [`Self::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at `{}', using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location.
    pub fn load_default() -> Result<Self> {
        Self::load(&get_config_path()?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// Reject values that would stall the poller or break ranking.
    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_ms == 0 {
            bail!("sync_interval_ms must be greater than zero");
        }
        if self.tick_timeout_ms == 0 || self.service_timeout_ms == 0 {
            bail!("timeouts must be greater than zero");
        }
        if !(self.depth_decay > 0.0 && self.depth_decay < 1.0) {
            bail!("depth_decay must lie in (0, 1), got {}", self.depth_decay);
        }
        Ok(())
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            interval: Duration::from_millis(self.sync_interval_ms),
            tick_timeout: Duration::from_millis(self.tick_timeout_ms),
        }
    }

    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    pub fn ranking(&self) -> RankingConfig {
        RankingConfig::with_decay(self.depth_decay)
    }
}
