//! Configuration loading and management.
//!
//! Loads portal configuration from `./staffdesk.toml` (or
//! `$STAFFDESK_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

// ── Top-level config ────────────────────────────────────────────

/// Top-level portal configuration loaded from TOML.
///
/// Path: `./staffdesk.toml` or `$STAFFDESK_CONFIG_PATH`.
/// Env vars override file values; file values override defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Database settings (`[database]`).
    pub database: DatabaseConfig,
    /// Attachment storage settings (`[attachments]`).
    pub attachments: AttachmentsConfig,
    /// Logging settings (`[logging]`).
    pub logging: LoggingConfig,
}

impl PortalConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$STAFFDESK_CONFIG_PATH` or `./staffdesk.toml`.
    /// If the file does not exist, returns defaults.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: PortalConfig =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(PortalConfig::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve config file path.
    ///
    /// Checks `$STAFFDESK_CONFIG_PATH` first, then `./staffdesk.toml` in the
    /// working directory.
    fn config_path() -> PathBuf {
        Self::config_path_with(|key| std::env::var(key).ok())
    }

    /// Resolve config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("STAFFDESK_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("staffdesk.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids unsafe `set_var` in tests).
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("STAFFDESK_DATABASE_PATH") {
            self.database.path = v;
        }
        if let Some(v) = env("STAFFDESK_ATTACHMENTS_ROOT") {
            self.attachments.root = v;
        }
        if let Some(v) = env("STAFFDESK_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("STAFFDESK_LOG_DIR") {
            self.logging.dir = Some(v);
        }
    }

    /// Parse a TOML string into config (for testing).
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: PortalConfig =
            toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }
}

// ── Database config ─────────────────────────────────────────────

/// Database settings (`[database]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "staffdesk.db".to_string(),
        }
    }
}

// ── Attachments config ──────────────────────────────────────────

/// Attachment storage settings (`[attachments]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    /// Directory where uploaded files are stored.
    pub root: String,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            root: "uploads".to_string(),
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings (`[logging]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing log level filter when `RUST_LOG` is unset.
    pub level: String,
    /// Optional directory for JSON file logs (daily rotation).
    /// Console-only when unset.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
