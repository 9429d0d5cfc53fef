//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$DOCPREVIEW_CONFIG` (environment variable)
//! 2. `~/.config/docpreview/config.toml` (Linux/macOS)
//!    `%APPDATA%\docpreview\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PreviewError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Preview pipeline tuning.
    pub preview: PreviewConfig,
    /// User-facing message templates.
    pub messages: MessagesConfig,
    /// Legacy mail-container converter.
    pub converter: ConverterConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Preview pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Seconds before a handle opened in a detached context is revoked.
    pub detached_revoke_delay_secs: u64,
    /// Inline `cid:` images with a larger base64 payload are left unembedded.
    pub max_inline_image_bytes: usize,
    /// Maximum multipart nesting depth before parts are treated as opaque.
    pub max_mime_depth: usize,
}

/// User-facing message templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Shown when the file store reports a missing file. `{0}` is the file name.
    pub file_not_found: String,
    /// Shown when an error classifies to an empty message.
    pub unknown_error: String,
}

/// Legacy mail-container converter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Program invoked with the file key; prints the `{html, attachments}` JSON.
    pub command: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            detached_revoke_delay_secs: 30,
            max_inline_image_bytes: 1_000_000, // 1 MB
            max_mime_depth: 10,
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            file_not_found: "File \"{0}\" was not found.".to_string(),
            unknown_error: "Unknown error retrieving file.".to_string(),
        }
    }
}

impl PreviewConfig {
    /// Revocation delay for detached handles.
    pub fn detached_revoke_delay(&self) -> Duration {
        Duration::from_secs(self.detached_revoke_delay_secs)
    }
}

impl MessagesConfig {
    /// Render the not-found template for `name`.
    pub fn file_not_found_for(&self, name: &str) -> String {
        self.file_not_found.replace("{0}", name)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    let Some(path) = config_file_path() else {
        return Config::default();
    };
    if !path.exists() {
        return Config::default();
    }
    match load_config_from(&path) {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to load config, using defaults"
            );
            Config::default()
        }
    }
}

/// Load configuration from a specific file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| PreviewError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| PreviewError::Config(e.to_string()))
}

/// Save configuration to the standard location, returning the path written.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save configuration to a specific file, creating its directory.
pub fn save_config_to(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("DOCPREVIEW_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("docpreview").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("docpreview")
}
