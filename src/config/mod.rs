// SPDX-License-Identifier: MIT

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

/// Collection resource path on the backend.
pub const MAILBOX_PATH: &str = "/api/emails";
/// Push channel path on the backend.
pub const FEED_PATH: &str = "/ws/emails";

// ─── Config ───────────────────────────────────────────────────────────────────

/// Resolved client configuration.  Precedence: CLI/env overrides, then the
/// optional `--config` TOML file, then built-in defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, e.g. `http://127.0.0.1:8080`.
    pub server_url: String,
    /// Log level/filter string (`trace`..`error` or an env-filter directive).
    pub log_level: String,
    /// Optional daily-rolling log file path.
    pub log_file: Option<PathBuf>,
    /// `pretty` or `json`.
    pub log_format: String,
}

/// CLI/env values layered over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_format: Option<String>,
}

/// `config.toml` shape.  Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    server_url: Option<String>,
    log_level: Option<String>,
    log_file: Option<PathBuf>,
    log_format: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_file: None,
            log_format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl Config {
    /// Resolve the configuration from an optional TOML file plus overrides.
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                toml::from_str::<FileConfig>(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => FileConfig::default(),
        };

        let defaults = Config::default();
        Ok(Config {
            server_url: overrides
                .server_url
                .or(file.server_url)
                .unwrap_or(defaults.server_url),
            log_level: overrides
                .log_level
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            log_file: overrides.log_file.or(file.log_file),
            log_format: overrides
                .log_format
                .or(file.log_format)
                .unwrap_or(defaults.log_format),
        })
    }

    /// URL of the mailbox collection resource.
    pub fn api_url(&self) -> String {
        format!("{}{MAILBOX_PATH}", self.server_url.trim_end_matches('/'))
    }

    /// URL of the push channel, scheme upgraded from the server's own scheme
    /// (encrypted base ⇒ encrypted stream).
    pub fn feed_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            // Already ws:// or wss://
            base.to_string()
        };
        format!("{ws_base}{FEED_PATH}")
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
