//! # Configuration Management
//!
//! Daemon configuration loaded from a TOML file, with defaults that allow
//! starting with no file at all. `normalize` applies the floors and
//! fallbacks the daemon relies on.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_UPSTREAM: &str = "https://api.varnamproject.com";
pub const DEFAULT_MAX_HANDLE_COUNT: usize = 10;
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_address")]
    pub address: String,

    /// Expose the administrative write endpoints.
    #[serde(default)]
    pub enable_internal_api: bool,

    #[serde(default)]
    pub enable_ssl: bool,
    #[serde(default)]
    pub cert_file_path: Option<PathBuf>,
    #[serde(default)]
    pub key_file_path: Option<PathBuf>,

    /// Comma-separated scheme identifiers to sync from upstream.
    #[serde(default)]
    pub download_enabled_schemes: String,

    /// Seconds between sync passes. Floored to 1, defaulted to 30.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Daemon state directory: sync metadata, learn queues, packs.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Handle pool capacity per scheme. The `default` key applies to any
    /// scheme without its own entry.
    #[serde(default)]
    pub max_handle_count: HashMap<String, usize>,

    #[serde(default)]
    pub accounts_enabled: bool,
    #[serde(default)]
    pub users: HashMap<String, UserAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub password: String,
}

fn default_address() -> String {
    "127.0.0.1:8123".to_string()
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL.as_secs()
}

fn default_upstream() -> String {
    DEFAULT_UPSTREAM.to_string()
}

fn default_config_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".aksharad"),
        None => PathBuf::from("./aksharad"),
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            enable_internal_api: false,
            enable_ssl: false,
            cert_file_path: None,
            key_file_path: None,
            download_enabled_schemes: String::new(),
            sync_interval_secs: default_sync_interval_secs(),
            upstream: default_upstream(),
            config_dir: default_config_dir(),
            max_handle_count: HashMap::new(),
            accounts_enabled: false,
            users: HashMap::new(),
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.normalize();
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Configuration { message: e.to_string() })
    }

    /// Apply floors and fallbacks. SSL without both file paths falls back
    /// to plain TCP rather than refusing to start.
    pub fn normalize(&mut self) {
        if self.sync_interval_secs < MIN_SYNC_INTERVAL.as_secs() {
            self.sync_interval_secs = DEFAULT_SYNC_INTERVAL.as_secs();
        }

        if self.upstream.is_empty() {
            self.upstream = default_upstream();
        }

        if self.enable_ssl && (self.cert_file_path.is_none() || self.key_file_path.is_none()) {
            self.enable_ssl = false;
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Scheme identifiers enabled for download, whitespace-trimmed.
    pub fn download_schemes(&self) -> Vec<String> {
        self.download_enabled_schemes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn max_handles_for(&self, scheme: &str) -> usize {
        self.max_handle_count
            .get(scheme)
            .or_else(|| self.max_handle_count.get("default"))
            .copied()
            .unwrap_or(DEFAULT_MAX_HANDLE_COUNT)
    }

    pub fn sync_dir(&self) -> PathBuf {
        self.config_dir.join("sync")
    }

    pub fn packs_dir(&self) -> PathBuf {
        self.config_dir.join("packs")
    }

    pub fn schemes_dir(&self) -> PathBuf {
        self.config_dir.join("schemes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let mut config = DaemonConfig::parse("").unwrap();
        config.normalize();
        assert_eq!(config.address, "127.0.0.1:8123");
        assert_eq!(config.upstream, DEFAULT_UPSTREAM);
        assert_eq!(config.sync_interval(), DEFAULT_SYNC_INTERVAL);
        assert_eq!(config.max_handles_for("ml"), DEFAULT_MAX_HANDLE_COUNT);
        assert!(config.download_schemes().is_empty());
    }

    #[test]
    fn sync_interval_floor() {
        let mut config = DaemonConfig { sync_interval_secs: 0, ..Default::default() };
        config.normalize();
        assert_eq!(config.sync_interval(), DEFAULT_SYNC_INTERVAL);
    }

    #[test]
    fn ssl_disabled_without_key_material() {
        let mut config = DaemonConfig {
            enable_ssl: true,
            cert_file_path: Some(PathBuf::from("/tmp/cert.pem")),
            key_file_path: None,
            ..Default::default()
        };
        config.normalize();
        assert!(!config.enable_ssl);
    }

    #[test]
    fn download_schemes_trims_entries() {
        let config = DaemonConfig {
            download_enabled_schemes: " ml, hi ,,ta ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.download_schemes(), vec!["ml", "hi", "ta"]);
    }

    #[test]
    fn per_scheme_handle_counts() {
        let config: DaemonConfig = toml::from_str(
            r#"
            [max_handle_count]
            default = 4
            ml = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.max_handles_for("ml"), 16);
        assert_eq!(config.max_handles_for("hi"), 4);
    }

    #[test]
    fn users_table_parses() {
        let config: DaemonConfig = toml::from_str(
            r#"
            accounts_enabled = true
            [users.admin]
            password = "secret"
            "#,
        )
        .unwrap();
        assert!(config.accounts_enabled);
        assert_eq!(config.users["admin"].password, "secret");
    }
}
