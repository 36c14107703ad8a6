//! # Replica Configuration
//!
//! Configuration for one SafeMan replica: where the remote snapshot lives,
//! how often to poll it, where the local mirror is kept, and the issuance
//! defaults.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SAFEMAN_REMOTE_URL=https://script.example/exec                     │
//! │     SAFEMAN_DB_PATH=/var/lib/safeman/safeman.db                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/safeman/config.toml (Linux)                              │
//! │     ~/Library/Application Support/tw.safeman.safeman/config.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     no remote (local mode), 15s poll, 30s request timeout              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A remote URL stored in the mirror by `endpoint set` is used only when no
//! URL is configured here.
//!
//! ## Configuration File Format
//! ```toml
//! [remote]
//! url = "https://script.example/macros/s/abc/exec"
//! poll_interval_secs = 15
//! request_timeout_secs = 30
//! verify_push_status = false
//!
//! [store]
//! database_path = "/var/lib/safeman/safeman.db"
//!
//! [issuance]
//! receiving_dept = "修護處南部分處"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Remote Settings
// =============================================================================

/// Remote snapshot endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Snapshot endpoint URL. `None` keeps the replica local.
    #[serde(default)]
    pub url: Option<String>,

    /// Interval between background pulls (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Upper bound for a single GET or POST (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Treat a non-2xx push response as a failure.
    /// Default: false (pushes are fire-and-forget)
    #[serde(default)]
    pub verify_push_status: bool,

    /// Extra attempts for retryable transport failures.
    /// Default: 0 (a single attempt)
    #[serde(default)]
    pub max_retries: u32,

    /// Initial backoff duration (milliseconds) between attempts.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration (seconds) between attempts.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_poll_interval() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    30
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    30
}

impl Default for RemoteSettings {
    fn default() -> Self {
        RemoteSettings {
            url: None,
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            verify_push_status: false,
            max_retries: 0,
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

impl RemoteSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Local mirror settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// SQLite file for the mirror. Defaults to the platform data directory.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

// =============================================================================
// Issuance Settings
// =============================================================================

/// Defaults applied when recording commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuanceSettings {
    /// Departments offered for issuance.
    #[serde(default = "default_departments")]
    pub departments: Vec<String>,

    /// Department recorded on restock (IN) commits.
    #[serde(default = "default_receiving_dept")]
    pub receiving_dept: String,
}

fn default_departments() -> Vec<String> {
    safeman_core::DEFAULT_DEPARTMENTS
        .iter()
        .map(|d| d.to_string())
        .collect()
}

fn default_receiving_dept() -> String {
    safeman_core::DEFAULT_RECEIVING_DEPT.to_string()
}

impl Default for IssuanceSettings {
    fn default() -> Self {
        IssuanceSettings {
            departments: default_departments(),
            receiving_dept: default_receiving_dept(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete replica configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafemanConfig {
    #[serde(default)]
    pub remote: RemoteSettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub issuance: IssuanceSettings,
}

impl SafemanConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (config.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if let Some(ref url) = self.remote.url {
            if !url.trim().is_empty() {
                validate_endpoint(url)?;
            }
        }

        if self.remote.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        if self.remote.request_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.issuance.receiving_dept.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "receiving_dept must not be empty".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SAFEMAN_REMOTE_URL") {
            debug!(url = %url, "Overriding remote URL from environment");
            self.remote.url = Some(url);
        }

        if let Ok(secs) = std::env::var("SAFEMAN_POLL_INTERVAL") {
            match secs.parse::<u64>() {
                Ok(s) => self.remote.poll_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring unparsable SAFEMAN_POLL_INTERVAL"),
            }
        }

        if let Ok(secs) = std::env::var("SAFEMAN_REQUEST_TIMEOUT") {
            match secs.parse::<u64>() {
                Ok(s) => self.remote.request_timeout_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring unparsable SAFEMAN_REQUEST_TIMEOUT"),
            }
        }

        if let Ok(path) = std::env::var("SAFEMAN_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Ok(flag) = std::env::var("SAFEMAN_VERIFY_PUSH") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.remote.verify_push_status = true,
                "0" | "false" | "no" => self.remote.verify_push_status = false,
                _ => warn!(value = %flag, "Unknown SAFEMAN_VERIFY_PUSH value"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("tw", "safeman", "safeman")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured remote URL, ignoring a blank value.
    pub fn remote_url(&self) -> Option<&str> {
        self.remote
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Mirror database path, falling back to the platform data directory.
    pub fn database_path(&self) -> PathBuf {
        self.store.database_path.clone().unwrap_or_else(|| {
            directories::ProjectDirs::from("tw", "safeman", "safeman")
                .map(|dirs| dirs.data_dir().join("safeman.db"))
                .unwrap_or_else(|| PathBuf::from("safeman.db"))
        })
    }
}

/// Checks that `url` is an absolute http(s) URL and returns it trimmed.
pub fn validate_endpoint(url: &str) -> SyncResult<String> {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(SyncError::InvalidUrl(format!(
            "Endpoint must use http or https, got: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SafemanConfig::default();
        assert_eq!(config.remote.url, None);
        assert_eq!(config.remote.poll_interval_secs, 15);
        assert_eq!(config.remote.request_timeout_secs, 30);
        assert!(!config.remote.verify_push_status);
        assert_eq!(config.remote.max_retries, 0);
        assert_eq!(config.issuance.receiving_dept, "修護處南部分處");
        assert_eq!(config.issuance.departments.len(), 8);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SafemanConfig::default();
        assert!(config.validate().is_ok());

        config.remote.url = Some("ftp://files.example".into());
        assert!(config.validate().unwrap_err().is_config_error());

        config.remote.url = Some("https://script.example/exec".into());
        assert!(config.validate().is_ok());

        // blank means local mode
        config.remote.url = Some("  ".into());
        assert!(config.validate().is_ok());
        assert_eq!(config.remote_url(), None);

        config.remote.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(
            validate_endpoint("  http://localhost:8080/exec ").unwrap(),
            "http://localhost:8080/exec"
        );
        assert!(validate_endpoint("not a url").is_err());
        assert!(validate_endpoint("ws://localhost").is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[remote]\nurl = \"https://script.example/exec\"\n\n[store]\ndatabase_path = \"/tmp/s.db\"\n",
        )
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let config: SafemanConfig = toml::from_str(&contents).unwrap();
        assert_eq!(config.remote_url(), Some("https://script.example/exec"));
        assert_eq!(config.remote.poll_interval_secs, 15);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/s.db"));
        assert_eq!(config.issuance.receiving_dept, "修護處南部分處");
    }

    #[test]
    fn test_save_then_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SafemanConfig::default();
        config.remote.verify_push_status = true;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[remote]"));
        let parsed: SafemanConfig = toml::from_str(&contents).unwrap();
        assert!(parsed.remote.verify_push_status);
    }
}
