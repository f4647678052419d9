//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/weekplan/config.toml)
//! 3. Environment variables (WEEKPLAN_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "WEEKPLAN";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (SQLite db, sync state, session)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the cloud task service (e.g. https://project.example.co)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Public API key sent with every remote request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whether sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Seconds between periodic full syncs while watching (0 disables)
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Capacity of the background propagation queue
    #[serde(default = "default_propagation_queue")]
    pub propagation_queue: usize,

    /// Maximum number of propagation requests in flight at once
    #[serde(default = "default_propagation_workers")]
    pub propagation_workers: usize,

    /// Timeout applied to each remote HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log file path (stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            remote_url: None,
            api_key: None,
            sync_enabled: false,
            sync_interval_secs: default_sync_interval_secs(),
            propagation_queue: default_propagation_queue(),
            propagation_workers: default_propagation_workers(),
            request_timeout_secs: default_request_timeout_secs(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (WEEKPLAN_DATA_DIR, WEEKPLAN_REMOTE_URL, ...)
    /// 2. Config file (~/.config/weekplan/config.toml or WEEKPLAN_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_URL", ENV_PREFIX)) {
            self.remote_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_API_KEY", ENV_PREFIX)) {
            self.api_key = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        // Unparseable values are ignored rather than failing startup
        if let Ok(val) = std::env::var(format!("{}_SYNC_INTERVAL_SECS", ENV_PREFIX)) {
            if let Ok(secs) = val.parse() {
                self.sync_interval_secs = secs;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with WEEKPLAN_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weekplan")
            .join("config.toml")
    }

    /// Whether there is enough configuration to talk to the remote service
    pub fn sync_configured(&self) -> bool {
        self.sync_enabled && self.remote_url.is_some() && self.api_key.is_some()
    }

    /// Periodic sync interval, `None` when disabled
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }

    /// Timeout for a single remote request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Get the path to the SQLite task database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("tasks.db")
    }

    /// Get the path to the persisted sync state (bookmark)
    pub fn sync_state_path(&self) -> PathBuf {
        self.data_dir.join("sync_state.json")
    }

    /// Get the path to the stored session
    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weekplan")
}

fn default_sync_interval_secs() -> u64 {
    900
}

fn default_propagation_queue() -> usize {
    64
}

fn default_propagation_workers() -> usize {
    4
}

fn default_request_timeout_secs() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "WEEKPLAN_DATA_DIR",
        "WEEKPLAN_REMOTE_URL",
        "WEEKPLAN_API_KEY",
        "WEEKPLAN_SYNC_ENABLED",
        "WEEKPLAN_SYNC_INTERVAL_SECS",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.sync_enabled);
        assert!(config.remote_url.is_none());
        assert!(config.data_dir.ends_with("weekplan"));
        assert_eq!(config.sync_interval(), Some(Duration::from_secs(900)));
        assert_eq!(config.propagation_workers, 4);
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.sqlite_path().ends_with("tasks.db"));
        assert!(config.sync_state_path().ends_with("sync_state.json"));
        assert!(config.session_path().ends_with("session.json"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("WEEKPLAN_DATA_DIR", "/tmp/weekplan-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/weekplan-test"));
    }

    #[test]
    fn test_env_override_sync_enabled() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        assert!(!config.sync_enabled);

        env::set_var("WEEKPLAN_SYNC_ENABLED", "true");
        config.apply_env_overrides();
        assert!(config.sync_enabled);

        env::set_var("WEEKPLAN_SYNC_ENABLED", "0");
        config.apply_env_overrides();
        assert!(!config.sync_enabled);
    }

    #[test]
    fn test_env_override_remote_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("WEEKPLAN_REMOTE_URL", "https://tasks.example.com");
        config.apply_env_overrides();
        assert_eq!(
            config.remote_url,
            Some("https://tasks.example.com".to_string())
        );

        // Empty string clears it
        env::set_var("WEEKPLAN_REMOTE_URL", "");
        config.apply_env_overrides();
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_env_override_interval_ignores_garbage() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("WEEKPLAN_SYNC_INTERVAL_SECS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.sync_interval_secs, 900);

        env::set_var("WEEKPLAN_SYNC_INTERVAL_SECS", "0");
        config.apply_env_overrides();
        assert!(config.sync_interval().is_none());
    }

    #[test]
    fn test_sync_configured_requires_all_fields() {
        let mut config = Config::default();
        config.sync_enabled = true;
        assert!(!config.sync_configured());

        config.remote_url = Some("https://tasks.example.com".to_string());
        assert!(!config.sync_configured());

        config.api_key = Some("anon".to_string());
        assert!(config.sync_configured());
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            remote_url = "https://tasks.example.com"
            api_key = "anon-key"
            sync_enabled = true
            sync_interval_secs = 60
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.api_key.as_deref(), Some("anon-key"));
        assert!(config.sync_enabled);
        assert_eq!(config.sync_interval_secs, 60);
        // Unspecified keys fall back to defaults
        assert_eq!(config.propagation_queue, 64);
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().join("data"),
            remote_url: Some("https://tasks.example.com".to_string()),
            sync_enabled: true,
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.remote_url, config.remote_url);
        assert!(loaded.sync_enabled);
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("WEEKPLAN_DATA_DIR", temp_dir.path());

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.sync_enabled);
        assert!(config.remote_url.is_none());
    }
}
