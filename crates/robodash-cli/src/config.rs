//! Configuration vault – reads/writes `~/.robodash/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use robodash_middleware::FirebaseConfig;
use robodash_runtime::{DashboardConfig, RetryPolicy};
use zeroize::Zeroize;

/// Persisted user configuration stored in `~/.robodash/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Real-time database URL; demo mode when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub database_url: String,

    /// Web API key of the database project.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Force demo mode even when a database is configured.
    #[serde(default)]
    pub demo: bool,

    /// HTTP port of the cockpit web UI.
    #[serde(default = "default_webui_port")]
    pub webui_port: u16,

    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_auth_retry_attempts")]
    pub auth_retry_attempts: u32,

    #[serde(default = "default_auth_retry_base_ms")]
    pub auth_retry_base_ms: u64,

    #[serde(default = "default_demo_interval_ms")]
    pub demo_interval_ms: u64,

    /// Theme preference file; `~/.robodash/preferences.json` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences_path: Option<PathBuf>,
}

impl Drop for Config {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field(
                "api_key",
                if self.api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("demo", &self.demo)
            .field("webui_port", &self.webui_port)
            .field("write_timeout_ms", &self.write_timeout_ms)
            .field("auth_retry_attempts", &self.auth_retry_attempts)
            .field("auth_retry_base_ms", &self.auth_retry_base_ms)
            .field("demo_interval_ms", &self.demo_interval_ms)
            .field("preferences_path", &self.preferences_path)
            .finish()
    }
}

fn default_webui_port() -> u16 {
    8080
}
fn default_write_timeout_ms() -> u64 {
    5000
}
fn default_auth_retry_attempts() -> u32 {
    3
}
fn default_auth_retry_base_ms() -> u64 {
    500
}
fn default_demo_interval_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            api_key: String::new(),
            demo: false,
            webui_port: default_webui_port(),
            write_timeout_ms: default_write_timeout_ms(),
            auth_retry_attempts: default_auth_retry_attempts(),
            auth_retry_base_ms: default_auth_retry_base_ms(),
            demo_interval_ms: default_demo_interval_ms(),
            preferences_path: None,
        }
    }
}

impl Config {
    /// Demo mode is forced, or there is no database to talk to.
    pub fn is_demo(&self) -> bool {
        self.demo || self.database_url.trim().is_empty()
    }

    /// Connection settings for the hosted store; `None` in demo mode.
    pub fn firebase(&self) -> Option<FirebaseConfig> {
        if self.is_demo() {
            return None;
        }
        Some(FirebaseConfig::new(self.database_url.trim(), self.api_key.clone()))
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            demo: self.is_demo(),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            session_retry: RetryPolicy {
                attempts: self.auth_retry_attempts.max(1),
                base_delay: Duration::from_millis(self.auth_retry_base_ms),
            },
            demo_interval: Duration::from_millis(self.demo_interval_ms.max(1)),
            ..DashboardConfig::default()
        }
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.preferences_path
            .clone()
            .unwrap_or_else(|| robodash_dir(&home_dir()).join("preferences.json"))
    }
}

fn home_dir() -> String {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string())
}

fn robodash_dir(home: &str) -> PathBuf {
    PathBuf::from(home).join(".robodash")
}

/// Return the path to `~/.robodash/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    robodash_dir(home).join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
/// Environment overrides are applied on top of the file.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `ROBODASH_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ROBODASH_DATABASE_URL` | `database_url` |
/// | `ROBODASH_API_KEY` | `api_key` |
/// | `ROBODASH_DEMO` | `demo` (`1`/`true`/`yes`) |
/// | `ROBODASH_WEBUI_PORT` | `webui_port` |
/// | `ROBODASH_WRITE_TIMEOUT_MS` | `write_timeout_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("ROBODASH_DATABASE_URL") {
        cfg.database_url = v;
    }
    if let Ok(v) = std::env::var("ROBODASH_API_KEY") {
        cfg.api_key = v;
    }
    if let Ok(v) = std::env::var("ROBODASH_DEMO") {
        cfg.demo = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
    }
    if let Ok(v) = std::env::var("ROBODASH_WEBUI_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.webui_port = port;
    }
    if let Ok(v) = std::env::var("ROBODASH_WRITE_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.write_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.robodash/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
