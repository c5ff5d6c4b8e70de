//! Application configuration for pocsync.
//!
//! User config lives at `~/.pocsync/pocsync.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets never live in the file: it only names the env vars holding them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PocsyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pocsync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pocsync";

/// Default database file name inside the config directory.
const DATABASE_FILE_NAME: &str = "pocsync.db";

// ---------------------------------------------------------------------------
// Config structs (matching pocsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Calls API settings.
    #[serde(default)]
    pub calls_api: CallsApiConfig,

    /// Documentation-link resolver settings.
    #[serde(default)]
    pub docs: DocsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Database file path. Empty means `~/.pocsync/pocsync.db`.
    #[serde(default)]
    pub database_path: String,
}

/// `[calls_api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallsApiConfig {
    /// API base URL; endpoint paths are appended to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the access key.
    #[serde(default = "default_access_key_env")]
    pub access_key_env: String,

    /// Name of the env var holding the access key secret.
    #[serde(default = "default_access_key_secret_env")]
    pub access_key_secret_env: String,

    /// Maximum requests in flight at once.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Maximum attempts per request, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff base in milliseconds; attempt `i` waits `base * 2^i`.
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CallsApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_key_env: default_access_key_env(),
            access_key_secret_env: default_access_key_secret_env(),
            max_in_flight: default_max_in_flight(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.gong.io/v2".into()
}
fn default_access_key_env() -> String {
    "GONG_ACCESS_KEY".into()
}
fn default_access_key_secret_env() -> String {
    "GONG_ACCESS_KEY_SECRET".into()
}
fn default_max_in_flight() -> usize {
    3
}
fn default_max_attempts() -> u32 {
    4
}
fn default_base_backoff_ms() -> u64 {
    1000
}
fn default_request_timeout_secs() -> u64 {
    30
}

/// `[docs]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Custom platform taxonomy JSON. Empty means the built-in taxonomy.
    #[serde(default)]
    pub taxonomy_path: String,
}

// ---------------------------------------------------------------------------
// Calls client config (runtime, resolved from config + environment)
// ---------------------------------------------------------------------------

/// Access key pair for Basic Auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub access_key_secret: String,
}

impl Credentials {
    /// Build credentials, treating a missing or empty half as absent.
    pub fn from_parts(key: Option<String>, secret: Option<String>) -> Option<Self> {
        match (key, secret) {
            (Some(k), Some(s)) if !k.is_empty() && !s.is_empty() => Some(Self {
                access_key: k,
                access_key_secret: s,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// Retry behavior for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, first try included.
    pub max_attempts: u32,
    /// Delay unit; attempt `i` (0-indexed) waits `base_delay * 2^i`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: Duration::from_millis(default_base_backoff_ms()),
        }
    }
}

impl RetryPolicy {
    /// Exponential delay for a 0-indexed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Runtime calls client configuration, passed to the client constructor.
#[derive(Debug, Clone)]
pub struct CallsClientConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    /// `None` when either half of the key pair is missing.
    pub credentials: Option<Credentials>,
    /// Maximum requests in flight at once.
    pub max_in_flight: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Retry behavior.
    pub retry: RetryPolicy,
}

impl CallsClientConfig {
    /// Config with default limits pointed at `base_url`.
    pub fn new(base_url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            max_in_flight: default_max_in_flight(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            retry: RetryPolicy::default(),
        }
    }
}

/// Resolve the calls client config from the app config and the environment.
pub fn resolve_calls_config(config: &AppConfig) -> Result<CallsClientConfig> {
    let api = &config.calls_api;

    Url::parse(&api.base_url).map_err(|e| {
        PocsyncError::config(format!("invalid calls_api.base_url '{}': {e}", api.base_url))
    })?;
    if api.max_in_flight == 0 {
        return Err(PocsyncError::config("calls_api.max_in_flight must be at least 1"));
    }
    if api.max_attempts == 0 {
        return Err(PocsyncError::config("calls_api.max_attempts must be at least 1"));
    }

    let credentials = Credentials::from_parts(
        std::env::var(&api.access_key_env).ok(),
        std::env::var(&api.access_key_secret_env).ok(),
    );
    if credentials.is_none() {
        tracing::debug!(
            key_env = %api.access_key_env,
            secret_env = %api.access_key_secret_env,
            "calls API credentials not set"
        );
    }

    Ok(CallsClientConfig {
        base_url: api.base_url.trim_end_matches('/').to_string(),
        credentials,
        max_in_flight: api.max_in_flight,
        request_timeout: Duration::from_secs(api.request_timeout_secs),
        retry: RetryPolicy {
            max_attempts: api.max_attempts,
            base_delay: Duration::from_millis(api.base_backoff_ms),
        },
    })
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pocsync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PocsyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pocsync/pocsync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: the configured one, else `~/.pocsync/pocsync.db`.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    if config.defaults.database_path.is_empty() {
        Ok(config_dir()?.join(DATABASE_FILE_NAME))
    } else {
        Ok(PathBuf::from(&config.defaults.database_path))
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PocsyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PocsyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PocsyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PocsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PocsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("GONG_ACCESS_KEY"));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[calls_api]
base_url = "https://calls.example.com/v2/"
max_in_flight = 5
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.calls_api.max_in_flight, 5);
        assert_eq!(config.calls_api.max_attempts, 4);
        assert_eq!(config.calls_api.request_timeout_secs, 30);
        assert!(config.docs.taxonomy_path.is_empty());
    }

    #[test]
    fn resolve_strips_trailing_slash_and_reads_limits() {
        let mut config = AppConfig::default();
        config.calls_api.base_url = "https://calls.example.com/v2/".into();
        config.calls_api.access_key_env = "PS_TEST_NONEXISTENT_KEY_12345".into();
        config.calls_api.access_key_secret_env = "PS_TEST_NONEXISTENT_SECRET_12345".into();

        let resolved = resolve_calls_config(&config).expect("resolve");
        assert_eq!(resolved.base_url, "https://calls.example.com/v2");
        assert_eq!(resolved.max_in_flight, 3);
        assert_eq!(resolved.retry.max_attempts, 4);
        assert_eq!(resolved.request_timeout, Duration::from_secs(30));
        assert!(resolved.credentials.is_none());
    }

    #[test]
    fn resolve_rejects_bad_base_url() {
        let mut config = AppConfig::default();
        config.calls_api.base_url = "not a url".into();
        let err = resolve_calls_config(&config).unwrap_err();
        assert!(err.to_string().contains("invalid calls_api.base_url"));
    }

    #[test]
    fn resolve_rejects_zero_limits() {
        let mut config = AppConfig::default();
        config.calls_api.max_in_flight = 0;
        assert!(resolve_calls_config(&config).is_err());
    }

    #[test]
    fn empty_credential_halves_are_absent() {
        assert!(Credentials::from_parts(Some("key".into()), Some(String::new())).is_none());
        assert!(Credentials::from_parts(None, Some("secret".into())).is_none());
        assert!(Credentials::from_parts(Some("key".into()), Some("secret".into())).is_some());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = Credentials::from_parts(Some("key".into()), Some("hunter2".into())).unwrap();
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn database_path_prefers_configured_value() {
        let mut config = AppConfig::default();
        config.defaults.database_path = "/tmp/pocsync-test.db".into();
        assert_eq!(
            database_path(&config).unwrap(),
            PathBuf::from("/tmp/pocsync-test.db")
        );
    }
}
