//! Configuration loading for filesearchd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.filesearch/config.toml` (user)
//! 3. `/etc/filesearch/config.toml` (system)
//! 4. built-in defaults
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.filesearch/secrets.toml` (user, must be 0600)
//! 2. `/etc/filesearch/secrets.toml` (system, must be 0600)
//! 3. `GEMINI_API_KEY`, then `GOOGLE_API_KEY`

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::rate_limit::RateLimitConfig;
use crate::cache::CacheConfig;
use crate::providers::RetryConfig;
use crate::providers::gemini;
use crate::service::UploadPolicy;
use crate::validation::ContentTypePolicy;
use crate::{FileSearchError, Result};

const CONFIG_DIR: &str = ".filesearch";
const SYSTEM_CONFIG_DIR: &str = "/etc/filesearch";
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:8000).
    #[serde(default = "default_address")]
    pub address: String,
    /// Log filter used when `RUST_LOG` is unset (default: "info").
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            log_level: default_log_level(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resource limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent requests (default: 100).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Request timeout in seconds (default: 120). Uploads wait for provider
    /// indexing, so this is longer than a typical API timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: default_max_concurrent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_max_concurrent() -> usize {
    100
}

fn default_request_timeout() -> u64 {
    120
}

/// Upload limits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadsConfig {
    /// Per-file size limit in MB (default: 50).
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: f64,
    /// Maximum number of files in one multi-file upload (default: 20).
    #[serde(default = "default_max_files")]
    pub max_files_per_request: usize,
    #[serde(default)]
    pub content_type_policy: ContentTypePolicy,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            max_files_per_request: default_max_files(),
            content_type_policy: ContentTypePolicy::default(),
        }
    }
}

fn default_max_file_size_mb() -> f64 {
    50.0
}

fn default_max_files() -> usize {
    20
}

impl UploadsConfig {
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size_mb: self.max_file_size_mb,
            content_type_policy: self.content_type_policy.clone(),
        }
    }

    fn file_limit_bytes(&self) -> usize {
        (self.max_file_size_mb.max(0.0) * 1024.0 * 1024.0) as usize
    }

    /// Body limit of a multi-file upload: every file at its limit plus
    /// 1 MiB for multipart framing and form fields.
    pub fn body_limit_bytes(&self) -> usize {
        self.file_limit_bytes()
            .saturating_mul(self.max_files_per_request.max(1))
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }

    /// Body limit of a single-file upload.
    pub fn single_body_limit_bytes(&self) -> usize {
        self.file_limit_bytes().saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

/// Search provider configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderConfig {
    /// Gemini API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when a search does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Per-call HTTP timeout in seconds (default: 120).
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    /// Serve from the in-memory provider when no API key is configured.
    #[serde(default)]
    pub allow_offline: bool,
    /// Delay between upload operation polls in milliseconds (default: 2000).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Polls before an upload is reported as unavailable (default: 60).
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_model: default_model(),
            timeout_secs: default_provider_timeout(),
            allow_offline: false,
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_base_url() -> String {
    gemini::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    gemini::DEFAULT_MODEL.to_string()
}

fn default_provider_timeout() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_polls() -> u32 {
    60
}

/// Background metrics sampling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between host samples and exporter upkeep (default: 15).
    #[serde(default = "default_sample_interval")]
    pub system_sample_interval_secs: u64,
    /// Upper bound on one host sample in milliseconds (default: 2000).
    #[serde(default = "default_sample_timeout")]
    pub system_sample_timeout_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            system_sample_interval_secs: default_sample_interval(),
            system_sample_timeout_ms: default_sample_timeout(),
        }
    }
}

impl MetricsConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.system_sample_interval_secs.max(1))
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.system_sample_timeout_ms.max(1))
    }
}

fn default_sample_interval() -> u64 {
    15
}

fn default_sample_timeout() -> u64 {
    2_000
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub gemini: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// An explicit path must exist. Without one, the first existing file
    /// among the user and system locations is used, and built-in defaults
    /// apply when neither exists.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FileSearchError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            FileSearchError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the config file path. `Ok(None)` means "use defaults".
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(FileSearchError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = Path::new(SYSTEM_CONFIG_DIR).join("config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Bind address after applying `--host` / `--port` overrides.
    pub fn bind_address(&self, host: Option<&str>, port: Option<u16>) -> String {
        let (configured_host, configured_port) = split_host_port(&self.server.address);
        let host = host.unwrap_or(configured_host);
        let port = port.map(|p| p.to_string());
        let port = port.as_deref().unwrap_or(configured_port);

        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.limits.request_timeout_secs.max(1))
    }
}

fn split_host_port(address: &str) -> (&str, &str) {
    match address.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => (host, port),
        _ => (address, "8000"),
    }
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets if no file exists (the key may come from the
    /// environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(CONFIG_DIR).join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = Path::new(SYSTEM_CONFIG_DIR).join("secrets.toml");
        if system_secrets.exists() {
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, refusing group- or world-readable files.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            FileSearchError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            FileSearchError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            FileSearchError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(FileSearchError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Gemini API key from the secrets file, falling back to the environment.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// [`api_key`](Self::api_key) with an injectable environment lookup.
    pub fn api_key_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        let from_file = self
            .gemini
            .as_ref()
            .map(|s| s.api_key.trim().to_string())
            .filter(|k| !k.is_empty());

        from_file.or_else(|| {
            API_KEY_ENV_VARS
                .iter()
                .filter_map(|name| env(name))
                .map(|k| k.trim().to_string())
                .find(|k| !k.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.address, "127.0.0.1:8000");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.server.limits.max_concurrent_requests, 100);
        assert_eq!(config.uploads.max_file_size_mb, 50.0);
        assert_eq!(config.uploads.content_type_policy, ContentTypePolicy::DenyExecutables);
        assert!(!config.provider.allow_offline);
        assert_eq!(config.rate_limits.upload_single_per_minute, 10);
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            address = "0.0.0.0:9000"
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.server.address, "0.0.0.0:9000");
        assert_eq!(config.server.limits.request_timeout_secs, 120);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:8080"
            log_level = "debug"

            [server.limits]
            max_concurrent_requests = 50
            request_timeout_secs = 60

            [uploads]
            max_file_size_mb = 10.5
            content_type_policy = { allow_list = ["application/pdf", "text/*"] }

            [provider]
            default_model = "gemini-2.5-pro"
            allow_offline = true
            max_polls = 5

            [retry]
            max_attempts = 4
            initial_delay_ms = 100
            jitter = false

            [cache]
            enabled = false
            ttl_secs = 30

            [rate_limits]
            search_per_minute = 7

            [metrics]
            system_sample_interval_secs = 5
        "#;
        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.limits.max_concurrent_requests, 50);
        assert_eq!(config.uploads.max_file_size_mb, 10.5);
        assert_eq!(
            config.uploads.content_type_policy,
            ContentTypePolicy::AllowList(vec!["application/pdf".into(), "text/*".into()])
        );
        assert_eq!(config.provider.default_model, "gemini-2.5-pro");
        assert!(config.provider.allow_offline);
        assert_eq!(config.provider.max_polls, 5);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(100));
        assert_eq!(config.retry.max_delay, Duration::from_secs(30));
        assert!(!config.retry.jitter);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.rate_limits.search_per_minute, 7);
        assert_eq!(config.rate_limits.upload_multiple_per_minute, 5);
        assert_eq!(config.metrics.sample_interval(), Duration::from_secs(5));
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Config file not found"));
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\naddress = 1").unwrap();
        let err = Config::load(Some(&path)).unwrap_err().to_string();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn bind_address_overrides() {
        let config = Config::default();
        assert_eq!(config.bind_address(None, None), "127.0.0.1:8000");
        assert_eq!(config.bind_address(Some("0.0.0.0"), None), "0.0.0.0:8000");
        assert_eq!(config.bind_address(None, Some(9001)), "127.0.0.1:9001");
        assert_eq!(config.bind_address(Some("::1"), Some(80)), "[::1]:80");
    }

    #[test]
    fn body_limit_covers_all_files() {
        let uploads = UploadsConfig {
            max_file_size_mb: 1.0,
            max_files_per_request: 3,
            content_type_policy: ContentTypePolicy::default(),
        };
        assert_eq!(uploads.body_limit_bytes(), 4 * 1024 * 1024);
        assert_eq!(uploads.single_body_limit_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn default_single_upload_limit_is_one_file() {
        let uploads = UploadsConfig::default();
        assert_eq!(uploads.single_body_limit_bytes(), 51 * 1024 * 1024);
        assert_eq!(uploads.body_limit_bytes(), (50 * 20 + 1) * 1024 * 1024);
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [gemini]
            api_key = "test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.api_key_with(|_| None), Some("test-key".to_string()));
    }

    #[test]
    fn api_key_env_fallback_order() {
        let secrets = Secrets::default();
        let env = |name: &str| match name {
            "GEMINI_API_KEY" => Some("  ".to_string()),
            "GOOGLE_API_KEY" => Some("google-key".to_string()),
            _ => None,
        };
        assert_eq!(secrets.api_key_with(env), Some("google-key".to_string()));

        let env = |name: &str| Some(format!("{name}-value"));
        assert_eq!(
            secrets.api_key_with(env),
            Some("GEMINI_API_KEY-value".to_string())
        );
        assert_eq!(secrets.api_key_with(|_| None), None);
    }

    #[cfg(unix)]
    #[test]
    fn world_readable_secrets_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.toml");
        fs::write(&path, "[gemini]\napi_key = \"k\"\n").unwrap();

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        let err = Secrets::load_from_file(&path).unwrap_err().to_string();
        assert!(err.contains("insecure permissions"));

        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
        let secrets = Secrets::load_from_file(&path).unwrap();
        assert_eq!(secrets.api_key_with(|_| None), Some("k".to_string()));
    }
}
