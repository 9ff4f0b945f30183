//! Configuration loader
//!
//! Loads gateway configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required secrets are missing, falls back to a config file
//! 3. Probes a few standard paths for config files
//! 4. Supports JSON and TOML formats
//!
//! Whatever the source, the secret overrides below are applied last and the
//! result is validated before it is returned.
//!
//! ## Environment Variables
//! - `GROCY_API_URL`: Backend base URL (ingress URL of the add-on API)
//! - `GROCY_API_KEY`: Backend API key
//! - `HA_TOKEN`: Long-lived Home Assistant access token
//! - `GROCY_GATEWAY_CONFIG`: Explicit config file path

use std::path::{Path, PathBuf};

use grocy_domain::{DomainError, GatewayConfig, Result};

const ENV_API_URL: &str = "GROCY_API_URL";
const ENV_API_KEY: &str = "GROCY_API_KEY";
const ENV_HOST_TOKEN: &str = "HA_TOKEN";
const ENV_CONFIG_PATH: &str = "GROCY_GATEWAY_CONFIG";

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `DomainError::Config` if no source yields a valid configuration.
pub fn load() -> Result<GatewayConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment incomplete, trying file");
            let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
            load_from_file(explicit)
        }
    }
}

/// Load configuration from environment variables alone
///
/// `GROCY_API_KEY` and `HA_TOKEN` are required; everything else takes its
/// default.
///
/// # Errors
/// Returns `DomainError::Config` if a required variable is missing or the
/// result does not validate.
pub fn load_from_env() -> Result<GatewayConfig> {
    let mut config = GatewayConfig::default();
    config.backend.api_key = env_var(ENV_API_KEY)?;
    config.host.access_token = env_var(ENV_HOST_TOKEN)?;
    if let Some(url) = env_opt(ENV_API_URL) {
        config.backend.base_url = url;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `DomainError::Config` if the file is missing or malformed, or the
/// configuration does not validate.
pub fn load_from_file(path: Option<PathBuf>) -> Result<GatewayConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(DomainError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            DomainError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| DomainError::Config(format!("Failed to read config file: {e}")))?;

    let mut config = parse_config(&contents, &config_path)?;
    apply_env_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`). No validation
/// happens here.
///
/// # Errors
/// Returns `DomainError::Config` if the format is unsupported or parsing
/// fails.
pub fn parse_config(contents: &str, path: &Path) -> Result<GatewayConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DomainError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(DomainError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Replace secrets and the backend URL with environment values when set
pub fn apply_env_overrides(config: &mut GatewayConfig) {
    if let Some(url) = env_opt(ENV_API_URL) {
        config.backend.base_url = url;
    }
    if let Some(key) = env_opt(ENV_API_KEY) {
        config.backend.api_key = key;
    }
    if let Some(token) = env_opt(ENV_HOST_TOKEN) {
        config.host.access_token = token;
    }
}

/// Probe the standard locations for a config file
///
/// Checks the working directory, then the executable's directory, for
/// `grocy-gateway.{toml,json}` and `config.{toml,json}`.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] =
        ["grocy-gateway.toml", "grocy-gateway.json", "config.toml", "config.json"];

    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter().flat_map(|dir| NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

fn env_var(key: &str) -> Result<String> {
    env_opt(key)
        .ok_or_else(|| DomainError::Config(format!("Missing required environment variable: {key}")))
}

/// Set and non-blank
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [ENV_API_URL, ENV_API_KEY, ENV_HOST_TOKEN, ENV_CONFIG_PATH] {
            std::env::remove_var(key);
        }
    }

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var(ENV_API_KEY, "api-key");
        std::env::set_var(ENV_HOST_TOKEN, "host-token");
        std::env::set_var(ENV_API_URL, "https://ha.example.com/api/hassio_ingress/abc/api");

        let config = load_from_env().unwrap();
        assert_eq!(config.backend.api_key, "api-key");
        assert_eq!(config.host.access_token, "host-token");
        assert_eq!(config.host_url().unwrap(), "https://ha.example.com");
        assert_eq!(config.session.ttl_secs, 60);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_secret() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var(ENV_API_KEY, "api-key");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, DomainError::Config(ref m) if m.contains(ENV_HOST_TOKEN)));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = write_config(
            ".toml",
            r#"
[backend]
base_url = "http://homeassistant.local:9192/api"
api_key = "file-key"
session_cookie = ""

[host]
access_token = "file-token"
issuer = "http"

[session]
ttl_secs = 120
refresh_interval_secs = 100

[batch]
max_concurrency = 8
"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.backend.api_key, "file-key");
        assert!(config.backend.session_cookie.is_empty());
        assert_eq!(config.session.ttl_secs, 120);
        assert_eq!(config.batch.max_concurrency, 8);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_env_overrides_file_secrets() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var(ENV_API_KEY, "env-key");

        let file = write_config(
            ".json",
            r#"{"backend": {"api_key": "file-key"}, "host": {"access_token": "file-token"}}"#,
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.backend.api_key, "env-key");
        assert_eq!(config.host.access_token, "file-token");

        clear_env();
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = write_config(
            ".toml",
            r#"
[backend]
api_key = "k"

[host]
access_token = "t"

[session]
ttl_secs = 30
refresh_interval_secs = 30
"#,
        );

        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, DomainError::Config(_)));
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/grocy-gateway.toml")));
        assert!(matches!(result, Err(DomainError::Config(_))));
    }

    #[test]
    fn test_parse_config_formats() {
        assert!(parse_config("[backend]\napi_key = \"k\"", Path::new("a.toml")).is_ok());
        assert!(parse_config(r#"{"backend": {}}"#, Path::new("a.json")).is_ok());
        assert!(parse_config("{ not json", Path::new("a.json")).is_err());
        assert!(parse_config("key: value", Path::new("a.yaml")).is_err());
    }
}
