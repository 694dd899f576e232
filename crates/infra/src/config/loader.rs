//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Attempt to load from environment variables (`CALSYNC_DB_PATH` must be
//!    set for this path to apply)
//! 2. Otherwise fall back to a config file, probing the standard locations
//! 3. JSON and TOML are both accepted, detected by extension
//!
//! Secrets (`CALSYNC_VAULT_SECRET`, `CALSYNC_GOOGLE_CLIENT_SECRET`) are read
//! from the environment on both paths so they never need to live in a file.
//!
//! ## Environment Variables
//! | Variable | Field |
//! |----------|-------|
//! | `CALSYNC_DB_PATH` | `database.path` (required) |
//! | `CALSYNC_DB_POOL_SIZE` | `database.pool_size` |
//! | `CALSYNC_VAULT_SECRET` | `vault.secret` |
//! | `CALSYNC_VAULT_DEV_MODE` | `vault.dev_mode` |
//! | `CALSYNC_BIND_ADDR` | `server.bind_addr` |
//! | `CALSYNC_PUBLIC_BASE_URL` | `server.public_base_url` |
//! | `CALSYNC_SYNC_ENABLED` | `sync.enabled` |
//! | `CALSYNC_SYNC_CRON` | `sync.cron_expression` |
//! | `CALSYNC_PASS_TIMEOUT_SECS` | `sync.pass_timeout_secs` |
//! | `CALSYNC_MAX_CONCURRENT_PASSES` | `sync.max_concurrent_passes` |
//! | `CALSYNC_TOKEN_REFRESH_SKEW_SECS` | `sync.token_refresh_skew_secs` |
//! | `CALSYNC_WEBHOOK_TTL_SECS` | `sync.webhook_ttl_secs` |
//! | `CALSYNC_WEBHOOK_RENEW_BEFORE_SECS` | `sync.webhook_renew_before_secs` |
//! | `CALSYNC_RENEW_CRON` | `sync.renew_cron` |
//! | `CALSYNC_SWEEP_CRON` | `sync.sweep_cron` |
//! | `CALSYNC_QUEUE_CAPACITY` | `sync.queue_capacity` |
//! | `CALSYNC_AUTH_STATE_TTL_SECS` | `sync.authorization_state_ttl_secs` |
//! | `CALSYNC_GOOGLE_API_BASE` | `providers.google.api_base` |
//! | `CALSYNC_GOOGLE_TOKEN_ENDPOINT` | `providers.google.token_endpoint` |
//! | `CALSYNC_GOOGLE_CLIENT_ID` | `providers.google.client_id` |
//! | `CALSYNC_GOOGLE_CLIENT_SECRET` | `providers.google.client_secret` |
//! | `CALSYNC_NOTION_API_BASE` | `providers.notion.api_base` |
//! | `CALSYNC_NOTION_VERSION` | `providers.notion.notion_version` |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calsync_domain::{CalSyncError, Config, Result};

/// Load configuration, environment first, then file.
///
/// # Errors
/// Returns `CalSyncError::Config` if neither source yields a valid config.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from `CALSYNC_*` environment variables.
///
/// Only `CALSYNC_DB_PATH` is required; everything else keeps its default
/// unless set.
///
/// # Errors
/// Returns `CalSyncError::Config` if `CALSYNC_DB_PATH` is missing or a
/// numeric variable does not parse.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    config.database.path = env_var("CALSYNC_DB_PATH")?;
    config.database.pool_size = env_parse("CALSYNC_DB_POOL_SIZE", config.database.pool_size)?;

    config.vault.dev_mode = env_bool("CALSYNC_VAULT_DEV_MODE", config.vault.dev_mode);

    env_override("CALSYNC_BIND_ADDR", &mut config.server.bind_addr);
    env_override("CALSYNC_PUBLIC_BASE_URL", &mut config.server.public_base_url);

    let sync = &mut config.sync;
    sync.enabled = env_bool("CALSYNC_SYNC_ENABLED", sync.enabled);
    env_override("CALSYNC_SYNC_CRON", &mut sync.cron_expression);
    sync.pass_timeout_secs = env_parse("CALSYNC_PASS_TIMEOUT_SECS", sync.pass_timeout_secs)?;
    sync.max_concurrent_passes =
        env_parse("CALSYNC_MAX_CONCURRENT_PASSES", sync.max_concurrent_passes)?;
    sync.token_refresh_skew_secs =
        env_parse("CALSYNC_TOKEN_REFRESH_SKEW_SECS", sync.token_refresh_skew_secs)?;
    sync.webhook_ttl_secs = env_parse("CALSYNC_WEBHOOK_TTL_SECS", sync.webhook_ttl_secs)?;
    sync.webhook_renew_before_secs =
        env_parse("CALSYNC_WEBHOOK_RENEW_BEFORE_SECS", sync.webhook_renew_before_secs)?;
    env_override("CALSYNC_RENEW_CRON", &mut sync.renew_cron);
    env_override("CALSYNC_SWEEP_CRON", &mut sync.sweep_cron);
    sync.queue_capacity = env_parse("CALSYNC_QUEUE_CAPACITY", sync.queue_capacity)?;
    sync.authorization_state_ttl_secs =
        env_parse("CALSYNC_AUTH_STATE_TTL_SECS", sync.authorization_state_ttl_secs)?;

    let google = &mut config.providers.google;
    env_override("CALSYNC_GOOGLE_API_BASE", &mut google.api_base);
    env_override("CALSYNC_GOOGLE_TOKEN_ENDPOINT", &mut google.token_endpoint);
    env_override("CALSYNC_GOOGLE_CLIENT_ID", &mut google.client_id);

    let notion = &mut config.providers.notion;
    env_override("CALSYNC_NOTION_API_BASE", &mut notion.api_base);
    env_override("CALSYNC_NOTION_VERSION", &mut notion.notion_version);

    apply_secret_overrides(&mut config);
    Ok(config)
}

/// Load configuration from a file.
///
/// If `path` is `None`, [`probe_config_paths`] picks the file.
///
/// # Errors
/// Returns `CalSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CalSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CalSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CalSyncError::Config(format!("Failed to read config file: {e}")))?;

    let mut config = parse_config(&contents, &config_path)?;
    apply_secret_overrides(&mut config);
    Ok(config)
}

/// Parse configuration text; the format follows the file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CalSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file.
///
/// Checks `config.{json,toml}` and `calsync.{json,toml}` in the working
/// directory, then `config.*` up to two parents, then the same set next to
/// the executable. Returns the first file that exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("calsync.json"),
        dir.join("calsync.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

fn apply_secret_overrides(config: &mut Config) {
    if let Some(secret) = env_opt("CALSYNC_VAULT_SECRET") {
        config.vault.secret = Some(secret);
    }
    env_override("CALSYNC_GOOGLE_CLIENT_SECRET", &mut config.providers.google.client_secret);
}

/// Required environment variable.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        CalSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Set, non-blank environment variable.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_override(key: &str, target: &mut String) {
    if let Some(value) = env_opt(key) {
        *target = value;
    }
}

/// Parse an optional numeric variable, keeping `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| CalSyncError::Config(format!("Invalid value for {key}: {e}"))),
        None => Ok(default),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off`, ignoring case.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
