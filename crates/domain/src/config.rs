//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "calsync.db".to_string(), pool_size: default_pool_size() }
    }
}

/// Credential vault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Long-lived secret the vault key is derived from.
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,
    /// Allow the labelled insecure default when no secret is configured.
    #[serde(default)]
    pub dev_mode: bool,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Externally reachable base URL, used to build webhook callbacks.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: default_bind_addr(), public_base_url: default_public_base_url() }
    }
}

impl ServerConfig {
    /// Callback address handed to push-capable providers.
    pub fn webhook_callback_url(&self) -> String {
        format!("{}/webhooks/google", self.public_base_url.trim_end_matches('/'))
    }
}

/// Sync scheduling and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sync_cron")]
    pub cron_expression: String,
    #[serde(default = "default_pass_timeout_secs")]
    pub pass_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_passes")]
    pub max_concurrent_passes: usize,
    #[serde(default = "default_token_refresh_skew_secs")]
    pub token_refresh_skew_secs: i64,
    #[serde(default = "default_webhook_ttl_secs")]
    pub webhook_ttl_secs: u64,
    #[serde(default = "default_webhook_renew_before_secs")]
    pub webhook_renew_before_secs: i64,
    #[serde(default = "default_renew_cron")]
    pub renew_cron: String,
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_authorization_state_ttl_secs")]
    pub authorization_state_ttl_secs: i64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: default_sync_cron(),
            pass_timeout_secs: default_pass_timeout_secs(),
            max_concurrent_passes: default_max_concurrent_passes(),
            token_refresh_skew_secs: default_token_refresh_skew_secs(),
            webhook_ttl_secs: default_webhook_ttl_secs(),
            webhook_renew_before_secs: default_webhook_renew_before_secs(),
            renew_cron: default_renew_cron(),
            sweep_cron: default_sweep_cron(),
            queue_capacity: default_queue_capacity(),
            authorization_state_ttl_secs: default_authorization_state_ttl_secs(),
        }
    }
}

impl SyncConfig {
    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }

    pub fn webhook_ttl(&self) -> Duration {
        Duration::from_secs(self.webhook_ttl_secs)
    }

    pub fn token_refresh_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.token_refresh_skew_secs)
    }

    pub fn webhook_renew_before(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.webhook_renew_before_secs)
    }

    pub fn authorization_state_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.authorization_state_ttl_secs)
    }
}

/// Per-provider endpoints and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub notion: NotionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_google_api_base")]
    pub api_base: String,
    #[serde(default = "default_google_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            api_base: default_google_api_base(),
            token_endpoint: default_google_token_endpoint(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub notion_version: String,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self { api_base: default_notion_api_base(), notion_version: default_notion_version() }
    }
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    8
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_sync_cron() -> String {
    "0 */5 * * * *".to_string()
}

fn default_pass_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent_passes() -> usize {
    4
}

fn default_token_refresh_skew_secs() -> i64 {
    60
}

fn default_webhook_ttl_secs() -> u64 {
    604_800
}

fn default_webhook_renew_before_secs() -> i64 {
    86_400
}

fn default_renew_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

fn default_authorization_state_ttl_secs() -> i64 {
    600
}

fn default_google_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

fn default_google_token_endpoint() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_notion_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}

fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
