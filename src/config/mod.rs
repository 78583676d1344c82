//! Configuration loading.

use serde::Deserialize;

/// Complete pulseboard configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PulseboardConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Base URL providers redirect back to (no trailing slash)
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    #[serde(default = "default_auth_enabled")]
    pub auth_enabled: bool,
    #[serde(default = "default_credentials_db_path")]
    pub credentials_db_path: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_auth_enabled() -> bool {
    true
}

fn default_credentials_db_path() -> String {
    "credentials.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            callback_base_url: default_callback_base_url(),
            auth_enabled: default_auth_enabled(),
            credentials_db_path: default_credentials_db_path(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Default entry TTL (seconds)
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: i64,
    /// How often the background sweep removes expired entries (seconds)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_cache_ttl() -> i64 {
    300
}

fn default_sweep_interval() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

/// Token lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Skew buffer subtracted from token expiry when deciding to refresh (seconds)
    #[serde(default = "default_skew")]
    pub skew_seconds: i64,
    /// How long a pending OAuth authorization stays redeemable (seconds)
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
}

fn default_skew() -> i64 {
    60
}

fn default_state_expiry() -> i64 {
    600
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            skew_seconds: default_skew(),
            state_expiry_seconds: default_state_expiry(),
        }
    }
}

/// Metrics sync configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Trailing window of days pulled per sync cycle
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Interval between scheduled sync cycles (seconds)
    #[serde(default = "default_sync_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_snapshots_db_path")]
    pub snapshots_db_path: String,
}

fn default_window_days() -> i64 {
    30
}

fn default_sync_interval() -> u64 {
    3600
}

fn default_snapshots_db_path() -> String {
    "snapshots.db".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            interval_seconds: default_sync_interval(),
            snapshots_db_path: default_snapshots_db_path(),
        }
    }
}

impl Default for PulseboardConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            token: TokenConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<PulseboardConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: PulseboardConfig = toml::from_str(&contents)?;
    Ok(config)
}
