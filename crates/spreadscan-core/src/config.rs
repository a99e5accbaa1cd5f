use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub binance: VenueKeys,
    #[serde(default)]
    pub backpack: VenueKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. Empty means "not configured" and is a
    /// startup error.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
        }
    }
}

/// Periods for the four job families, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub spot_period_secs: u64,
    pub network_period_secs: u64,
    pub futures_period_secs: u64,
    pub diff_period_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            spot_period_secs: 20,
            network_period_secs: 150,
            futures_period_secs: 10,
            diff_period_secs: 10,
        }
    }
}

/// API credentials for a venue's signed endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueKeys {
    pub api_key: String,
    pub api_secret: String,
}

impl VenueKeys {
    /// True when both key and secret are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            binance: VenueKeys::default(),
            backpack: VenueKeys::default(),
        }
    }
}
