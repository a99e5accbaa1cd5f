use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads application configuration by merging the TOML file, prefixed
    /// environment variables, and the flat well-known variables
    /// (`DATABASE_URL`, `API_PORT`, `API_KEY_*`, `API_SECRET_*`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed, or
    /// if `API_PORT` is not a port number.
    pub fn load() -> Result<AppConfig> {
        let mut config: AppConfig = Figment::new()
            .merge(Toml::file("config/Config.toml"))
            .merge(Env::prefixed("SPREADSCAN_").split("__"))
            .extract()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = parse_api_port(&port)?;
        }
        if let Ok(key) = std::env::var("API_KEY_BINANCE") {
            config.binance.api_key = key;
        }
        if let Ok(secret) = std::env::var("API_SECRET_BINANCE") {
            config.binance.api_secret = secret;
        }
        if let Ok(key) = std::env::var("API_KEY_BACKPACK") {
            config.backpack.api_key = key;
        }
        if let Ok(secret) = std::env::var("API_SECRET_BACKPACK") {
            config.backpack.api_secret = secret;
        }

        Ok(config)
    }
}

/// Accepts both `8082` and the `:8082` form the original deployment used.
fn parse_api_port(raw: &str) -> Result<u16> {
    let trimmed = raw.trim_start_matches(':');
    trimmed
        .parse::<u16>()
        .map_err(|e| anyhow::anyhow!("invalid API_PORT {raw:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_port_plain() {
        assert_eq!(parse_api_port("8082").unwrap(), 8082);
    }

    #[test]
    fn test_parse_api_port_with_colon() {
        assert_eq!(parse_api_port(":8082").unwrap(), 8082);
    }

    #[test]
    fn test_parse_api_port_invalid() {
        assert!(parse_api_port("http").is_err());
    }
}
