//! Application configuration loaded from environment variables.

use checkout::payment::DEFAULT_SUCCESS_RATE;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset runs in memory
/// - `PAYMENT_SUCCESS_RATE`: approval probability for card charges (default `0.9`)
/// - `CATALOG_FILE`: JSON array of products to seed at start-up
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub payment_success_rate: f64,
    pub catalog_file: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            payment_success_rate: lookup("PAYMENT_SUCCESS_RATE")
                .and_then(|r| r.parse::<f64>().ok())
                .filter(|r| r.is_finite())
                .map_or(defaults.payment_success_rate, |r| r.clamp(0.0, 1.0)),
            catalog_file: lookup("CATALOG_FILE").filter(|path| !path.trim().is_empty()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            payment_success_rate: DEFAULT_SUCCESS_RATE,
            catalog_file: None,
        }
    }
}
