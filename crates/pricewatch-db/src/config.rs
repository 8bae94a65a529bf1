use std::time::Duration;

use pricewatch_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DATABASE_URL` (required; the sqlx convention)
    /// - `PRICEWATCH_DB_MAX_CONNECTIONS` (optional, defaults to 5)
    /// - `PRICEWATCH_DB_ACQUIRE_TIMEOUT_SECS` (optional, defaults to 10)
    pub fn from_env() -> Result<Self, AppError> {
        let url = std::env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigError("DATABASE_URL not set. Required for database operations.".into())
        })?;

        let max_connections = positive_var("PRICEWATCH_DB_MAX_CONNECTIONS", 5)?;
        let acquire_timeout =
            Duration::from_secs(positive_var("PRICEWATCH_DB_ACQUIRE_TIMEOUT_SECS", 10)?.into());

        Ok(Self {
            url,
            max_connections,
            acquire_timeout,
        })
    }
}

fn positive_var(name: &str, default: u32) -> Result<u32, AppError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => {
            let parsed: u32 = raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid {name} '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(format!(
                    "{name} must be at least 1"
                )));
            }
            Ok(parsed)
        }
    }
}
