use thiserror::Error;

/// Application-wide error types for pricewatch.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed (fetching a search page).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Headless-browser session failed.
    #[error("Browser error: {0}")]
    BrowserError(String),

    /// Site or job configuration is invalid (inactive site, missing
    /// selector, empty search-term set). Always job-fatal.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) => true,
            AppError::HttpError(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }

    /// Returns true if this error must abort the whole job rather than
    /// just the current search term or record.
    pub fn is_config_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_))
    }
}
