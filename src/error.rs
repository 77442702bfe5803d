//! Error types for the vigil harness

use thiserror::Error;

/// Main error type for vigil operations
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Navigation to '{0}' failed: {1}")]
    NavigationError(String, String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Suite '{0}' not found")]
    SuiteNotFound(String),
}

/// Result type alias for vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;
