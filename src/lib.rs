//! Vespers: a church directory crawl engine
//!
//! This crate crawls independent directory sources, cleans and validates the
//! extracted church records, reconciles them against the records already known,
//! and persists a deduplicated dataset together with an audit trail of every
//! crawl session.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod robots;
pub mod source;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Vespers operations
#[derive(Debug, Error)]
pub enum VespersError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Source error: {0}")]
    Source(#[from] source::SourceError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: state::SessionStatus,
        to: state::SessionStatus,
    },

    #[error("Fatal engine error: {0}")]
    Fatal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize options: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Vespers operations
pub type Result<T> = std::result::Result<T, VespersError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlResult, Engine};
pub use record::{CandidateRecord, ChurchRecord};
pub use state::{SessionStatus, TaskStatus};
