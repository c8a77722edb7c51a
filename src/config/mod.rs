//! Configuration module for Vespers
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use vespers::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("vespers.toml")).unwrap();
//! println!("Crawling {} sources", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DatabaseConfig, EngineOptions, RetryConfig, SelectorConfig, SourceEntry, SourceKind,
    UserAgentConfig,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config, snapshot};
pub use validation::{check_runtime_limits, validate, MAX_ATTEMPTS, MAX_CONCURRENT_SCRAPERS};
