//! Output module for session reports and directory statistics
//!
//! This module handles:
//! - Writing a markdown report for every closed session
//! - Exporting each session's classified records and error log as JSON and CSV
//! - Computing read-side directory statistics
//! - Printing summaries to the console

mod export;
mod markdown;
pub mod stats;

pub use export::{write_session_exports, ExportedRecord};
pub use markdown::{format_session_report, write_session_report};
pub use stats::{print_sessions, print_statistics, DirectoryStatistics, StatisticsAggregator, StatsFilter};

use thiserror::Error;

/// Errors from output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
