//! Storage module for persisting crawl results
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Session rows and their counters
//! - The append-only scrape-error log
//! - The deduplicated church directory and its read queries
//! - [`PersistenceGateway`], the single writer used by a running session

mod gateway;
mod schema;
mod sqlite;
mod traits;

pub use gateway::PersistenceGateway;
pub use sqlite::SqliteStorage;
pub use traits::{GroupBy, Storage, StorageError, StorageResult};

use crate::state::{SessionStatus, SessionTotals};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Opens (creating if needed) the database at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
/// * `busy_timeout` - How long a statement waits on a locked database
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError::Unavailable)` - The file cannot be opened or initialized
pub fn open_storage(path: &Path, busy_timeout: Duration) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path, busy_timeout)
}

/// A crawl session as stored
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSessionRecord {
    pub id: String,
    #[serde(serialize_with = "serialize_status")]
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    /// TOML of the options the session ran with
    pub options_snapshot: String,
    /// Descriptive message of a fatal failure
    pub error_message: Option<String>,
    pub totals: SessionTotals,
}

/// One failure logged during a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrapeErrorRecord {
    /// Row id; 0 until stored
    pub id: i64,
    pub session_id: String,
    /// Source id, or "engine" for session-level failures
    pub source: String,
    pub url: Option<String>,
    /// One of `fetch`, `parse`, `panic`, `validation`, `persistence`, `config`, `cancelled`
    pub kind: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ScrapeErrorRecord {
    pub fn new(session_id: &str, source: &str, url: Option<&str>, kind: &str, message: &str) -> Self {
        Self {
            id: 0,
            session_id: session_id.to_string(),
            source: source.to_string(),
            url: url.map(str::to_string),
            kind: kind.to_string(),
            message: message.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// A session row with the size of its error log
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session: ScrapeSessionRecord,
    pub logged_errors: u64,
}

/// Read-side filter over the church directory
///
/// Jurisdiction, state and city match case-insensitively; `text` is a substring
/// match over name, city, address, clergy contact and search keywords.
#[derive(Debug, Clone, Default)]
pub struct ChurchFilter {
    pub jurisdiction: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub text: Option<String>,
    pub limit: Option<usize>,
}

fn serialize_status<S: serde::Serializer>(status: &SessionStatus, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(status.to_db_string())
}
