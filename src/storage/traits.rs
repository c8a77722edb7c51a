//! Storage traits and error types

use crate::record::ChurchRecord;
use crate::state::{SessionStatus, SessionTotals};
use crate::storage::{ChurchFilter, ScrapeErrorRecord, ScrapeSessionRecord, SessionSummary};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    /// The store cannot be opened or has gone away
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Church not found: {0}")]
    ChurchNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if further writes in this session are pointless
    ///
    /// Busy/locked errors are not included: they are per-statement.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Io(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::CannotOpen
                    | rusqlite::ErrorCode::SystemIoFailure
                    | rusqlite::ErrorCode::ReadOnly
                    | rusqlite::ErrorCode::DiskFull
                    | rusqlite::ErrorCode::NotADatabase
                    | rusqlite::ErrorCode::DatabaseCorrupt
            ),
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Writers take `&mut self`; callers share a backend behind a mutex.
pub trait Storage {
    // ===== Sessions =====

    /// Inserts a new session row
    fn create_session(&mut self, session: &ScrapeSessionRecord) -> StorageResult<()>;

    /// Gets a session by ID
    fn get_session(&self, id: &str) -> StorageResult<ScrapeSessionRecord>;

    /// Sets the status of a session
    fn update_session_status(&mut self, id: &str, status: SessionStatus) -> StorageResult<()>;

    /// Adds `delta` to the session counters
    fn add_session_totals(&mut self, id: &str, delta: &SessionTotals) -> StorageResult<()>;

    /// Sets a terminal status, the finish timestamp and an optional error message
    fn finish_session(
        &mut self,
        id: &str,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Lists sessions newest first, with their error-log counts
    fn list_sessions(&self, limit: usize) -> StorageResult<Vec<SessionSummary>>;

    // ===== Error log =====

    /// Appends an error row
    ///
    /// # Returns
    ///
    /// The ID of the new row
    fn insert_error(&mut self, error: &ScrapeErrorRecord) -> StorageResult<i64>;

    /// Gets every error logged for a session, oldest first
    fn errors_for_session(&self, session_id: &str) -> StorageResult<Vec<ScrapeErrorRecord>>;

    // ===== Churches =====

    /// Looks up a church by its identity key
    fn find_church_by_key(&self, dedup_key: &str) -> StorageResult<Option<ChurchRecord>>;

    /// Gets a church by ID
    fn get_church(&self, id: i64) -> StorageResult<ChurchRecord>;

    /// Inserts a church, or merges it into the row with the same key
    ///
    /// On conflict, identity fields and provenance are kept, non-empty
    /// incoming material fields win and empty ones never erase stored data.
    ///
    /// # Returns
    ///
    /// The ID of the inserted or merged row
    fn upsert_church(&mut self, record: &ChurchRecord) -> StorageResult<i64>;

    /// Filters the directory
    fn search_churches(&self, filter: &ChurchFilter) -> StorageResult<Vec<ChurchRecord>>;

    /// Gets total church count
    fn count_churches(&self) -> StorageResult<u64>;

    /// Counts churches per distinct value of `column`, largest group first
    ///
    /// Only the jurisdiction and state of `filter` apply. Rows without a value
    /// are grouped under an empty string.
    fn count_churches_by(&self, column: GroupBy, filter: &ChurchFilter) -> StorageResult<Vec<(String, u64)>>;
}

/// Column the directory statistics are grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Jurisdiction,
    State,
}

impl GroupBy {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Jurisdiction => "jurisdiction",
            Self::State => "state",
        }
    }
}
