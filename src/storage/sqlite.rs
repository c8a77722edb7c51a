//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::record::ChurchRecord;
use crate::state::{SessionStatus, SessionTotals};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{GroupBy, Storage, StorageError, StorageResult};
use crate::storage::{ChurchFilter, ScrapeErrorRecord, ScrapeSessionRecord, SessionSummary};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const SESSION_COLUMNS: &str = "id, status, started_at, finished_at, config_hash, options_snapshot,
     error_message, found, new_count, duplicate_count, updated_count, error_count";

const CHURCH_COLUMNS: &str = "id, name, jurisdiction, address, city, state, zip_code, clergy_contact,
     website, contact_phone, contact_email, search_keywords, source_url, dedup_key,
     first_session_id, last_session_id, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database file and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `busy_timeout` - How long a statement waits for another writer
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError::Unavailable)` - The file cannot be opened or initialized
    pub fn new(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let unavailable =
            |e: rusqlite::Error| StorageError::Unavailable(format!("{}: {}", path.display(), e));

        let conn = Connection::open(path).map_err(unavailable)?;
        conn.busy_timeout(busy_timeout).map_err(unavailable)?;

        // WAL lets readers (statistics) run alongside the session writer
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(unavailable)?;

        initialize_schema(&conn).map_err(unavailable)?;

        Ok(Self { conn })
    }

    /// Opens an existing database for reading only
    ///
    /// The file is never created and the schema is not touched; a missing file
    /// is [`StorageError::Unavailable`]. Writes fail with `SQLITE_READONLY`.
    pub fn open_read_only(path: &Path, busy_timeout: Duration) -> StorageResult<Self> {
        let unavailable =
            |e: rusqlite::Error| StorageError::Unavailable(format!("{}: {}", path.display(), e));

        // Read-write without CREATE, so WAL shared memory can still be set up
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(unavailable)?;
        conn.busy_timeout(busy_timeout).map_err(unavailable)?;
        conn.execute_batch("PRAGMA query_only = ON;").map_err(unavailable)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction
    ///
    /// The write lock is taken up front, so a lookup made inside `f` cannot be
    /// invalidated by another connection before `f` writes. Any error rolls the
    /// transaction back.
    pub fn immediate<T>(&mut self, f: impl FnOnce(&mut Self) -> StorageResult<T>) -> StorageResult<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;

        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });

        if result.is_err() && !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
        result
    }

    /// Runs `f` inside one read transaction
    ///
    /// Every query made by `f` sees the same snapshot of the database, even
    /// while a session keeps writing through another connection.
    pub fn snapshot<T>(&mut self, f: impl FnOnce(&Self) -> StorageResult<T>) -> StorageResult<T> {
        self.conn.execute_batch("BEGIN DEFERRED")?;
        let result = f(self);
        if !self.conn.is_autocommit() {
            let _ = self.conn.execute_batch("COMMIT");
        }
        result
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn status_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<SessionStatus> {
    let raw: String = row.get(idx)?;
    SessionStatus::from_db_string(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown session status '{}'", raw).into(),
        )
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeSessionRecord> {
    let count = |idx: usize| row.get::<_, i64>(idx).map(|v| v.max(0) as u64);

    Ok(ScrapeSessionRecord {
        id: row.get(0)?,
        status: status_from_row(row, 1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        config_hash: row.get(4)?,
        options_snapshot: row.get(5)?,
        error_message: row.get(6)?,
        totals: SessionTotals {
            found: count(7)?,
            new: count(8)?,
            duplicate: count(9)?,
            updated: count(10)?,
            errors: count(11)?,
        },
    })
}

fn church_from_row(row: &Row<'_>) -> rusqlite::Result<ChurchRecord> {
    Ok(ChurchRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        jurisdiction: row.get(2)?,
        address: row.get(3)?,
        city: row.get(4)?,
        state: row.get(5)?,
        zip_code: row.get(6)?,
        clergy_contact: row.get(7)?,
        website: row.get(8)?,
        contact_phone: row.get(9)?,
        contact_email: row.get(10)?,
        search_keywords: row.get(11)?,
        source_url: row.get(12)?,
        dedup_key: row.get(13)?,
        first_session_id: row.get(14)?,
        last_session_id: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

fn error_from_row(row: &Row<'_>) -> rusqlite::Result<ScrapeErrorRecord> {
    Ok(ScrapeErrorRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        source: row.get(2)?,
        url: row.get(3)?,
        kind: row.get(4)?,
        message: row.get(5)?,
        occurred_at: row.get(6)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Sessions =====

    fn create_session(&mut self, session: &ScrapeSessionRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO sessions (id, status, started_at, finished_at, config_hash,
             options_snapshot, error_message, found, new_count, duplicate_count,
             updated_count, error_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                session.id,
                session.status.to_db_string(),
                session.started_at,
                session.finished_at,
                session.config_hash,
                session.options_snapshot,
                session.error_message,
                to_i64(session.totals.found),
                to_i64(session.totals.new),
                to_i64(session.totals.duplicate),
                to_i64(session.totals.updated),
                to_i64(session.totals.errors),
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> StorageResult<ScrapeSessionRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![id],
                session_from_row,
            )
            .optional()?
            .ok_or_else(|| StorageError::SessionNotFound(id.to_string()))
    }

    fn update_session_status(&mut self, id: &str, status: SessionStatus) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), id],
        )?;
        if changed == 0 {
            return Err(StorageError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn add_session_totals(&mut self, id: &str, delta: &SessionTotals) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET
                found = found + ?1,
                new_count = new_count + ?2,
                duplicate_count = duplicate_count + ?3,
                updated_count = updated_count + ?4,
                error_count = error_count + ?5
             WHERE id = ?6",
            params![
                to_i64(delta.found),
                to_i64(delta.new),
                to_i64(delta.duplicate),
                to_i64(delta.updated),
                to_i64(delta.errors),
                id
            ],
        )?;
        if changed == 0 {
            return Err(StorageError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn finish_session(
        &mut self,
        id: &str,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET status = ?1, finished_at = ?2,
             error_message = COALESCE(?3, error_message)
             WHERE id = ?4",
            params![status.to_db_string(), Utc::now(), error_message, id],
        )?;
        if changed == 0 {
            return Err(StorageError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    fn list_sessions(&self, limit: usize) -> StorageResult<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {}, (SELECT COUNT(*) FROM scrape_errors e WHERE e.session_id = sessions.id)
             FROM sessions ORDER BY started_at DESC, rowid DESC LIMIT ?1",
            SESSION_COLUMNS
        ))?;

        let rows = stmt.query_map(params![to_i64(limit as u64)], |row| {
            Ok(SessionSummary {
                session: session_from_row(row)?,
                logged_errors: row.get::<_, i64>(12)?.max(0) as u64,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== Error log =====

    fn insert_error(&mut self, error: &ScrapeErrorRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO scrape_errors (session_id, source, url, kind, message, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                error.session_id,
                error.source,
                error.url,
                error.kind,
                error.message,
                error.occurred_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn errors_for_session(&self, session_id: &str) -> StorageResult<Vec<ScrapeErrorRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, source, url, kind, message, occurred_at
             FROM scrape_errors WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], error_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== Churches =====

    fn find_church_by_key(&self, dedup_key: &str) -> StorageResult<Option<ChurchRecord>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {} FROM churches WHERE dedup_key = ?1", CHURCH_COLUMNS),
                params![dedup_key],
                church_from_row,
            )
            .optional()?)
    }

    fn get_church(&self, id: i64) -> StorageResult<ChurchRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM churches WHERE id = ?1", CHURCH_COLUMNS),
                params![id],
                church_from_row,
            )
            .optional()?
            .ok_or(StorageError::ChurchNotFound(id))
    }

    fn upsert_church(&mut self, record: &ChurchRecord) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO churches (name, jurisdiction, address, city, state, zip_code,
             clergy_contact, website, contact_phone, contact_email, search_keywords,
             source_url, dedup_key, first_session_id, last_session_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
             ON CONFLICT(dedup_key) DO UPDATE SET
                address = COALESCE(NULLIF(excluded.address, ''), churches.address),
                zip_code = COALESCE(NULLIF(excluded.zip_code, ''), churches.zip_code),
                clergy_contact = COALESCE(NULLIF(excluded.clergy_contact, ''), churches.clergy_contact),
                website = COALESCE(NULLIF(excluded.website, ''), churches.website),
                contact_phone = COALESCE(NULLIF(excluded.contact_phone, ''), churches.contact_phone),
                contact_email = COALESCE(NULLIF(excluded.contact_email, ''), churches.contact_email),
                search_keywords = excluded.search_keywords,
                last_session_id = excluded.last_session_id,
                updated_at = excluded.updated_at",
            params![
                record.name,
                record.jurisdiction,
                record.address,
                record.city,
                record.state,
                record.zip_code,
                record.clergy_contact,
                record.website,
                record.contact_phone,
                record.contact_email,
                record.search_keywords,
                record.source_url,
                record.dedup_key,
                record.first_session_id,
                record.last_session_id,
                record.created_at,
                record.updated_at,
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM churches WHERE dedup_key = ?1",
            params![record.dedup_key],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn search_churches(&self, filter: &ChurchFilter) -> StorageResult<Vec<ChurchRecord>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();

        let exact = [
            ("jurisdiction", &filter.jurisdiction),
            ("state", &filter.state),
            ("city", &filter.city),
        ];
        for (column, value) in exact {
            if let Some(value) = value {
                values.push(value.trim().to_string());
                clauses.push(format!("lower({}) = lower(?{})", column, values.len()));
            }
        }

        if let Some(text) = filter.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            values.push(format!("%{}%", text));
            let n = values.len();
            clauses.push(format!(
                "(name LIKE ?{n} OR city LIKE ?{n} OR address LIKE ?{n}
                  OR clergy_contact LIKE ?{n} OR search_keywords LIKE ?{n})"
            ));
        }

        let mut sql = format!("SELECT {} FROM churches", CHURCH_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY name, id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), church_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn count_churches(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM churches", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn count_churches_by(&self, column: GroupBy, filter: &ChurchFilter) -> StorageResult<Vec<(String, u64)>> {
        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        for (name, value) in [("jurisdiction", &filter.jurisdiction), ("state", &filter.state)] {
            if let Some(value) = value {
                values.push(value.trim().to_string());
                clauses.push(format!("lower({}) = lower(?{})", name, values.len()));
            }
        }

        let column = column.column();
        let mut sql = format!("SELECT COALESCE({column}, ''), COUNT(*) FROM churches");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(&format!(" GROUP BY COALESCE({column}, '') ORDER BY COUNT(*) DESC, 1"));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?.max(0) as u64))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
