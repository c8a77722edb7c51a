//! The single writer of a running session
//!
//! Every durable effect of a session goes through [`PersistenceGateway`]. With
//! `save-to-database` off the gateway still reads the store and classifies
//! candidates, but writes land in an in-memory overlay instead, so a dry run
//! reports exactly the totals a saving run would.

use crate::crawler::{Classification, Deduplicator};
use crate::record::{CandidateRecord, ChurchRecord};
use crate::state::{SessionStatus, SessionTotals};
use crate::storage::{
    ChurchFilter, ScrapeErrorRecord, ScrapeSessionRecord, SessionSummary, SqliteStorage, Storage,
    StorageError, StorageResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Serialized access to the shared store for one session
pub struct PersistenceGateway {
    store: Arc<Mutex<SqliteStorage>>,
    save: bool,
    overlay: Mutex<HashMap<String, ChurchRecord>>,
}

impl PersistenceGateway {
    /// Creates a gateway
    ///
    /// # Arguments
    ///
    /// * `store` - The shared store
    /// * `save` - When false, nothing is written to `store`
    pub fn new(store: Arc<Mutex<SqliteStorage>>, save: bool) -> Self {
        Self {
            store,
            save,
            overlay: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if writes reach the store
    pub fn is_saving(&self) -> bool {
        self.save
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
        self.store
            .lock()
            .map_err(|_| StorageError::Database("store lock poisoned".to_string()))
    }

    /// Classifies a candidate and commits the outcome in one step
    ///
    /// Lookup, classification and upsert run under the store lock inside an
    /// immediate transaction, so two in-flight tasks yielding the same key can
    /// never both see it as absent.
    ///
    /// # Returns
    ///
    /// The classification that was committed. For `New`, the record carries
    /// its assigned id.
    pub fn commit(
        &self,
        candidate: &CandidateRecord,
        dedup: &Deduplicator,
        session_id: &str,
    ) -> StorageResult<Classification> {
        let key = candidate.dedup_key();
        let mut store = self.lock()?;

        if !self.save {
            return self.commit_to_overlay(&store, &key, candidate, dedup, session_id);
        }

        store.immediate(|s| {
            let existing = if dedup.is_enabled() {
                s.find_church_by_key(&key)?
            } else {
                None
            };

            let mut classification = dedup.classify(candidate, existing.as_ref(), session_id);
            match &mut classification {
                Classification::New(record) => record.id = s.upsert_church(record)?,
                Classification::Update { merged, .. } => {
                    s.upsert_church(merged)?;
                }
                Classification::Duplicate { .. } => {}
            }
            Ok(classification)
        })
    }

    fn commit_to_overlay(
        &self,
        store: &SqliteStorage,
        key: &str,
        candidate: &CandidateRecord,
        dedup: &Deduplicator,
        session_id: &str,
    ) -> StorageResult<Classification> {
        let mut overlay = self
            .overlay
            .lock()
            .map_err(|_| StorageError::Database("overlay lock poisoned".to_string()))?;

        let existing = if dedup.is_enabled() {
            match overlay.get(key) {
                Some(record) => Some(record.clone()),
                None => store.find_church_by_key(key)?,
            }
        } else {
            None
        };

        let mut classification = dedup.classify(candidate, existing.as_ref(), session_id);
        match &mut classification {
            Classification::New(record) => {
                record.id = -(overlay.len() as i64 + 1);
                overlay.insert(key.to_string(), record.clone());
            }
            Classification::Update { merged, .. } => {
                overlay.insert(key.to_string(), merged.clone());
            }
            Classification::Duplicate { .. } => {}
        }

        debug!(key, outcome = classification.label(), "Dry-run classification");
        Ok(classification)
    }

    /// Appends a row to the error log
    pub fn record_error(&self, error: &ScrapeErrorRecord) -> StorageResult<()> {
        if !self.save {
            return Ok(());
        }
        self.lock()?.insert_error(error)?;
        Ok(())
    }

    /// Adds `delta` to the stored session counters
    pub fn update_session_totals(&self, session_id: &str, delta: &SessionTotals) -> StorageResult<()> {
        if !self.save {
            return Ok(());
        }
        self.lock()?.add_session_totals(session_id, delta)
    }

    pub fn create_session(&self, session: &ScrapeSessionRecord) -> StorageResult<()> {
        if !self.save {
            return Ok(());
        }
        self.lock()?.create_session(session)
    }

    pub fn update_session_status(&self, session_id: &str, status: SessionStatus) -> StorageResult<()> {
        if !self.save {
            return Ok(());
        }
        self.lock()?.update_session_status(session_id, status)
    }

    pub fn finish_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        if !self.save {
            return Ok(());
        }
        self.lock()?.finish_session(session_id, status, error_message)
    }

    // ===== Read surface =====

    pub fn search_churches(&self, filter: &ChurchFilter) -> StorageResult<Vec<ChurchRecord>> {
        self.lock()?.search_churches(filter)
    }

    pub fn list_sessions(&self, limit: usize) -> StorageResult<Vec<SessionSummary>> {
        self.lock()?.list_sessions(limit)
    }

    pub fn errors_for_session(&self, session_id: &str) -> StorageResult<Vec<ScrapeErrorRecord>> {
        self.lock()?.errors_for_session(session_id)
    }
}
