//! Session lifecycle
//!
//! [`SessionManager`] owns the session for the whole run: its status, running
//! totals and error log. Collaborators report into it; it mirrors every change
//! to the store while the store is reachable and keeps going in memory once it
//! is not.

use crate::state::{SessionStatus, SessionTotals};
use crate::storage::{PersistenceGateway, ScrapeErrorRecord, ScrapeSessionRecord, StorageError, StorageResult};
use crate::VespersError;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Source name used on error rows that belong to the session itself
pub const ENGINE_SOURCE: &str = "engine";

/// How a session ended, as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Aborted before any task was dispatched
    Fatal(String),

    /// Every task reached a terminal state
    Finished {
        succeeded: usize,
        failed: usize,
        /// Cancelled, or cut short by losing the store
        interrupted: bool,
    },
}

impl SessionOutcome {
    /// Final status for this outcome
    ///
    /// Candidate-level rejects do not appear here; they never downgrade a session.
    pub fn status(&self, store_lost: bool) -> SessionStatus {
        match self {
            Self::Fatal(_) => SessionStatus::Failed,
            Self::Finished { succeeded: 0, .. } => SessionStatus::Failed,
            Self::Finished { failed, interrupted, .. } if *failed > 0 || *interrupted || store_lost => {
                SessionStatus::Partial
            }
            Self::Finished { .. } => SessionStatus::Completed,
        }
    }
}

pub struct SessionManager {
    session: ScrapeSessionRecord,
    gateway: Option<Arc<PersistenceGateway>>,
    errors: Vec<ScrapeErrorRecord>,
    store_lost: Option<String>,
    /// Writes that failed even after a retry while the store stayed reachable
    dropped_writes: u32,
}

impl SessionManager {
    /// Creates a `pending` session with a fresh id
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the options file
    /// * `options_snapshot` - TOML of the effective options
    pub fn open(config_hash: &str, options_snapshot: String) -> Self {
        let session = ScrapeSessionRecord {
            id: Uuid::new_v4().to_string(),
            status: SessionStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            config_hash: config_hash.to_string(),
            options_snapshot,
            error_message: None,
            totals: SessionTotals::default(),
        };

        info!(session = %session.id, "Session opened");
        Self {
            session,
            gateway: None,
            errors: Vec::new(),
            store_lost: None,
            dropped_writes: 0,
        }
    }

    /// Connects the session to the store and writes its row
    pub fn attach(&mut self, gateway: Arc<PersistenceGateway>) -> StorageResult<()> {
        gateway.create_session(&self.session)?;
        self.gateway = Some(gateway);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn session(&self) -> &ScrapeSessionRecord {
        &self.session
    }

    pub fn totals(&self) -> SessionTotals {
        self.session.totals
    }

    /// Every error logged so far, in order
    pub fn errors(&self) -> &[ScrapeErrorRecord] {
        &self.errors
    }

    pub fn store_lost(&self) -> bool {
        self.store_lost.is_some()
    }

    /// Stops all further writes; the session carries on in memory
    pub fn mark_store_lost(&mut self, message: &str) {
        if self.store_lost.is_none() {
            error!(session = %self.session.id, error = message, "Store lost, continuing in memory");
            self.store_lost = Some(message.to_string());
        }
    }

    fn transition(&mut self, next: SessionStatus) -> Result<(), VespersError> {
        if !self.session.status.can_transition_to(next) {
            return Err(VespersError::InvalidTransition {
                from: self.session.status,
                to: next,
            });
        }
        self.session.status = next;
        Ok(())
    }

    /// Runs a write against the store unless it is detached or lost
    ///
    /// A write failing for any other reason than losing the store (a busy
    /// database, say) is retried once; if that fails too it is counted and
    /// reported on the session's error message at close.
    fn persist(&mut self, write: impl Fn(&PersistenceGateway) -> StorageResult<()>) {
        if self.store_lost() {
            return;
        }
        let Some(gateway) = &self.gateway else { return };

        let failure = match write(gateway) {
            Ok(()) => return,
            Err(e) if e.is_unavailable() => e,
            Err(e) => {
                warn!(session = %self.session.id, error = %e, "Session write failed, retrying");
                match write(gateway) {
                    Ok(()) => return,
                    Err(e) => e,
                }
            }
        };

        if failure.is_unavailable() {
            self.mark_store_lost(&failure.to_string());
        } else {
            error!(session = %self.session.id, error = %failure, "Session write dropped");
            self.dropped_writes += 1;
        }
    }

    /// Moves the session to `running`
    pub fn mark_running(&mut self) -> Result<(), VespersError> {
        self.transition(SessionStatus::Running)?;
        let id = self.session.id.clone();
        self.persist(|g| g.update_session_status(&id, SessionStatus::Running));
        Ok(())
    }

    /// Adds a delta to the running totals
    pub fn record(&mut self, delta: SessionTotals) {
        self.session.totals += delta;
        let id = self.session.id.clone();
        self.persist(|g| g.update_session_totals(&id, &delta));
    }

    /// Appends an entry to the session's error log
    ///
    /// # Arguments
    ///
    /// * `source` - Source id, or [`ENGINE_SOURCE`]
    /// * `url` - URL involved, if any
    /// * `kind` - `fetch`, `parse`, `panic`, `validation`, `persistence`, `config` or `cancelled`
    /// * `message` - Human-readable description
    pub fn log_error(&mut self, source: &str, url: Option<&str>, kind: &str, message: &str) {
        let record = ScrapeErrorRecord::new(&self.session.id, source, url, kind, message);
        self.persist(|g| g.record_error(&record));
        self.errors.push(record);
    }

    /// Reports a failed store write made on the session's behalf
    pub fn storage_failure(&mut self, error: &StorageError) {
        if error.is_unavailable() {
            self.mark_store_lost(&error.to_string());
        }
    }

    /// Moves the session to its terminal status and writes the final row
    ///
    /// # Returns
    ///
    /// * `Ok(SessionStatus)` - The terminal status
    /// * `Err(VespersError::InvalidTransition)` - The session was already closed
    pub fn close(&mut self, outcome: SessionOutcome) -> Result<SessionStatus, VespersError> {
        let status = outcome.status(self.store_lost());
        self.transition(status)?;

        self.session.finished_at = Some(Utc::now());

        let mut messages = Vec::new();
        match &outcome {
            SessionOutcome::Fatal(message) => messages.push(message.clone()),
            SessionOutcome::Finished { .. } => messages.extend(self.store_lost.clone()),
        }
        if self.dropped_writes > 0 {
            messages.push(format!(
                "{} session write(s) not saved; stored totals and error log are incomplete",
                self.dropped_writes
            ));
        }
        self.session.error_message = (!messages.is_empty()).then(|| messages.join("; "));

        let id = self.session.id.clone();
        let message = self.session.error_message.clone();
        self.persist(|g| g.finish_session(&id, status, message.as_deref()));

        let totals = self.session.totals;
        info!(
            session = %self.session.id,
            status = %status,
            found = totals.found,
            new = totals.new,
            duplicate = totals.duplicate,
            updated = totals.updated,
            errors = totals.errors,
            "Session closed"
        );
        Ok(status)
    }
}
