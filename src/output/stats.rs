//! Directory statistics
//!
//! Read-side summaries of the persisted directory and session history. Every
//! call opens its own read-only connection and runs inside one read
//! transaction, so it is safe alongside a running session and always sees a
//! consistent snapshot.

use crate::state::SessionTotals;
use crate::storage::{ChurchFilter, GroupBy, SessionSummary, SqliteStorage, Storage, StorageResult};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sessions included in a summary
const SESSION_HISTORY: usize = 20;

/// Restricts the directory counts; session totals are never filtered
#[derive(Debug, Clone, Default)]
pub struct StatsFilter {
    pub jurisdiction: Option<String>,
    pub state: Option<String>,
}

/// Totals of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionCounts {
    pub session_id: String,
    pub status: String,
    pub started_at: String,
    pub totals: SessionTotals,
    pub logged_errors: u64,
}

/// Directory statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryStatistics {
    /// Churches matching the filter
    pub total_churches: u64,

    /// Count per jurisdiction, largest first
    pub by_jurisdiction: Vec<(String, u64)>,

    /// Count per state code, largest first; empty string for unknown
    pub by_state: Vec<(String, u64)>,

    /// Most recent sessions, newest first
    pub sessions: Vec<SessionCounts>,
}

/// Computes [`DirectoryStatistics`] from a database file
pub struct StatisticsAggregator {
    path: PathBuf,
    busy_timeout: Duration,
}

impl StatisticsAggregator {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Summarizes the directory
    ///
    /// # Arguments
    ///
    /// * `filter` - Jurisdiction and/or state the church counts are restricted to
    ///
    /// # Returns
    ///
    /// * `Ok(DirectoryStatistics)` - Successfully computed statistics
    /// * `Err(StorageError)` - The database cannot be opened or queried
    pub fn summarize(&self, filter: &StatsFilter) -> StorageResult<DirectoryStatistics> {
        let mut storage = SqliteStorage::open_read_only(&self.path, self.busy_timeout)?;
        let church_filter = ChurchFilter {
            jurisdiction: filter.jurisdiction.clone(),
            state: filter.state.clone(),
            ..Default::default()
        };

        storage.snapshot(|s| {
            let by_jurisdiction = s.count_churches_by(GroupBy::Jurisdiction, &church_filter)?;
            let by_state = s.count_churches_by(GroupBy::State, &church_filter)?;
            let sessions = s
                .list_sessions(SESSION_HISTORY)?
                .into_iter()
                .map(|summary| SessionCounts {
                    session_id: summary.session.id,
                    status: summary.session.status.to_db_string().to_string(),
                    started_at: summary.session.started_at.to_rfc3339(),
                    totals: summary.session.totals,
                    logged_errors: summary.logged_errors,
                })
                .collect();

            Ok(DirectoryStatistics {
                total_churches: by_jurisdiction.iter().map(|(_, n)| n).sum(),
                by_jurisdiction,
                by_state,
                sessions,
            })
        })
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &DirectoryStatistics) {
    println!("=== Directory Statistics ===\n");

    println!("Overview:");
    println!("  Total churches: {}", stats.total_churches);
    println!("  Jurisdictions: {}", stats.by_jurisdiction.len());
    println!();

    println!("Churches by Jurisdiction:");
    for (jurisdiction, count) in &stats.by_jurisdiction {
        println!("  {}: {} ({:.1}%)", jurisdiction, count, percentage(*count, stats.total_churches));
    }
    println!();

    println!("Churches by State:");
    for (state, count) in &stats.by_state {
        let state = if state.is_empty() { "(unknown)" } else { state };
        println!("  {}: {}", state, count);
    }
    println!();

    if !stats.sessions.is_empty() {
        println!("Recent Sessions:");
        for session in &stats.sessions {
            print_session_line(&session.session_id, &session.status, &session.started_at, &session.totals);
        }
    }
}

/// Prints session history, newest first
pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("No sessions recorded.");
        return;
    }

    for summary in sessions {
        let session = &summary.session;
        print_session_line(
            &session.id,
            session.status.to_db_string(),
            &session.started_at.to_rfc3339(),
            &session.totals,
        );
        if summary.logged_errors > 0 {
            println!("      {} logged error(s)", summary.logged_errors);
        }
        if let Some(message) = &session.error_message {
            println!("      {}", message);
        }
    }
}

fn print_session_line(id: &str, status: &str, started_at: &str, totals: &SessionTotals) {
    println!(
        "  {} [{}] {} found={} new={} duplicate={} updated={} errors={}",
        id, status, started_at, totals.found, totals.new, totals.duplicate, totals.updated, totals.errors
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}
