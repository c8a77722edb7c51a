//! Session orchestration
//!
//! [`Engine::run`] drives one crawl session end to end:
//!
//! 1. Open the session and the store
//! 2. Re-check the limits the engine cannot run without
//! 3. Fan out one task per source through the [`WorkerPool`]; each task cleans
//!    and validates its own candidates under its worker slot
//! 4. Classify and commit every accepted candidate as results stream in
//! 5. Close the session and write its report and exports

use crate::config::{check_runtime_limits, snapshot, Config};
use crate::crawler::{
    Classification, Deduplicator, HttpLinkChecker, LinkChecker, RetryPolicy, Screened, SessionManager,
    SessionOutcome, SourceTask, TaskResult, TaskSummary, Validator, Verdict, WorkerPool, ENGINE_SOURCE,
};
use crate::output::{write_session_exports, write_session_report, ExportedRecord};
use crate::source::{build_http_client, SourceRegistry};
use crate::state::{SessionStatus, SessionTotals};
use crate::storage::{open_storage, PersistenceGateway, ScrapeErrorRecord, SqliteStorage};
use crate::{ConfigError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// What a session produced
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub session_id: String,
    pub status: SessionStatus,
    pub totals: SessionTotals,
    pub duration_ms: u64,
    /// One entry per source task, in completion order
    pub tasks: Vec<TaskSummary>,
    /// The session's error log
    pub errors: Vec<ScrapeErrorRecord>,
    /// Set when the session aborted before dispatch
    pub fatal_error: Option<String>,
    /// True when nothing was written to the store
    pub dry_run: bool,
    /// Every committed candidate with its classification, in commit order
    pub records: Vec<ExportedRecord>,
    pub report_path: Option<PathBuf>,
    /// JSON and CSV exports written next to the report
    pub export_paths: Vec<PathBuf>,
}

/// What the consumer saw of the task results
#[derive(Debug, Default)]
struct TaskTally {
    succeeded: usize,
    failed: usize,
    records: Vec<ExportedRecord>,
}

/// Per-session commit stage shared by every candidate
struct Pipeline<'a> {
    gateway: &'a PersistenceGateway,
    dedup: Deduplicator,
    cancel: &'a CancellationToken,
}

/// Crawl engine over a fixed set of sources
pub struct Engine {
    config: Config,
    config_hash: String,
    registry: SourceRegistry,
    link_checker: Option<Arc<dyn LinkChecker>>,
    store: Option<Arc<Mutex<SqliteStorage>>>,
    cancel: CancellationToken,
}

impl Engine {
    /// Creates an engine crawling the sources declared in `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash of the options file, recorded on the session
    ///
    /// # Returns
    ///
    /// * `Ok(Engine)` - Engine ready to run
    /// * `Err(VespersError)` - A source or the HTTP client could not be built
    pub fn new(config: Config, config_hash: String) -> Result<Self> {
        let registry = SourceRegistry::from_config(&config)?;
        let mut engine = Self::with_registry(config, config_hash, registry);

        if engine.config.engine.validate_urls && engine.config.engine.live_check_urls {
            let timeout = Duration::from_secs(engine.config.retry.task_timeout_secs);
            let client = build_http_client(&engine.config.user_agent, timeout)?;
            engine.link_checker = Some(Arc::new(HttpLinkChecker::new(client)));
        }

        Ok(engine)
    }

    /// Creates an engine over an explicit set of sources
    ///
    /// No live link checker is installed; see [`Engine::with_link_checker`].
    pub fn with_registry(config: Config, config_hash: String, registry: SourceRegistry) -> Self {
        Self {
            config,
            config_hash,
            registry,
            link_checker: None,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Replaces the live link checker used when `live-check-urls` is on
    pub fn with_link_checker(mut self, checker: Arc<dyn LinkChecker>) -> Self {
        self.link_checker = Some(checker);
        self
    }

    /// Runs sessions against an already open store instead of `database.path`
    pub fn with_store(mut self, store: Arc<Mutex<SqliteStorage>>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses an externally owned cancellation signal
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Signal that stops dispatch of new tasks for the running session
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs one crawl session
    ///
    /// Per-source and per-candidate failures never fail this call; they end up
    /// in the session's totals and error log. A configuration problem or an
    /// unreachable store closes the session `failed` before any task starts.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - The closed session
    /// * `Err(VespersError)` - The options could not be snapshotted, or the session
    ///   lifecycle was violated
    pub async fn run(&self) -> Result<CrawlResult> {
        let started = Instant::now();
        let mut session = SessionManager::open(&self.config_hash, snapshot(&self.config)?);
        let span = info_span!("session", id = %session.id());

        async move {
            let dry_run = !self.config.engine.save_to_database;
            info!(sources = self.registry.len(), dry_run, "Starting crawl session");

            let gateway = match self.connect(&mut session) {
                Ok(gateway) => gateway,
                Err(message) => return self.abort(session, message, started),
            };

            if let Err(e) = self.preflight() {
                return self.abort(session, e.to_string(), started);
            }

            session.mark_running()?;

            let policy = RetryPolicy::from_config(&self.config.retry);
            let cancel = self.cancel.child_token();
            let live = if self.config.engine.live_check_urls {
                self.link_checker.clone()
            } else {
                None
            };
            let validator = Validator::new(self.config.engine.validate_urls, live, policy, cancel.clone());
            let pipeline = Pipeline {
                gateway: &gateway,
                dedup: Deduplicator::new(self.config.engine.enable_duplicate_detection),
                cancel: &cancel,
            };

            let limit = self.config.engine.max_concurrent_scrapers as usize;
            let pool = WorkerPool::new(limit, policy, cancel.clone()).with_validator(Arc::new(validator));
            let tasks: Vec<SourceTask> = self.registry.iter().cloned().map(SourceTask::new).collect();

            let (tx, rx) = mpsc::channel(limit.max(1) * 2);
            let (summaries, mut tally) = tokio::join!(
                pool.run_streaming(tasks, tx),
                consume(rx, &mut session, &pipeline)
            );

            let outcome = SessionOutcome::Finished {
                succeeded: tally.succeeded,
                failed: tally.failed,
                interrupted: cancel.is_cancelled(),
            };
            let status = session.close(outcome)?;
            let records = std::mem::take(&mut tally.records);

            Ok(self.finish(session, status, summaries, records, None, started))
        }
        .instrument(span)
        .await
    }

    /// Opens the store and writes the session row
    fn connect(&self, session: &mut SessionManager) -> std::result::Result<Arc<PersistenceGateway>, String> {
        let store = match &self.store {
            Some(store) => Arc::clone(store),
            None => {
                let path = Path::new(&self.config.database.path);
                let busy_timeout = Duration::from_millis(self.config.database.busy_timeout_ms);
                let store = open_storage(path, busy_timeout)
                    .map_err(|e| format!("store unavailable at {}: {}", path.display(), e))?;
                Arc::new(Mutex::new(store))
            }
        };
        let gateway = Arc::new(PersistenceGateway::new(store, self.config.engine.save_to_database));

        session
            .attach(Arc::clone(&gateway))
            .map_err(|e| format!("cannot record session in store: {}", e))?;
        Ok(gateway)
    }

    /// Checks the limits the engine cannot run without
    fn preflight(&self) -> std::result::Result<(), ConfigError> {
        check_runtime_limits(&self.config.engine, &self.config.retry)?;
        if self.registry.is_empty() {
            return Err(ConfigError::Validation("no sources registered".to_string()));
        }
        Ok(())
    }

    /// Closes a session that could not start
    fn abort(&self, mut session: SessionManager, message: String, started: Instant) -> Result<CrawlResult> {
        error!(error = %message, "Session aborted before dispatch");
        session.log_error(ENGINE_SOURCE, None, "config", &message);
        let status = session.close(SessionOutcome::Fatal(message.clone()))?;
        Ok(self.finish(session, status, Vec::new(), Vec::new(), Some(message), started))
    }

    fn finish(
        &self,
        session: SessionManager,
        status: SessionStatus,
        tasks: Vec<TaskSummary>,
        records: Vec<ExportedRecord>,
        fatal_error: Option<String>,
        started: Instant,
    ) -> CrawlResult {
        let mut result = CrawlResult {
            session_id: session.id().to_string(),
            status,
            totals: session.totals(),
            duration_ms: started.elapsed().as_millis() as u64,
            tasks,
            errors: session.errors().to_vec(),
            fatal_error,
            dry_run: !self.config.engine.save_to_database,
            records,
            report_path: None,
            export_paths: Vec::new(),
        };

        let output_dir = Path::new(&self.config.engine.output_dir);
        match write_session_report(output_dir, &result) {
            Ok(path) => result.report_path = Some(path),
            Err(e) => warn!(error = %e, "Cannot write session report"),
        }
        match write_session_exports(output_dir, &result) {
            Ok(paths) => result.export_paths = paths,
            Err(e) => warn!(error = %e, "Cannot write session exports"),
        }

        result
    }
}

/// Drains task results, committing every accepted candidate
async fn consume(
    mut results: mpsc::Receiver<TaskResult>,
    session: &mut SessionManager,
    pipeline: &Pipeline<'_>,
) -> TaskTally {
    let mut tally = TaskTally::default();

    while let Some(result) = results.recv().await {
        match result.outcome {
            Ok(screened) => {
                tally.succeeded += 1;
                for item in screened {
                    if let Some(record) = process_candidate(item, session, pipeline) {
                        tally.records.push(record);
                    }
                }
            }
            Err(e) => {
                tally.failed += 1;
                session.log_error(&result.source_id, e.url(), e.kind(), &e.to_string());
                session.record(SessionTotals::error());
            }
        }
    }

    tally
}

/// Books one screened candidate; returns its export row once committed
fn process_candidate(item: Screened, session: &mut SessionManager, pipeline: &Pipeline<'_>) -> Option<ExportedRecord> {
    let Screened { candidate, verdict } = item;
    let source = candidate.source_id.clone();
    let url = candidate.source_url.clone();

    if let Verdict::Reject { reason, detail } = verdict {
        warn!(source = %source, reason = reason.code(), detail = %detail, "Candidate rejected");
        session.log_error(&source, url.as_deref(), "validation", &format!("{}: {}", reason, detail));
        session.record(SessionTotals::error());
        return None;
    }

    if session.store_lost() {
        session.log_error(&source, url.as_deref(), "persistence", "store unavailable");
        session.record(SessionTotals::error());
        return None;
    }

    match pipeline.gateway.commit(&candidate, &pipeline.dedup, session.id()) {
        Ok(classification) => {
            debug!(
                source = %source,
                name = %candidate.name,
                outcome = classification.label(),
                "Candidate committed"
            );
            session.record(match classification {
                Classification::New(_) => SessionTotals::new_record(),
                Classification::Duplicate { .. } => SessionTotals::duplicate_record(),
                Classification::Update { .. } => SessionTotals::updated_record(),
            });
            Some(ExportedRecord::new(&candidate, &classification))
        }
        Err(e) => {
            error!(source = %source, name = %candidate.name, error = %e, "Commit failed");
            session.storage_failure(&e);
            if session.store_lost() {
                pipeline.cancel.cancel();
            }
            session.log_error(&source, url.as_deref(), "persistence", &e.to_string());
            session.record(SessionTotals::error());
            None
        }
    }
}
