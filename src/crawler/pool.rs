//! Bounded-concurrency executor for source tasks
//!
//! The pool keeps at most `limit` tasks running. Each task holds a semaphore
//! permit for its whole lifetime (every attempt, every backoff and the
//! screening of its candidates), and the next queued task starts as soon as
//! one finishes. Results are streamed to the caller as tasks finish; the pool
//! returns once every task is terminal.

use crate::crawler::{RetryPolicy, Validator, Verdict};
use crate::record::{clean_candidate, CandidateRecord};
use crate::source::{SourceError, SourceScraper};
use crate::state::TaskStatus;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// One source's unit of work inside a session
#[derive(Clone)]
pub struct SourceTask {
    pub source_id: String,
    pub urls: Vec<String>,
    pub status: TaskStatus,
    pub attempts: u32,
    scraper: Arc<dyn SourceScraper>,
}

impl SourceTask {
    pub fn new(scraper: Arc<dyn SourceScraper>) -> Self {
        Self {
            source_id: scraper.id().to_string(),
            urls: scraper.urls(),
            status: TaskStatus::Pending,
            attempts: 0,
            scraper,
        }
    }

    pub fn jurisdiction(&self) -> &str {
        self.scraper.jurisdiction()
    }

    /// One attempt: fetch and parse every URL, in order
    ///
    /// Any failing URL fails the whole attempt, so a task never yields a
    /// partial listing.
    async fn attempt(scraper: Arc<dyn SourceScraper>, urls: Vec<String>) -> Result<Vec<CandidateRecord>, SourceError> {
        let mut candidates = Vec::new();
        for url in &urls {
            let payload = scraper.fetch(url).await?;
            let parsed = scraper.parse(&payload)?;
            debug!(source = scraper.id(), url = %url, count = parsed.len(), "Parsed page");
            candidates.extend(parsed);
        }
        Ok(candidates)
    }
}

/// A cleaned candidate with the validator's verdict on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screened {
    pub candidate: CandidateRecord,
    pub verdict: Verdict,
}

/// Terminal outcome of one task
#[derive(Debug)]
pub struct TaskResult {
    pub source_id: String,
    pub jurisdiction: String,
    /// `Succeeded` or `Failed`
    pub status: TaskStatus,
    pub attempts: u32,
    /// Screened candidates in emission order, or the error that ended the task
    pub outcome: Result<Vec<Screened>, SourceError>,
}

impl TaskResult {
    fn failed(source_id: String, jurisdiction: String, attempts: u32, error: SourceError) -> Self {
        Self {
            source_id,
            jurisdiction,
            status: TaskStatus::Failed,
            attempts,
            outcome: Err(error),
        }
    }
}

/// What the pool reports about a finished task once its candidates are handed off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub source_id: String,
    pub jurisdiction: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub candidates: usize,
    pub error: Option<String>,
}

impl From<&TaskResult> for TaskSummary {
    fn from(result: &TaskResult) -> Self {
        Self {
            source_id: result.source_id.clone(),
            jurisdiction: result.jurisdiction.clone(),
            status: result.status,
            attempts: result.attempts,
            candidates: result.outcome.as_ref().map_or(0, Vec::len),
            error: result.outcome.as_ref().err().map(ToString::to_string),
        }
    }
}

/// Bounded worker pool
pub struct WorkerPool {
    limit: usize,
    policy: RetryPolicy,
    cancel: CancellationToken,
    validator: Option<Arc<Validator>>,
}

impl WorkerPool {
    /// Creates a pool
    ///
    /// # Arguments
    ///
    /// * `limit` - Maximum tasks running at once (at least 1)
    /// * `policy` - Retry policy applied to every task
    /// * `cancel` - Stops dispatch of queued tasks and further retries
    pub fn new(limit: usize, policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self {
            limit: limit.max(1),
            policy,
            cancel,
            validator: None,
        }
    }

    /// Validates every candidate inside its task, under the task's permit
    ///
    /// Without a validator candidates are cleaned and accepted as is.
    pub fn with_validator(mut self, validator: Arc<Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Runs every task and collects the results
    pub async fn run(&self, tasks: Vec<SourceTask>) -> Vec<TaskResult> {
        let (tx, mut rx) = mpsc::channel(tasks.len().max(1));
        self.run_streaming(tasks, tx).await;

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        results
    }

    /// Runs every task, sending each result as soon as it is terminal
    ///
    /// Tasks still queued when the cancellation signal fires are reported
    /// failed with [`SourceError::Cancelled`] without being started. A task
    /// whose source panics is reported failed with [`SourceError::Panicked`].
    ///
    /// # Returns
    ///
    /// One summary per task, in completion order
    pub async fn run_streaming(&self, tasks: Vec<SourceTask>, results: mpsc::Sender<TaskResult>) -> Vec<TaskSummary> {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut queue: VecDeque<SourceTask> = tasks.into();
        let mut running: JoinSet<TaskResult> = JoinSet::new();
        let mut summaries = Vec::with_capacity(queue.len());

        info!(tasks = queue.len(), limit = self.limit, "Dispatching source tasks");

        while !queue.is_empty() || !running.is_empty() {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if !queue.is_empty() => {
                    warn!(skipped = queue.len(), "Cancelled, not dispatching remaining tasks");
                    for task in queue.drain(..) {
                        let jurisdiction = task.jurisdiction().to_string();
                        let result = TaskResult::failed(task.source_id, jurisdiction, 0, SourceError::Cancelled);
                        summaries.push(TaskSummary::from(&result));
                        let _ = results.send(result).await;
                    }
                }

                Some(joined) = running.join_next(), if !running.is_empty() => {
                    match joined {
                        Ok(result) => {
                            summaries.push(TaskSummary::from(&result));
                            let _ = results.send(result).await;
                        }
                        Err(e) => warn!(error = %e, "Source task aborted"),
                    }
                }

                permit = semaphore.clone().acquire_owned(), if !queue.is_empty() => {
                    let Ok(permit) = permit else { break };
                    let Some(mut task) = queue.pop_front() else { continue };

                    task.status = TaskStatus::Running;
                    debug!(source = %task.source_id, "Task started");

                    let source_id = task.source_id.clone();
                    let jurisdiction = task.jurisdiction().to_string();
                    let attempts = Arc::new(AtomicU32::new(0));
                    let work = tokio::spawn(Self::execute(
                        task,
                        self.policy,
                        self.cancel.clone(),
                        self.validator.clone(),
                        Arc::clone(&attempts),
                    ));

                    // The source runs in its own task so a panic stays inside it
                    running.spawn(async move {
                        let result = match work.await {
                            Ok(result) => result,
                            Err(e) => {
                                let message = if e.is_panic() {
                                    panic_message(e.into_panic())
                                } else {
                                    e.to_string()
                                };
                                error!(source = %source_id, error = %message, "Source task panicked");
                                let attempts = attempts.load(Ordering::SeqCst);
                                TaskResult::failed(source_id, jurisdiction, attempts, SourceError::Panicked { message })
                            }
                        };
                        drop(permit);
                        result
                    });
                }
            }
        }

        summaries
    }

    /// Runs one task to its terminal state, then screens its candidates
    async fn execute(
        mut task: SourceTask,
        policy: RetryPolicy,
        cancel: CancellationToken,
        validator: Option<Arc<Validator>>,
        attempts: Arc<AtomicU32>,
    ) -> TaskResult {
        let scraper = Arc::clone(&task.scraper);
        let first_url = task.urls.first().cloned().unwrap_or_default();
        let urls = task.urls.clone();

        let outcome = policy
            .run(&cancel, &first_url, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                SourceTask::attempt(Arc::clone(&scraper), urls.clone())
            })
            .await;

        task.attempts = outcome.attempts;
        let result = match outcome.result {
            Ok(candidates) => {
                task.status = TaskStatus::Succeeded;
                info!(
                    source = %task.source_id,
                    attempts = task.attempts,
                    candidates = candidates.len(),
                    "Task succeeded"
                );
                Ok(screen(validator.as_deref(), candidates).await)
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                warn!(source = %task.source_id, attempts = task.attempts, error = %e, "Task failed");
                Err(e)
            }
        };

        TaskResult {
            jurisdiction: task.jurisdiction().to_string(),
            source_id: task.source_id,
            status: task.status,
            attempts: task.attempts,
            outcome: result,
        }
    }
}

/// Cleans and validates candidates in emission order
async fn screen(validator: Option<&Validator>, candidates: Vec<CandidateRecord>) -> Vec<Screened> {
    let mut screened = Vec::with_capacity(candidates.len());
    for raw in &candidates {
        let candidate = clean_candidate(raw);
        let verdict = match validator {
            Some(validator) => validator.validate(&candidate).await,
            None => Verdict::Accept,
        };
        screened.push(Screened { candidate, verdict });
    }
    screened
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |m| m.to_string()),
    }
}
