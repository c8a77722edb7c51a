//! Crawl engine
//!
//! This module contains the session pipeline, including:
//! - Session lifecycle and accounting ([`SessionManager`])
//! - Bounded task execution with retries ([`WorkerPool`], [`RetryPolicy`])
//! - Candidate validation ([`Validator`]) and duplicate detection ([`Deduplicator`])
//! - End-to-end orchestration ([`Engine`])

mod dedup;
mod engine;
mod pool;
mod retry;
mod session;
mod validator;

pub use dedup::{merge, Classification, Deduplicator};
pub use engine::{CrawlResult, Engine};
pub use pool::{Screened, SourceTask, TaskResult, TaskSummary, WorkerPool};
pub use retry::{RetryOutcome, RetryPolicy};
pub use session::{SessionManager, SessionOutcome, ENGINE_SOURCE};
pub use validator::{HttpLinkChecker, LinkChecker, RejectReason, Validator, Verdict};

use crate::config::Config;
use crate::Result;

/// Runs one crawl session over the sources declared in `config`
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `config_hash` - Hash of the options file
///
/// # Returns
///
/// * `Ok(CrawlResult)` - The closed session, whatever its status
/// * `Err(VespersError)` - The engine could not be built
pub async fn crawl(config: Config, config_hash: String) -> Result<CrawlResult> {
    Engine::new(config, config_hash)?.run().await
}
