//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vespers::config::{Config, DatabaseConfig, EngineOptions, RetryConfig, UserAgentConfig};
use vespers::crawler::LinkChecker;
use vespers::source::{RawPayload, SourceError, SourceRegistry, SourceScraper};
use vespers::storage::SqliteStorage;
use vespers::CandidateRecord;

/// Temporary workspace holding the database and the report directory
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("churches.db")
    }

    pub fn config(&self) -> Config {
        Config {
            engine: EngineOptions {
                output_dir: self.dir.path().join("out").display().to_string(),
                ..Default::default()
            },
            database: DatabaseConfig {
                path: self.db_path().display().to_string(),
                busy_timeout_ms: 5000,
            },
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 10,
                max_delay_ms: 100,
                task_timeout_secs: 5,
            },
            user_agent: UserAgentConfig {
                crawler_name: "VespersTest".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "test@example.com".to_string(),
            },
            sources: Vec::new(),
        }
    }

    pub fn storage(&self) -> SqliteStorage {
        SqliteStorage::new(&self.db_path(), Duration::from_secs(1)).expect("open storage")
    }
}

pub fn church(source: &str, name: &str, city: &str, state: &str) -> CandidateRecord {
    let mut candidate = CandidateRecord::new(source, name, "Orthodox Church in America");
    candidate.city = Some(city.to_string());
    candidate.state = Some(state.to_string());
    candidate
}

pub fn payload(url: &str) -> RawPayload {
    RawPayload {
        url: url.to_string(),
        final_url: url.to_string(),
        status: 200,
        content_type: Some("text/html".to_string()),
        body: String::new(),
        fetched_at: Utc::now(),
    }
}

/// How a [`MockSource`] behaves on fetch
#[derive(Clone)]
pub enum Behavior {
    /// Sleep, then succeed
    Delay(Duration),
    /// Never answer within any reasonable budget
    Hang,
    /// Fail with a terminal HTTP status
    NotFound,
    /// Cancel the given token, then succeed
    CancelSession(CancellationToken),
    /// Sleep, run the hook, then succeed
    Hook {
        after: Duration,
        hook: Arc<dyn Fn() + Send + Sync>,
    },
    /// Fetch fine, then panic while parsing
    PanicOnParse,
}

/// Scriptable source yielding fixed candidates
pub struct MockSource {
    pub id: String,
    pub candidates: Vec<CandidateRecord>,
    pub behavior: Behavior,
    pub fetches: Arc<AtomicU32>,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new(id: &str, candidates: Vec<CandidateRecord>) -> Self {
        Self {
            id: id.to_string(),
            candidates,
            behavior: Behavior::Delay(Duration::ZERO),
            fetches: Arc::new(AtomicU32::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Shares concurrency counters with other sources
    pub fn with_counters(mut self, active: &Arc<AtomicUsize>, peak: &Arc<AtomicUsize>) -> Self {
        self.active = Arc::clone(active);
        self.peak = Arc::clone(peak);
        self
    }
}

#[async_trait]
impl SourceScraper for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn jurisdiction(&self) -> &str {
        "Orthodox Church in America"
    }

    fn urls(&self) -> Vec<String> {
        vec![format!("https://{}.example.org/parishes", self.id)]
    }

    async fn fetch(&self, url: &str) -> Result<RawPayload, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = match &self.behavior {
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(payload(url))
            }
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(payload(url))
            }
            Behavior::NotFound => Err(SourceError::Http {
                url: url.to_string(),
                status: 404,
            }),
            Behavior::CancelSession(token) => {
                token.cancel();
                Ok(payload(url))
            }
            Behavior::Hook { after, hook } => {
                tokio::time::sleep(*after).await;
                hook();
                Ok(payload(url))
            }
            Behavior::PanicOnParse => Ok(payload(url)),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn parse(&self, _payload: &RawPayload) -> Result<Vec<CandidateRecord>, SourceError> {
        if let Behavior::PanicOnParse = self.behavior {
            panic!("unexpected markup in {}", self.id);
        }
        Ok(self.candidates.clone())
    }
}

/// Link checker that counts calls and finds every URL reachable
#[derive(Default)]
pub struct AlwaysUp {
    pub calls: AtomicU32,
}

#[async_trait]
impl LinkChecker for AlwaysUp {
    async fn check(&self, _url: &str) -> Result<(), SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn registry(sources: Vec<MockSource>) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register(Arc::new(source)).expect("unique source id");
    }
    registry
}
