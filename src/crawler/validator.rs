//! Candidate validation
//!
//! Structural checks always run. URL checks run when `validate-urls` is on, and
//! a live reachability check is added when `live-check-urls` is on as well.

use crate::crawler::RetryPolicy;
use crate::record::CandidateRecord;
use crate::source::{classify_request_error, classify_status, SourceError};
use crate::url::parse_web_url;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shortest acceptable church name, in characters
const MIN_NAME_CHARS: usize = 3;

/// Why a candidate was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    MissingName,
    MissingLocation,
    MissingJurisdiction,
    MalformedUrl,
    UnreachableUrl,
}

impl RejectReason {
    /// Reason code recorded in the error log
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingName => "missing_name",
            Self::MissingLocation => "missing_location",
            Self::MissingJurisdiction => "missing_jurisdiction",
            Self::MalformedUrl => "malformed_url",
            Self::UnreachableUrl => "unreachable_url",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject { reason: RejectReason, detail: String },
}

impl Verdict {
    fn reject(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self::Reject {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Checks that a URL answers
#[async_trait]
pub trait LinkChecker: Send + Sync {
    async fn check(&self, url: &str) -> Result<(), SourceError>;
}

/// Live check over HTTP: `HEAD`, falling back to `GET` for servers that refuse it
pub struct HttpLinkChecker {
    client: Client,
}

impl HttpLinkChecker {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn check(&self, url: &str) -> Result<(), SourceError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = match response.status() {
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| classify_request_error(url, &e))?
                .status(),
            status => status,
        };

        classify_status(url, status)
    }
}

/// Accepts or rejects cleaned candidates
pub struct Validator {
    validate_urls: bool,
    live: Option<Arc<dyn LinkChecker>>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    /// Live-check results by URL, shared by every task of the session
    checked: Mutex<HashMap<String, Result<(), String>>>,
}

impl Validator {
    /// Creates a validator
    ///
    /// # Arguments
    ///
    /// * `validate_urls` - Check that candidate URLs are well formed
    /// * `live` - When set (and `validate_urls` is on), also check that they answer
    /// * `policy` - Retry policy for live checks
    /// * `cancel` - Session cancellation signal
    pub fn new(
        validate_urls: bool,
        live: Option<Arc<dyn LinkChecker>>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            validate_urls,
            live,
            policy,
            cancel,
            checked: Mutex::new(HashMap::new()),
        }
    }

    /// Structural checks only, no network
    pub fn check_structure(candidate: &CandidateRecord) -> Verdict {
        if candidate.name.trim().chars().count() < MIN_NAME_CHARS {
            return Verdict::reject(
                RejectReason::MissingName,
                format!("name '{}' is shorter than {} characters", candidate.name.trim(), MIN_NAME_CHARS),
            );
        }

        if candidate.jurisdiction.trim().is_empty() {
            return Verdict::reject(RejectReason::MissingJurisdiction, "jurisdiction is empty");
        }

        let has_location = [&candidate.address, &candidate.city, &candidate.state]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !has_location {
            return Verdict::reject(
                RejectReason::MissingLocation,
                format!("'{}' has no address, city or state", candidate.name),
            );
        }

        Verdict::Accept
    }

    /// Validates one cleaned candidate
    pub async fn validate(&self, candidate: &CandidateRecord) -> Verdict {
        let verdict = Self::check_structure(candidate);
        if !verdict.is_accept() || !self.validate_urls {
            return verdict;
        }

        let urls = [&candidate.website, &candidate.source_url];
        for url in urls.iter().filter_map(|u| u.as_deref()) {
            if let Err(e) = parse_web_url(url) {
                return Verdict::reject(RejectReason::MalformedUrl, format!("{}: {}", url, e));
            }
        }

        if let Some(live) = &self.live {
            for url in urls.iter().filter_map(|u| u.as_deref()) {
                match self.live_check(live.as_ref(), url).await {
                    LiveCheck::Reachable => {}
                    LiveCheck::Unreachable(message) => {
                        return Verdict::reject(RejectReason::UnreachableUrl, message)
                    }
                    LiveCheck::Skipped => {
                        debug!(url, "Session cancelled, live check skipped");
                    }
                }
            }
        }

        Verdict::Accept
    }

    async fn live_check(&self, live: &dyn LinkChecker, url: &str) -> LiveCheck {
        if let Some(cached) = self.checked.lock().await.get(url) {
            return match cached {
                Ok(()) => LiveCheck::Reachable,
                Err(message) => LiveCheck::Unreachable(message.clone()),
            };
        }

        let outcome = self.policy.run(&self.cancel, url, || live.check(url)).await;
        let result = match outcome.result {
            Ok(()) => Ok(()),
            // Cut short by cancellation: inconclusive, not cached
            Err(_) if self.cancel.is_cancelled() => return LiveCheck::Skipped,
            Err(e) => {
                warn!(url, attempts = outcome.attempts, error = %e, "URL unreachable");
                Err(e.to_string())
            }
        };

        debug!(url, ok = result.is_ok(), "Live URL check");
        self.checked.lock().await.insert(url.to_string(), result.clone());
        match result {
            Ok(()) => LiveCheck::Reachable,
            Err(message) => LiveCheck::Unreachable(message),
        }
    }
}

enum LiveCheck {
    Reachable,
    Unreachable(String),
    Skipped,
}
