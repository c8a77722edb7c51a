//! Directory sources
//!
//! A source is one independently crawlable origin, usually one jurisdiction's
//! parish directory. Every source implements [`SourceScraper`]; the engine only
//! ever sees the candidates or the typed [`SourceError`] it yields.
//!
//! # Components
//!
//! - `fetcher`: HTTP client construction and response classification
//! - `html`: [`HtmlDirectoryScraper`], a listing-page extractor driven by CSS selectors
//! - `registry`: [`SourceRegistry`], the fixed set of sources known to an engine

mod fetcher;
mod html;
mod registry;

pub use fetcher::{build_http_client, classify_request_error, classify_status, fetch_page};
pub use html::HtmlDirectoryScraper;
pub use registry::SourceRegistry;

use crate::record::CandidateRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// One fetched document, opaque to the engine
#[derive(Debug, Clone)]
pub struct RawPayload {
    /// URL that was requested
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

/// Failure of a source fetch or parse, carrying its retry classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network failure, HTTP 5xx or 429; worth retrying
    #[error("transient failure fetching {url}: {message}")]
    Transient { url: String, message: String },

    /// Any other non-success HTTP status
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// Payload could not be turned into candidates
    #[error("cannot parse {url}: {message}")]
    Parse { url: String, message: String },

    #[error("robots.txt disallows {url}")]
    RobotsDenied { url: String },

    /// The attempt exceeded its execution budget
    #[error("attempt on {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("cancelled before completion")]
    Cancelled,

    /// The source's own code panicked; never retried
    #[error("source panicked: {message}")]
    Panicked { message: String },
}

impl SourceError {
    /// Returns true if another attempt may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout { .. })
    }

    /// Error kind recorded on the scrape-error row
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } | Self::Http { .. } | Self::RobotsDenied { .. } | Self::Timeout { .. } => {
                "fetch"
            }
            Self::Parse { .. } => "parse",
            Self::Cancelled => "cancelled",
            Self::Panicked { .. } => "panic",
        }
    }

    /// URL the failure is attached to, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transient { url, .. }
            | Self::Http { url, .. }
            | Self::Parse { url, .. }
            | Self::RobotsDenied { url }
            | Self::Timeout { url, .. } => Some(url),
            Self::Cancelled | Self::Panicked { .. } => None,
        }
    }
}

/// Capability every directory source provides
///
/// Implementations must be deterministic in `parse`: the same payload always
/// yields the same candidates, in the same order.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    /// Unique, stable identifier of the source
    fn id(&self) -> &str;

    /// Jurisdiction every candidate from this source belongs to
    fn jurisdiction(&self) -> &str;

    /// Pages that make up one crawl of this source
    fn urls(&self) -> Vec<String>;

    /// Fetches one page.
    async fn fetch(&self, url: &str) -> Result<RawPayload, SourceError>;

    /// Extracts candidates from a fetched page.
    ///
    /// Zero candidates is a valid result; a malformed payload is a
    /// [`SourceError::Parse`], never a partial list.
    fn parse(&self, payload: &RawPayload) -> Result<Vec<CandidateRecord>, SourceError>;
}
