use serde::{Deserialize, Serialize};

/// Main configuration structure for Vespers
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineOptions,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Options that shape one crawl session
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct EngineOptions {
    /// Directory for session reports
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Default log level for the binary (overridden by -v/-q)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum number of source tasks running at once
    #[serde(default = "default_max_concurrent_scrapers")]
    pub max_concurrent_scrapers: u32,

    /// Reject candidates whose URLs are not well-formed
    #[serde(default = "default_true")]
    pub validate_urls: bool,

    /// Additionally check candidate URLs with a HEAD request
    #[serde(default)]
    pub live_check_urls: bool,

    /// Classify candidates against known records
    #[serde(default = "default_true")]
    pub enable_duplicate_detection: bool,

    /// Write records, sessions and errors to the database
    #[serde(default = "default_true")]
    pub save_to_database: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            log_level: default_log_level(),
            max_concurrent_scrapers: default_max_concurrent_scrapers(),
            validate_urls: true,
            live_check_urls: false,
            enable_duplicate_detection: true,
            save_to_database: true,
        }
    }
}

/// Store connection parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,

    /// How long a writer waits on a locked database (milliseconds)
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Retry and timeout budget applied to every source task
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per task, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on every further attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Execution budget of a single attempt
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent string: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Kind of extractor that handles a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// HTML listing pages read through CSS selectors
    HtmlDirectory,
}

/// One crawlable directory source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceEntry {
    /// Unique source identifier (e.g. "oca")
    pub id: String,

    /// Jurisdiction every record from this source belongs to
    pub jurisdiction: String,

    /// Listing pages to fetch
    pub urls: Vec<String>,

    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

/// CSS selectors for the HTML directory extractor
///
/// `item` selects one element per church; every other selector is evaluated
/// inside that element.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SelectorConfig {
    #[serde(default)]
    pub item: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clergy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn default_output_dir() -> String {
    "./vespers-output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_concurrent_scrapers() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_task_timeout_secs() -> u64 {
    60
}

fn default_source_kind() -> SourceKind {
    SourceKind::HtmlDirectory
}
