use crate::robots::{fetch_robots, ParsedRobots};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// robots.txt for one origin with the time it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Returns true once the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-origin robots.txt cache shared by every task of a source
///
/// Two tasks racing on a cold origin may both fetch; the later insert wins.
#[derive(Debug)]
pub struct RobotsCache {
    client: reqwest::Client,
    agent_token: String,
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for robots.txt requests
    /// * `agent_token` - Product token matched against `User-agent` groups
    pub fn new(client: reqwest::Client, agent_token: &str) -> Self {
        Self {
            client,
            agent_token: agent_token.to_string(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Checks a URL against its origin's robots.txt, fetching it when missing or stale
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(origin) = crate::url::origin_of(url) else {
            return true;
        };

        if let Some(cached) = self.lookup(&origin) {
            return cached.is_allowed(url.as_str(), &self.agent_token);
        }

        let robots = fetch_robots(&self.client, &origin).await;
        let allowed = robots.is_allowed(url.as_str(), &self.agent_token);
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(origin, CachedRobots::new(robots));
        allowed
    }

    fn lookup(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.content.clone())
    }

    #[cfg(test)]
    fn insert(&self, origin: &str, cached: CachedRobots) {
        self.entries
            .lock()
            .unwrap()
            .insert(origin.to_string(), cached);
    }
}
