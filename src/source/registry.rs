use crate::config::{Config, SourceKind};
use crate::robots::RobotsCache;
use crate::source::{build_http_client, HtmlDirectoryScraper, SourceScraper};
use crate::{ConfigError, VespersError};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The fixed set of sources an engine crawls, in registration order
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn SourceScraper>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one scraper per `[[source]]` entry
    ///
    /// All sources share one HTTP client and one robots.txt cache.
    pub fn from_config(config: &Config) -> Result<Self, VespersError> {
        let timeout = Duration::from_secs(config.retry.task_timeout_secs);
        let client = build_http_client(&config.user_agent, timeout)?;
        let robots = Arc::new(RobotsCache::new(client.clone(), &config.user_agent.crawler_name));

        let mut registry = Self::new();
        for entry in &config.sources {
            let scraper: Arc<dyn SourceScraper> = match entry.kind {
                SourceKind::HtmlDirectory => Arc::new(HtmlDirectoryScraper::new(
                    entry.clone(),
                    client.clone(),
                    Arc::clone(&robots),
                )?),
            };
            registry.register(scraper)?;
        }

        Ok(registry)
    }

    /// Adds a source
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Source registered
    /// * `Err(ConfigError::Validation)` - A source with the same id is already registered
    pub fn register(&mut self, source: Arc<dyn SourceScraper>) -> Result<(), ConfigError> {
        if self.get(source.id()).is_some() {
            return Err(ConfigError::Validation(format!(
                "source '{}' registered twice",
                source.id()
            )));
        }

        debug!(source = source.id(), jurisdiction = source.jurisdiction(), "Registered source");
        self.sources.push(source);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn SourceScraper>> {
        self.sources.iter().find(|s| s.id() == id).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SourceScraper>> {
        self.sources.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
