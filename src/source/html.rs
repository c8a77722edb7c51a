//! Generic HTML directory source
//!
//! Most jurisdiction directories are a listing page with one repeated element per
//! parish. [`HtmlDirectoryScraper`] reads such pages through the CSS selectors of
//! a `[[source]]` entry: `item` picks the repeated element, every other selector
//! is evaluated inside it.

use crate::config::{SelectorConfig, SourceEntry};
use crate::record::CandidateRecord;
use crate::robots::RobotsCache;
use crate::source::{fetch_page, RawPayload, SourceError, SourceScraper};
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use url::Url;

/// Field selectors compiled once per source
#[derive(Debug)]
struct CompiledSelectors {
    item: Selector,
    name: Selector,
    address: Option<Selector>,
    city: Option<Selector>,
    state: Option<Selector>,
    zip: Option<Selector>,
    clergy: Option<Selector>,
    website: Option<Selector>,
    phone: Option<Selector>,
    email: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(source_id: &str, config: &SelectorConfig) -> Result<Self, ConfigError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| {
                ConfigError::InvalidSelector(format!(
                    "source '{}': cannot parse selector '{}': {:?}",
                    source_id, css, e
                ))
            })
        };
        let parse_opt = |css: &Option<String>| css.as_deref().map(parse).transpose();

        Ok(Self {
            item: parse(&config.item)?,
            name: parse(&config.name)?,
            address: parse_opt(&config.address)?,
            city: parse_opt(&config.city)?,
            state: parse_opt(&config.state)?,
            zip: parse_opt(&config.zip)?,
            clergy: parse_opt(&config.clergy)?,
            website: parse_opt(&config.website)?,
            phone: parse_opt(&config.phone)?,
            email: parse_opt(&config.email)?,
        })
    }
}

/// Listing-page source driven by CSS selectors
pub struct HtmlDirectoryScraper {
    entry: SourceEntry,
    selectors: CompiledSelectors,
    client: Client,
    robots: Arc<RobotsCache>,
}

impl HtmlDirectoryScraper {
    /// Creates a scraper for one configured source
    ///
    /// # Arguments
    ///
    /// * `entry` - The `[[source]]` configuration
    /// * `client` - Shared HTTP client
    /// * `robots` - Shared robots.txt cache
    ///
    /// # Returns
    ///
    /// * `Ok(HtmlDirectoryScraper)` - Ready to fetch
    /// * `Err(ConfigError::InvalidSelector)` - A selector does not parse
    pub fn new(entry: SourceEntry, client: Client, robots: Arc<RobotsCache>) -> Result<Self, ConfigError> {
        let selectors = CompiledSelectors::compile(&entry.id, &entry.selectors)?;
        Ok(Self {
            entry,
            selectors,
            client,
            robots,
        })
    }

    fn extract(&self, item: ElementRef<'_>, page_url: &Url) -> CandidateRecord {
        let text = |selector: &Option<Selector>| selector.as_ref().and_then(|s| first_text(item, s));

        CandidateRecord {
            source_id: self.entry.id.clone(),
            name: first_text(item, &self.selectors.name).unwrap_or_default(),
            jurisdiction: self.entry.jurisdiction.clone(),
            address: text(&self.selectors.address),
            city: text(&self.selectors.city),
            state: text(&self.selectors.state),
            zip_code: text(&self.selectors.zip),
            clergy_contact: text(&self.selectors.clergy),
            website: self
                .selectors
                .website
                .as_ref()
                .and_then(|s| first_link(item, s, page_url)),
            contact_phone: self
                .selectors
                .phone
                .as_ref()
                .and_then(|s| first_href_or_text(item, s, "tel:")),
            contact_email: self
                .selectors
                .email
                .as_ref()
                .and_then(|s| first_href_or_text(item, s, "mailto:")),
            source_url: Some(page_url.to_string()),
        }
    }
}

#[async_trait]
impl SourceScraper for HtmlDirectoryScraper {
    fn id(&self) -> &str {
        &self.entry.id
    }

    fn jurisdiction(&self) -> &str {
        &self.entry.jurisdiction
    }

    fn urls(&self) -> Vec<String> {
        self.entry.urls.clone()
    }

    async fn fetch(&self, url: &str) -> Result<RawPayload, SourceError> {
        let parsed = Url::parse(url).map_err(|e| SourceError::Parse {
            url: url.to_string(),
            message: format!("invalid URL: {}", e),
        })?;

        if !self.robots.is_allowed(&parsed).await {
            return Err(SourceError::RobotsDenied { url: url.to_string() });
        }

        fetch_page(&self.client, url).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<Vec<CandidateRecord>, SourceError> {
        if let Some(content_type) = &payload.content_type {
            if !content_type.to_ascii_lowercase().contains("html") {
                return Err(SourceError::Parse {
                    url: payload.url.clone(),
                    message: format!("expected HTML, got '{}'", content_type),
                });
            }
        }

        let page_url = Url::parse(&payload.final_url).map_err(|e| SourceError::Parse {
            url: payload.url.clone(),
            message: format!("invalid page URL: {}", e),
        })?;

        let document = Html::parse_document(&payload.body);
        Ok(document
            .select(&self.selectors.item)
            .map(|item| self.extract(item, &page_url))
            .collect())
    }
}

/// Whitespace-collapsed text of the first match
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let element = scope.select(selector).next()?;
    let text = element.text().collect::<Vec<_>>().join(" ");
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// The first match's `href` resolved against the page, or its text
fn first_link(scope: ElementRef<'_>, selector: &Selector, page_url: &Url) -> Option<String> {
    let element = scope.select(selector).next()?;
    match element.value().attr("href") {
        Some(href) => page_url.join(href.trim()).ok().map(|u| u.to_string()),
        None => first_text(scope, selector),
    }
}

/// The first match's `href` with `scheme` stripped (e.g. `mailto:`), or its text
fn first_href_or_text(scope: ElementRef<'_>, selector: &Selector, scheme: &str) -> Option<String> {
    let element = scope.select(selector).next()?;
    if let Some(href) = element.value().attr("href") {
        if let Some(stripped) = href.trim().strip_prefix(scheme) {
            let value = stripped.split('?').next().unwrap_or_default().trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    first_text(scope, selector)
}
