//! robots.txt handling for the HTML directory source
//!
//! Listing pages are only fetched when the origin's robots.txt allows it.
//! Results are cached per origin for 24 hours.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use tracing::{debug, warn};

/// Fetches robots.txt for an origin
///
/// A missing file (any 4xx) allows everything. So do network failures and 5xx
/// responses; the listing fetch that follows reports those conditions itself.
///
/// # Arguments
///
/// * `client` - HTTP client to use
/// * `origin` - Scheme, host and port, e.g. "https://example.org"
pub async fn fetch_robots(client: &reqwest::Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
            return ParsedRobots::allow_all();
        }
    };

    let status = response.status();
    if !status.is_success() {
        debug!(url = %robots_url, status = status.as_u16(), "no usable robots.txt");
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(e) => {
            warn!(url = %robots_url, error = %e, "robots.txt body unreadable, allowing all");
            ParsedRobots::allow_all()
        }
    }
}
