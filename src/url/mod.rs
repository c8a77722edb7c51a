//! URL handling for extracted records
//!
//! Directory pages publish parish websites in every shape imaginable
//! (`www.example.org`, `HTTP://Example.org/`, `example.org/#home`). This module
//! checks that a URL is usable and folds the common variations into one form.

mod normalize;

pub use normalize::{normalize_website, parse_web_url};

use ::url::Url;

/// Returns the `scheme://host[:port]` origin of a URL, used as a cache key
///
/// # Examples
///
/// ```
/// use vespers::url::origin_of;
/// use url::Url;
///
/// let url = Url::parse("https://example.org:8443/parishes?page=2").unwrap();
/// assert_eq!(origin_of(&url).as_deref(), Some("https://example.org:8443"));
/// ```
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
