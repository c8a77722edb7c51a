use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that only carry tracking information
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Parses a URL and checks that it is a well-formed web address
///
/// A web address must use `http` or `https` and name a host. Anything else
/// (relative paths, `mailto:` links, bare words) is rejected.
///
/// # Examples
///
/// ```
/// use vespers::url::parse_web_url;
///
/// assert!(parse_web_url("https://stnicholas.example.org/").is_ok());
/// assert!(parse_web_url("mailto:office@example.org").is_err());
/// ```
pub fn parse_web_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// Normalizes a published website address
///
/// # Normalization Steps
///
/// 1. Trim whitespace; empty input yields `None`
/// 2. Prepend `https://` when no scheme is present
/// 3. Lowercase the host and remove a `www.` prefix
/// 4. Remove the fragment and tracking query parameters
/// 5. Remove the trailing slash
///
/// Returns `None` when the result is not a well-formed web address or the
/// host has no dot (e.g. `https://parish`), except for `localhost` and IP
/// addresses.
///
/// # Examples
///
/// ```
/// use vespers::url::normalize_website;
///
/// assert_eq!(
///     normalize_website("WWW.HolyTrinity.example.org/").as_deref(),
///     Some("https://holytrinity.example.org")
/// );
/// assert_eq!(normalize_website("n/a"), None);
/// ```
pub fn normalize_website(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lowered = trimmed.to_ascii_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = parse_web_url(&with_scheme).ok()?;

    // `mailto:x@host` gains a scheme above and parses as userinfo
    if !url.username().is_empty() || url.password().is_some() {
        return None;
    }

    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    let is_ip = url.host().map_or(false, |h| !matches!(h, url::Host::Domain(_)));
    if !host.contains('.') && host != "localhost" && !is_ip {
        return None;
    }
    url.set_host(Some(&host)).ok()?;

    url.set_fragment(None);
    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let mut normalized = url.to_string();
    while normalized.ends_with('/') {
        normalized.pop();
    }
    Some(normalized)
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
