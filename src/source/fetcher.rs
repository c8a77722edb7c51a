//! HTTP fetching for directory sources
//!
//! Every response is classified into success or a [`SourceError`]:
//!
//! | Condition | Classification |
//! |-----------|----------------|
//! | 2xx | payload |
//! | 408, 429, 5xx | `Transient` |
//! | other status | `Http` (terminal) |
//! | timeout, connect or body error | `Transient` |
//! | invalid request | `Parse` (terminal) |

use crate::config::UserAgentConfig;
use crate::source::{RawPayload, SourceError};
use chrono::Utc;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Builds the HTTP client shared by every source of an engine
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Overall budget of one request
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use vespers::config::UserAgentConfig;
/// use vespers::source::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "Vespers".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches one page and classifies the outcome
pub async fn fetch_page(client: &Client, url: &str) -> Result<RawPayload, SourceError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify_request_error(url, &e))?;

    let status = response.status();
    classify_status(url, status)?;

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = response
        .text()
        .await
        .map_err(|e| classify_request_error(url, &e))?;

    Ok(RawPayload {
        url: url.to_string(),
        final_url,
        status: status.as_u16(),
        content_type,
        body,
        fetched_at: Utc::now(),
    })
}

/// Maps a response status to success or a classified error
pub fn classify_status(url: &str, status: StatusCode) -> Result<(), SourceError> {
    if status.is_success() {
        return Ok(());
    }

    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        return Err(SourceError::Transient {
            url: url.to_string(),
            message: format!("HTTP {}", status.as_u16()),
        });
    }

    Err(SourceError::Http {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// Classifies a transport-level reqwest error
pub fn classify_request_error(url: &str, error: &reqwest::Error) -> SourceError {
    if error.is_builder() {
        return SourceError::Parse {
            url: url.to_string(),
            message: format!("invalid request: {}", error),
        };
    }

    let message = if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.to_string()
    };

    SourceError::Transient {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5));
        assert!(client.is_ok());
    }

    #[test]
    fn test_classify_status() {
        let url = "https://example.org/parishes";
        assert!(classify_status(url, StatusCode::OK).is_ok());
        assert!(classify_status(url, StatusCode::SERVICE_UNAVAILABLE)
            .unwrap_err()
            .is_transient());
        assert!(classify_status(url, StatusCode::TOO_MANY_REQUESTS)
            .unwrap_err()
            .is_transient());
        assert_eq!(
            classify_status(url, StatusCode::NOT_FOUND),
            Err(SourceError::Http {
                url: url.to_string(),
                status: 404
            })
        );
        assert!(!classify_status(url, StatusCode::FORBIDDEN)
            .unwrap_err()
            .is_transient());
    }
}
