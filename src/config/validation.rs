use crate::config::types::{
    Config, DatabaseConfig, EngineOptions, RetryConfig, SelectorConfig, SourceEntry,
    UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Upper bound for concurrent source tasks
pub const MAX_CONCURRENT_SCRAPERS: u32 = 64;

/// Upper bound for attempts per task
pub const MAX_ATTEMPTS: u32 = 10;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    check_runtime_limits(&config.engine, &config.retry)?;
    validate_engine_options(&config.engine)?;
    validate_database_config(&config.database)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Checks the limits the engine cannot run without
///
/// The engine calls this again before dispatching, because options may reach it
/// without passing through [`validate`].
pub fn check_runtime_limits(engine: &EngineOptions, retry: &RetryConfig) -> Result<(), ConfigError> {
    if engine.max_concurrent_scrapers < 1 || engine.max_concurrent_scrapers > MAX_CONCURRENT_SCRAPERS
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_scrapers must be between 1 and {}, got {}",
            MAX_CONCURRENT_SCRAPERS, engine.max_concurrent_scrapers
        )));
    }

    if retry.max_attempts < 1 || retry.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS, retry.max_attempts
        )));
    }

    if retry.task_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "task_timeout_secs must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine_options(engine: &EngineOptions) -> Result<(), ConfigError> {
    if engine.output_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    match engine.log_level.to_ascii_lowercase().as_str() {
        "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
        other => Err(ConfigError::Validation(format!(
            "log_level must be one of error, warn, info, debug, trace; got '{}'",
            other
        ))),
    }
}

fn validate_database_config(database: &DatabaseConfig) -> Result<(), ConfigError> {
    if database.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_retry_config(retry: &RetryConfig) -> Result<(), ConfigError> {
    if retry.base_delay_ms > retry.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            retry.base_delay_ms, retry.max_delay_ms
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the source list
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    if sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in sources {
        validate_source_id(&source.id)?;

        if !seen.insert(source.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source id '{}'",
                source.id
            )));
        }

        if source.jurisdiction.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must name a jurisdiction",
                source.id
            )));
        }

        if source.urls.is_empty() {
            return Err(ConfigError::Validation(format!(
                "source '{}' must have at least one URL",
                source.id
            )));
        }

        for raw in &source.urls {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid URL '{}' in source '{}': {}", raw, source.id, e))
            })?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "URL '{}' in source '{}' must use http or https",
                    raw, source.id
                )));
            }
        }

        validate_selectors(&source.id, &source.selectors)?;
    }

    Ok(())
}

fn validate_source_id(id: &str) -> Result<(), ConfigError> {
    if id.is_empty() {
        return Err(ConfigError::Validation("source id cannot be empty".to_string()));
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "source id must contain only lowercase letters, digits and hyphens, got '{}'",
            id
        )));
    }

    Ok(())
}

fn validate_selectors(source_id: &str, selectors: &SelectorConfig) -> Result<(), ConfigError> {
    if selectors.item.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "source '{}' needs an item selector",
            source_id
        )));
    }

    if selectors.name.trim().is_empty() {
        return Err(ConfigError::InvalidSelector(format!(
            "source '{}' needs a name selector",
            source_id
        )));
    }

    let optional = [
        &selectors.address,
        &selectors.city,
        &selectors.state,
        &selectors.zip,
        &selectors.clergy,
        &selectors.website,
        &selectors.phone,
        &selectors.email,
    ];

    let all = [Some(&selectors.item), Some(&selectors.name)]
        .into_iter()
        .flatten()
        .chain(optional.into_iter().flatten());

    for css in all {
        Selector::parse(css).map_err(|e| {
            ConfigError::InvalidSelector(format!(
                "source '{}': cannot parse selector '{}': {:?}",
                source_id, css, e
            ))
        })?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    Ok(())
}
