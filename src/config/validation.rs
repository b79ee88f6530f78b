use crate::config::types::{Config, CrawlerConfig, HubEntry, OutputConfig, UserAgentConfig};
use crate::crawler::extract_hub_name;
use crate::ConfigError;
use std::collections::HashMap;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_hubs(&config.hubs)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_base_url("api-base", &config.api_base)?;
    validate_base_url("site-base", &config.site_base)?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.jitter_min_ms > config.jitter_max_ms {
        return Err(ConfigError::Validation(format!(
            "jitter-min-ms ({}) must not exceed jitter-max-ms ({})",
            config.jitter_min_ms, config.jitter_max_ms
        )));
    }

    if config.flush_interval_ms < 1 {
        return Err(ConfigError::Validation(
            "flush-interval-ms must be >= 1".to_string(),
        ));
    }

    if config.schedule_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "schedule-interval-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_base_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", key, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            key, value
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

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates hub seed entries
///
/// Two entries naming the same hub would crawl the same listing twice, so
/// hub names must be unique across the file.
fn validate_hubs(hubs: &[HubEntry]) -> Result<(), ConfigError> {
    let mut seen: HashMap<String, &str> = HashMap::new();

    for entry in hubs {
        Url::parse(&entry.hub_link).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid hub link '{}': {}", entry.hub_link, e))
        })?;

        let Some(hub_name) = extract_hub_name(&entry.hub_link) else {
            return Err(ConfigError::Validation(format!(
                "Hub link '{}' must look like .../hubs/<name>/articles/",
                entry.hub_link
            )));
        };

        if let Some(first) = seen.insert(hub_name.clone(), &entry.hub_link) {
            return Err(ConfigError::Validation(format!(
                "Hub '{}' is listed twice: '{}' and '{}'",
                hub_name, first, entry.hub_link
            )));
        }

        if entry.check_interval_secs < 1 {
            return Err(ConfigError::Validation(format!(
                "Hub '{}': check-interval-secs must be >= 1",
                entry.hub_link
            )));
        }

        for (key, value) in [
            ("max-workers", entry.max_workers),
            ("links-per-page", entry.links_per_page),
            ("max-pages", entry.max_pages),
            ("batch-size", entry.batch_size),
        ] {
            if value < 1 {
                return Err(ConfigError::Validation(format!(
                    "Hub '{}': {} must be >= 1",
                    entry.hub_link, key
                )));
            }
        }
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
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
