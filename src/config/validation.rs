use crate::config::types::{Config, FetchConfig, GenerateConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetch_config(&config.fetch)?;
    validate_generate_config(&config.generate)?;
    validate_user_agent_config(&config.user_agent)?;
    Ok(())
}

/// Validates fetch scheduling configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.min_crawl_delay_ms > config.crawl_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min-crawl-delay-ms ({}) must not exceed crawl-delay-ms ({})",
            config.min_crawl_delay_ms, config.crawl_delay_ms
        )));
    }

    if config.pending_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "pending-timeout-secs must be >= 1, got {}",
            config.pending_timeout_secs
        )));
    }

    if config.workers < 1 || config.workers > 1000 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 1000, got {}",
            config.workers
        )));
    }

    if config.idle_backoff_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "idle-backoff-ms must be >= 1, got {}",
            config.idle_backoff_ms
        )));
    }

    if config.min_tho_rate < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min-tho-rate must not be negative, got {}",
            config.min_tho_rate
        )));
    }

    Ok(())
}

/// Validates generate configuration
fn validate_generate_config(config: &GenerateConfig) -> Result<(), ConfigError> {
    if config.top_n < 1 {
        return Err(ConfigError::Validation(format!(
            "top-n must be >= 1, got {}",
            config.top_n
        )));
    }

    if config.max_count_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "max-count-per-host must be >= 1, got {}",
            config.max_count_per_host
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Basic email shape check: local@domain.tld
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "contact-email is not a valid email address: '{}'",
            email
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            fetch: FetchConfig::default(),
            generate: GenerateConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestBot".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/bot".to_string(),
                contact_email: "bot@example.com".to_string(),
            },
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_min_delay_must_not_exceed_crawl_delay() {
        let mut config = valid_config();
        config.fetch.crawl_delay_ms = 100;
        config.fetch.min_crawl_delay_ms = 500;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.fetch.workers = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_crawler_name_rejected() {
        let mut config = valid_config();
        config.user_agent.crawler_name = "bad name!".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut config = valid_config();
        config.user_agent.contact_email = "not-an-email".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_max_count_per_host_rejected() {
        let mut config = valid_config();
        config.generate.max_count_per_host = 0;
        assert!(validate(&config).is_err());
    }
}
