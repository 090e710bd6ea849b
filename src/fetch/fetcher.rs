//! HTTP fetch collaborator
//!
//! The scheduler never sees protocol details; it hands a [`FetchTask`] to
//! a [`Fetcher`] and receives a [`FetchOutcome`] back. The bundled
//! [`HttpFetcher`] is a reqwest-backed implementation; tests substitute
//! their own.

use crate::config::UserAgentConfig;
use crate::fetch::FetchTask;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Result of one fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// The server answered; `asap` marks cheap responses (not-modified,
    /// already-resolved redirects) that need no crawl delay afterwards
    Success { status_code: u16, asap: bool },

    /// The fetch failed before a usable response arrived
    Failed { error: String },
}

impl FetchOutcome {
    /// Whether the owning pool should skip the crawl delay for this task
    pub fn is_asap(&self) -> bool {
        matches!(self, FetchOutcome::Success { asap: true, .. })
    }
}

/// Executes the network side of a fetch task
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, task: &FetchTask) -> FetchOutcome;
}

/// Reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, task: &FetchTask) -> FetchOutcome {
        match self.client.get(task.url().clone()).send().await {
            Ok(response) => {
                let status = response.status();
                // Responses the server answered without doing real work
                // should not charge the host a crawl delay
                let asap = status == StatusCode::NOT_MODIFIED || status.is_redirection();

                FetchOutcome::Success {
                    status_code: status.as_u16(),
                    asap,
                }
            }
            Err(e) => FetchOutcome::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// User agent format: `CrawlerName/Version (+ContactURL; ContactEmail)`.
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user_agent() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "0.1".to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&test_user_agent()).is_ok());
    }

    #[test]
    fn test_outcome_asap() {
        let cheap = FetchOutcome::Success {
            status_code: 304,
            asap: true,
        };
        let normal = FetchOutcome::Success {
            status_code: 200,
            asap: false,
        };
        let failed = FetchOutcome::Failed {
            error: "timeout".to_string(),
        };

        assert!(cheap.is_asap());
        assert!(!normal.is_asap());
        assert!(!failed.is_asap());
    }
}
