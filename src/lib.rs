//! Kumo: a politeness-aware fetch scheduling core for web crawling
//!
//! This crate implements the task-scheduling heart of a distributed crawler:
//! host-scoped task pools with crawl-delay politeness, a priority queue of
//! pools, and the generate/fetch task lifecycle that produces, dispatches,
//! retries, and retires fetch tasks.

pub mod config;
pub mod fetch;
pub mod generate;
pub mod url;

use thiserror::Error;

/// Main error type for Kumo operations
#[derive(Debug, Error)]
pub enum KumoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker error: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Kumo operations
pub type Result<T> = std::result::Result<T, KumoError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchTask, PoolKey, PoolQueue, PoolStatus, TaskMonitor, TaskPool};
pub use generate::{BatchId, Candidate, GenerateStats, Generator};
pub use url::{extract_host, extract_protocol};
