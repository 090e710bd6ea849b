use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Kumo
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub fetch: FetchConfig,
    #[serde(default)]
    pub generate: GenerateConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// Fetch scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Delay between requests to one host when it serves one request at a
    /// time (milliseconds)
    #[serde(rename = "crawl-delay-ms", default = "default_crawl_delay_ms")]
    pub crawl_delay_ms: u64,

    /// Delay between requests to one host that is allowed concurrent
    /// in-flight requests (milliseconds)
    #[serde(rename = "min-crawl-delay-ms", default)]
    pub min_crawl_delay_ms: u64,

    /// Max concurrent in-flight tasks per pool; 0 means unlimited
    #[serde(rename = "pool-threads", default = "default_pool_threads")]
    pub pool_threads: u32,

    /// Pending tasks older than this are reclaimed for retry (seconds)
    #[serde(rename = "pending-timeout-secs", default = "default_pending_timeout_secs")]
    pub pending_timeout_secs: u64,

    /// Number of fetch worker tasks
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// How long an idle worker sleeps before polling again (milliseconds)
    #[serde(rename = "idle-backoff-ms", default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Interval between pending-task reclaim sweeps (seconds)
    #[serde(rename = "retune-interval-secs", default = "default_retune_interval_secs")]
    pub retune_interval_secs: u64,

    /// Pools whose throughput falls below this rate (tasks/second) may be
    /// retired as too slow; 0 disables the check
    #[serde(rename = "min-tho-rate", default)]
    pub min_tho_rate: f64,
}

/// Generate step configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateConfig {
    /// Max tasks produced per generate cycle
    #[serde(rename = "top-n", default = "default_top_n")]
    pub top_n: usize,

    /// Max tasks queued per host per generate cycle; excess is dropped
    /// until a later cycle
    #[serde(rename = "max-count-per-host", default = "default_max_count_per_host")]
    pub max_count_per_host: usize,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl FetchConfig {
    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }

    pub fn min_crawl_delay(&self) -> Duration {
        Duration::from_millis(self.min_crawl_delay_ms)
    }

    pub fn pending_timeout(&self) -> Duration {
        Duration::from_secs(self.pending_timeout_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn retune_interval(&self) -> Duration {
        Duration::from_secs(self.retune_interval_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            crawl_delay_ms: default_crawl_delay_ms(),
            min_crawl_delay_ms: 0,
            pool_threads: default_pool_threads(),
            pending_timeout_secs: default_pending_timeout_secs(),
            workers: default_workers(),
            idle_backoff_ms: default_idle_backoff_ms(),
            retune_interval_secs: default_retune_interval_secs(),
            min_tho_rate: 0.0,
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            max_count_per_host: default_max_count_per_host(),
        }
    }
}

fn default_crawl_delay_ms() -> u64 {
    5000
}

fn default_pool_threads() -> u32 {
    1
}

fn default_pending_timeout_secs() -> u64 {
    180
}

fn default_workers() -> u32 {
    4
}

fn default_idle_backoff_ms() -> u64 {
    500
}

fn default_retune_interval_secs() -> u64 {
    30
}

fn default_top_n() -> usize {
    1000
}

fn default_max_count_per_host() -> usize {
    100
}
