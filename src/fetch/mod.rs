//! Fetch scheduling core
//!
//! This module contains the politeness-aware scheduling machinery:
//! - `PoolKey`: the `(priority, protocol, host)` pool identity
//! - `FetchTask`: one URL to fetch, with its lease epoch
//! - `TaskPool`: per-host ready/pending queues with crawl-delay enforcement
//! - `PoolQueue`: priority-ordered collection of pools
//! - `TaskMonitor`: the synchronized facade producers and workers call
//! - `Fetcher`/`HttpFetcher`: the protocol-level collaborator seam
//! - worker loop and periodic retuner

mod fetcher;
mod monitor;
mod pool_key;
mod pool_queue;
mod task;
mod task_pool;
mod worker;

pub use fetcher::{build_http_client, FetchOutcome, Fetcher, HttpFetcher};
pub use monitor::TaskMonitor;
pub use pool_key::PoolKey;
pub use pool_queue::PoolQueue;
pub use task::FetchTask;
pub use task_pool::{PoolStatus, TaskPool};
pub use worker::{run_retuner, run_worker};
