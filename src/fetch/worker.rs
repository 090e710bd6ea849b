//! Fetch worker loop
//!
//! Workers poll the monitor for tasks; `consume` never blocks, so an idle
//! worker backs off with a bounded exponential sleep between polls. A
//! companion retuner task periodically reclaims timed-out pending tasks.

use crate::fetch::{FetchOutcome, Fetcher, TaskMonitor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Idle sleeps grow up to this multiple of the configured backoff
const MAX_BACKOFF_MULTIPLIER: u32 = 8;

/// Runs one fetch worker until shutdown is signalled
///
/// Each iteration consumes a task if one is eligible, performs the fetch
/// through the external collaborator, and reports completion back to the
/// monitor. Failed fetches are finished too; whether the URL is retried is
/// a later generate cycle's decision, not the worker's.
pub async fn run_worker(
    worker_id: u32,
    monitor: Arc<TaskMonitor>,
    fetcher: Arc<dyn Fetcher>,
    mut shutdown: watch::Receiver<bool>,
    idle_backoff: Duration,
) {
    tracing::debug!("Fetch worker {} started", worker_id);
    let mut backoff = idle_backoff;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(task) = monitor.consume() else {
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => {}
            }
            backoff = (backoff * 2).min(idle_backoff * MAX_BACKOFF_MULTIPLIER);
            continue;
        };
        backoff = idle_backoff;

        let outcome = fetcher.fetch(&task).await;
        match &outcome {
            FetchOutcome::Success { status_code, .. } => {
                tracing::debug!(
                    "Worker {} fetched {} ({})",
                    worker_id,
                    task.url(),
                    status_code
                );
            }
            FetchOutcome::Failed { error } => {
                tracing::warn!("Worker {} failed to fetch {}: {}", worker_id, task.url(), error);
            }
        }

        if !monitor.finish(&task, outcome.is_asap()) {
            // Reclaimed and re-leased while we fetched; the retry owns it now
            tracing::debug!(
                "Worker {} completion for task {} was stale",
                worker_id,
                task.item_id()
            );
        }
    }

    tracing::debug!("Fetch worker {} stopped", worker_id);
}

/// Periodically reclaims timed-out pending tasks until shutdown
pub async fn run_retuner(
    monitor: Arc<TaskMonitor>,
    mut shutdown: watch::Receiver<bool>,
    interval: Duration,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                monitor.retune(false);
                monitor.maintain();
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::fetch::FetchTask;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    struct CountingFetcher {
        fetched: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, _task: &FetchTask) -> FetchOutcome {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            FetchOutcome::Success {
                status_code: 200,
                asap: true,
            }
        }
    }

    fn fast_config() -> FetchConfig {
        FetchConfig {
            crawl_delay_ms: 0,
            min_crawl_delay_ms: 0,
            pool_threads: 0,
            idle_backoff_ms: 5,
            ..FetchConfig::default()
        }
    }

    fn make_task(item_id: u32, host: &str) -> FetchTask {
        let url = Url::parse(&format!("https://{}/p/{}", host, item_id)).unwrap();
        FetchTask::create(item_id, 1, url).unwrap()
    }

    #[tokio::test]
    async fn test_worker_drains_monitor() {
        let monitor = Arc::new(TaskMonitor::new(&fast_config()));
        for i in 0..10 {
            monitor.produce(make_task(i, "example.com"));
        }

        let fetcher = Arc::new(CountingFetcher {
            fetched: AtomicUsize::new(0),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_worker(
            0,
            Arc::clone(&monitor),
            fetcher.clone(),
            shutdown_rx,
            Duration::from_millis(5),
        ));

        // Wait for the worker to drain everything
        for _ in 0..200 {
            if monitor.finished_task_count() == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(fetcher.fetched.load(Ordering::SeqCst), 10);
        assert_eq!(monitor.finished_task_count(), 10);
        assert_eq!(monitor.task_count(), 0);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let monitor = Arc::new(TaskMonitor::new(&fast_config()));
        let fetcher = Arc::new(CountingFetcher {
            fetched: AtomicUsize::new(0),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_worker(
            0,
            monitor,
            fetcher,
            shutdown_rx,
            Duration::from_millis(5),
        ));

        shutdown_tx.send(true).unwrap();
        // The worker notices the signal while idling
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
