//! Generate step: turning scored candidates into fetch tasks
//!
//! External collaborators select and score candidate URLs; the generator
//! only orders them, enforces the per-cycle and per-host caps, and routes
//! the survivors into task pools through the monitor. URLs dropped by the
//! per-host cap are not lost, merely left for a future generate cycle to
//! pick up again.

use crate::fetch::{FetchTask, TaskMonitor};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use url::Url;

/// Identifier of one generate cycle
pub type BatchId = u32;

/// A scored, pre-filtered URL proposed for fetching
#[derive(Debug, Clone)]
pub struct Candidate {
    pub url: Url,
    /// Relative worth within this cycle; higher is generated first
    pub score: f32,
    /// Scheduling priority of the resulting task
    pub priority: i32,
}

impl Candidate {
    pub fn new(url: Url, score: f32, priority: i32) -> Self {
        Self {
            url,
            score,
            priority,
        }
    }
}

/// Outcome of one generate cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateStats {
    pub batch_id: BatchId,
    /// Tasks produced into pools
    pub generated: usize,
    /// Candidates dropped because their host hit the per-host cap
    pub dropped_host_overflow: usize,
    /// Candidates dropped by the per-cycle cap
    pub dropped_batch_overflow: usize,
    /// Candidates whose URL could not be routed (no host)
    pub unroutable: usize,
}

/// Produces bounded, prioritized batches of fetch tasks
#[derive(Debug)]
pub struct Generator {
    top_n: usize,
    max_count_per_host: usize,
    next_batch_id: AtomicU32,
    next_item_id: AtomicU32,
}

impl Generator {
    pub fn new(top_n: usize, max_count_per_host: usize) -> Self {
        Self {
            top_n,
            max_count_per_host,
            next_batch_id: AtomicU32::new(1),
            next_item_id: AtomicU32::new(1),
        }
    }

    pub fn from_config(config: &crate::config::GenerateConfig) -> Self {
        Self::new(config.top_n, config.max_count_per_host)
    }

    /// Runs one generate cycle
    ///
    /// Candidates are ordered by descending score, capped at `top_n` for
    /// the cycle, and capped per host; surviving candidates become tasks
    /// with fresh item ids and are produced into the monitor.
    pub fn generate(&self, monitor: &TaskMonitor, mut candidates: Vec<Candidate>) -> GenerateStats {
        let batch_id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total = candidates.len();
        let dropped_batch_overflow = total.saturating_sub(self.top_n);
        candidates.truncate(self.top_n);

        let mut per_host: HashMap<String, usize> = HashMap::new();
        let mut generated = 0;
        let mut dropped_host_overflow = 0;
        let mut unroutable = 0;

        for candidate in candidates {
            let item_id = self.next_item_id.fetch_add(1, Ordering::Relaxed);
            let Some(task) = FetchTask::create(item_id, candidate.priority, candidate.url.clone())
            else {
                tracing::warn!("Skipping unroutable candidate {}", candidate.url);
                unroutable += 1;
                continue;
            };

            let count = per_host.entry(task.host().to_string()).or_insert(0);
            if *count >= self.max_count_per_host {
                dropped_host_overflow += 1;
                continue;
            }
            *count += 1;

            if monitor.produce(task) {
                generated += 1;
            }
        }

        if dropped_host_overflow > 0 {
            tracing::warn!(
                "Batch {}: dropped {} tasks over the per-host cap of {}; \
                 a later generate cycle may pick them up again",
                batch_id,
                dropped_host_overflow,
                self.max_count_per_host
            );
        }

        tracing::info!(
            "Batch {}: generated {} tasks ({} candidates, {} over batch cap, {} unroutable)",
            batch_id,
            generated,
            total,
            dropped_batch_overflow,
            unroutable
        );

        GenerateStats {
            batch_id,
            generated,
            dropped_host_overflow,
            dropped_batch_overflow,
            unroutable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;

    fn fast_monitor() -> TaskMonitor {
        TaskMonitor::new(&FetchConfig {
            crawl_delay_ms: 0,
            min_crawl_delay_ms: 0,
            pool_threads: 0,
            ..FetchConfig::default()
        })
    }

    fn candidate(path: &str, score: f32, priority: i32) -> Candidate {
        let url = Url::parse(&format!("https://example.com/{}", path)).unwrap();
        Candidate::new(url, score, priority)
    }

    #[test]
    fn test_generate_produces_tasks() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 100);

        let stats = generator.generate(
            &monitor,
            vec![
                candidate("a", 0.9, 5),
                candidate("b", 0.5, 5),
                candidate("c", 0.7, 5),
            ],
        );

        assert_eq!(stats.generated, 3);
        assert_eq!(stats.dropped_host_overflow, 0);
        assert_eq!(monitor.ready_task_count(), 3);
    }

    #[test]
    fn test_generate_orders_by_score() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 100);

        generator.generate(
            &monitor,
            vec![
                candidate("low", 0.1, 5),
                candidate("high", 0.9, 5),
                candidate("mid", 0.5, 5),
            ],
        );

        // Same pool, FIFO ready queue: highest score was queued first
        let first = monitor.consume().unwrap();
        assert_eq!(first.url().path(), "/high");
        let second = monitor.consume().unwrap();
        assert_eq!(second.url().path(), "/mid");
    }

    #[test]
    fn test_generate_caps_batch_at_top_n() {
        let monitor = fast_monitor();
        let generator = Generator::new(2, 100);

        let stats = generator.generate(
            &monitor,
            vec![
                candidate("a", 0.9, 5),
                candidate("b", 0.8, 5),
                candidate("c", 0.7, 5),
                candidate("d", 0.6, 5),
            ],
        );

        assert_eq!(stats.generated, 2);
        assert_eq!(stats.dropped_batch_overflow, 2);
    }

    #[test]
    fn test_generate_drops_host_overflow() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 2);

        let mut candidates = vec![
            candidate("a", 0.9, 5),
            candidate("b", 0.8, 5),
            candidate("c", 0.7, 5),
        ];
        candidates.push(Candidate::new(
            Url::parse("https://other.com/x").unwrap(),
            0.6,
            5,
        ));

        let stats = generator.generate(&monitor, candidates);

        // Two for example.com, the third dropped; other.com unaffected
        assert_eq!(stats.generated, 3);
        assert_eq!(stats.dropped_host_overflow, 1);
    }

    #[test]
    fn test_generate_skips_unroutable_urls() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 100);

        let stats = generator.generate(
            &monitor,
            vec![Candidate::new(
                Url::parse("data:text/plain,hi").unwrap(),
                0.9,
                5,
            )],
        );

        assert_eq!(stats.generated, 0);
        assert_eq!(stats.unroutable, 1);
    }

    #[test]
    fn test_batch_ids_increase() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 100);

        let first = generator.generate(&monitor, vec![candidate("a", 0.9, 5)]);
        let second = generator.generate(&monitor, vec![candidate("b", 0.9, 5)]);

        assert!(second.batch_id > first.batch_id);
    }

    #[test]
    fn test_item_ids_unique_across_batches() {
        let monitor = fast_monitor();
        let generator = Generator::new(100, 100);

        generator.generate(&monitor, vec![candidate("a", 0.9, 5)]);
        generator.generate(&monitor, vec![candidate("b", 0.9, 5)]);

        let first = monitor.consume().unwrap();
        let second = monitor.consume().unwrap();
        assert_ne!(first.item_id(), second.item_id());
    }
}
