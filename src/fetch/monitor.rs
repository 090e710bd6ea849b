//! Synchronized facade over the pool queue
//!
//! The [`TaskMonitor`] is what the generate step and the fetch workers
//! actually talk to. It creates pools lazily as tasks for new
//! `(priority, protocol, host)` combinations arrive, serves tasks from the
//! highest-priority eligible pool, routes completions back to the owning
//! pool, and runs the lifecycle policies: lease-expiry retune, draining
//! disabled pools, and retiring pools that have become too slow.
//!
//! All state lives behind one mutex; every public method takes `&self` and
//! is safe to call from any number of worker threads.

use crate::config::FetchConfig;
use crate::fetch::{FetchTask, PoolKey, PoolQueue, TaskPool};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Pending tasks fewer than this are dropped outright when their pool is
/// retired as too slow
const MIN_PENDING_SLOW_TASKS: usize = 2;

#[derive(Debug, Default)]
struct Counters {
    ready: usize,
    pending: usize,
    finished: u64,
}

#[derive(Debug)]
struct MonitorInner {
    pools: PoolQueue,
    counters: Counters,
    /// Priority of the most recently consumed task; consumption below it
    /// waits for higher-priority pending work to drain
    last_task_priority: i32,
    /// Set once the feeder has produced everything it will produce
    feeder_completed: bool,
}

/// Shared scheduler entry point for producers and fetch workers
#[derive(Debug)]
pub struct TaskMonitor {
    crawl_delay: Duration,
    min_crawl_delay: Duration,
    pool_threads: u32,
    pending_timeout: Duration,
    inner: Mutex<MonitorInner>,
}

impl TaskMonitor {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            crawl_delay: config.crawl_delay(),
            min_crawl_delay: config.min_crawl_delay(),
            pool_threads: config.pool_threads,
            pending_timeout: config.pending_timeout(),
            inner: Mutex::new(MonitorInner {
                pools: PoolQueue::new(),
                counters: Counters::default(),
                last_task_priority: i32::MIN,
                feeder_completed: false,
            }),
        }
    }

    /// Routes a task into its pool, creating the pool if needed
    ///
    /// A matching inactive pool is re-enabled rather than duplicated.
    /// Returns whether the task was accepted.
    pub fn produce(&self, task: FetchTask) -> bool {
        self.produce_at(task, Instant::now())
    }

    pub fn produce_at(&self, task: FetchTask, now: Instant) -> bool {
        let mut inner = self.lock();
        let key = task.pool_key();

        if inner.pools.find(&key).is_none() && !inner.pools.enable(&key) {
            let pool = TaskPool::new(
                key.clone(),
                self.pool_threads,
                self.crawl_delay,
                self.min_crawl_delay,
                self.pending_timeout,
                now,
            );
            tracing::info!("Task pool created: {}", key);
            inner.pools.add(pool);
        }

        let accepted = match inner.pools.find_mut(&key) {
            Some(pool) => pool.produce(task),
            None => false,
        };

        if accepted {
            inner.counters.ready += 1;
        }
        accepted
    }

    /// Serves a task from the highest-priority eligible pool
    ///
    /// When the serving priority is about to drop below the last consumed
    /// priority, consumption waits until all higher-priority pending work
    /// has drained. Returns `None` when no pool may serve right now; the
    /// caller is expected to back off and poll again.
    pub fn consume(&self) -> Option<FetchTask> {
        self.consume_at(Instant::now())
    }

    pub fn consume_at(&self, now: Instant) -> Option<FetchTask> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let next_priority = inner.pools.peek()?.priority();
        let priority_changed = next_priority < inner.last_task_priority;
        if priority_changed && inner.pools.has_prior_pending_tasks(next_priority) {
            // Higher-priority work is still in flight
            return None;
        }

        if priority_changed {
            tracing::info!(
                "Fetch priority changed: {} -> {}",
                inner.last_task_priority,
                next_priority
            );
        }

        for key in inner.pools.active_keys() {
            let Some(pool) = inner.pools.find_mut(&key) else {
                continue;
            };
            if let Some(task) = pool.consume(now) {
                inner.counters.ready = inner.counters.ready.saturating_sub(1);
                inner.counters.pending += 1;
                inner.last_task_priority = task.priority();
                return Some(task);
            }
        }

        None
    }

    /// Serves a task from one specific pool, bypassing priority selection
    pub fn consume_from(&self, key: &PoolKey) -> Option<FetchTask> {
        self.consume_from_at(key, Instant::now())
    }

    pub fn consume_from_at(&self, key: &PoolKey, now: Instant) -> Option<FetchTask> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let task = inner.pools.find_mut(key)?.consume(now)?;

        inner.counters.ready = inner.counters.ready.saturating_sub(1);
        inner.counters.pending += 1;
        inner.last_task_priority = task.priority();
        Some(task)
    }

    /// Marks a dispatched task finished
    ///
    /// The owning pool may be active or inactive. Returns `false` for an
    /// unknown pool, an unknown item, or a stale lease.
    pub fn finish(&self, task: &FetchTask, asap: bool) -> bool {
        self.finish_at(task, asap, Instant::now())
    }

    /// Marks a task finished without imposing a crawl delay
    pub fn finish_asap(&self, task: &FetchTask) -> bool {
        self.finish_at(task, true, Instant::now())
    }

    pub fn finish_at(&self, task: &FetchTask, asap: bool, now: Instant) -> bool {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let key = task.pool_key();

        let Some(pool) = inner.pools.find_extend_mut(&key) else {
            tracing::warn!("Attempt to finish task from unknown pool {}", key);
            return false;
        };

        if !pool.finish(task.item_id(), task.epoch(), asap, now) {
            return false;
        }

        inner.counters.pending = inner.counters.pending.saturating_sub(1);
        inner.counters.finished += 1;
        true
    }

    /// Reclaims timed-out pending tasks across all active pools
    ///
    /// Returns the total number of tasks moved back to ready. This is the
    /// only liveness mechanism for tasks whose worker died or hung.
    pub fn retune(&self, force: bool) -> usize {
        self.retune_at(force, Instant::now())
    }

    pub fn retune_at(&self, force: bool, now: Instant) -> usize {
        let mut inner = self.lock();

        let mut reclaimed = 0;
        for pool in inner.pools.iter_mut() {
            reclaimed += pool.retune(force, now);
        }

        if reclaimed > 0 {
            tracing::info!("Reclaimed {} timed-out pending tasks", reclaimed);
        }

        inner.recalculate_counters();
        reclaimed
    }

    /// Disables pools that have fully drained once feeding is complete
    pub fn maintain(&self) {
        let mut inner = self.lock();
        if !inner.feeder_completed {
            return;
        }

        let drained: Vec<PoolKey> = inner
            .pools
            .iter()
            .filter(|pool| !pool.has_tasks())
            .map(|pool| pool.key().clone())
            .collect();

        for key in drained {
            if inner.pools.disable(&key) {
                tracing::info!("Pool {} drained, disabled", key);
            }
        }
    }

    /// Disables a pool, keeping its pending tasks tracked
    ///
    /// Operator-level intervention: the pool stops serving and accepting
    /// tasks but in-flight fetches can still finish against it.
    pub fn disable_pool(&self, key: &PoolKey) -> bool {
        self.lock().pools.disable(key)
    }

    /// Returns a disabled pool to active service
    pub fn enable_pool(&self, key: &PoolKey) -> bool {
        self.lock().pools.enable(key)
    }

    /// Retires a pool and removes it from the queue entirely
    ///
    /// Intended for hosts an external reachability tracker has judged
    /// gone. Returns `false` when the pool does not exist.
    pub fn retire_pool(&self, key: &PoolKey) -> bool {
        let mut inner = self.lock();
        match inner.pools.remove(key) {
            Some(mut pool) => {
                pool.retire();
                tracing::info!("Retired pool {}", key);
                inner.recalculate_counters();
                true
            }
            None => false,
        }
    }

    /// Retires the slowest active pool when it underperforms
    ///
    /// The pool with the worst recent time cost is examined; when its
    /// lifetime throughput is below `min_tho_rate` it is retired, a few
    /// straggling pending tasks are dropped, and its ready tasks are
    /// cleared. Returns the number of ready tasks dropped.
    pub fn try_clear_slowest_pool(&self, min_tho_rate: f64) -> usize {
        self.try_clear_slowest_pool_at(min_tho_rate, Instant::now())
    }

    pub fn try_clear_slowest_pool_at(&self, min_tho_rate: f64, now: Instant) -> usize {
        let mut inner = self.lock();

        let slowest = inner
            .pools
            .iter()
            .max_by(|a, b| {
                a.average_recent_time_cost()
                    .partial_cmp(&b.average_recent_time_cost())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|pool| pool.key().clone());
        let Some(key) = slowest else {
            return 0;
        };

        let Some(mut pool) = inner.pools.remove(&key) else {
            return 0;
        };

        if pool.average_tho_rate() >= min_tho_rate {
            tracing::info!(
                "Slowest pool {} still efficient ({:.2} p/s), keeping",
                key,
                pool.average_tho_rate()
            );
            inner.pools.add(pool);
            return 0;
        }

        pool.retire();
        pool.clear_pending_tasks_if_few(MIN_PENDING_SLOW_TASKS, now);
        let deleted = pool.clear_ready_tasks();

        tracing::info!(
            "Retired slowest pool {}: {:.2} s/p, {:.2} p/s, dropped {} ready tasks",
            key,
            pool.average_time_cost(),
            pool.average_tho_rate(),
            deleted
        );

        inner.recalculate_counters();
        deleted
    }

    pub fn set_feeder_completed(&self) {
        self.lock().feeder_completed = true;
    }

    pub fn is_feeder_completed(&self) -> bool {
        self.lock().feeder_completed
    }

    pub fn pool_count(&self) -> usize {
        self.lock().pools.len()
    }

    pub fn ready_task_count(&self) -> usize {
        self.lock().counters.ready
    }

    pub fn pending_task_count(&self) -> usize {
        self.lock().counters.pending
    }

    pub fn finished_task_count(&self) -> u64 {
        self.lock().counters.finished
    }

    /// Ready plus pending tasks across active pools
    pub fn task_count(&self) -> usize {
        let inner = self.lock();
        inner.counters.ready + inner.counters.pending
    }

    /// Completions discarded for carrying a stale lease epoch
    pub fn stale_task_count(&self) -> u64 {
        let inner = self.lock();
        inner
            .pools
            .iter()
            .chain(inner.pools.iter_inactive())
            .map(|pool| pool.stale_finish_count())
            .sum()
    }

    /// Whether a given item is pending in the pool owning `key`
    pub fn pending_task_exists(&self, key: &PoolKey, item_id: u32) -> bool {
        let inner = self.lock();
        inner
            .pools
            .find_extend(key)
            .map(|pool| pool.pending_task_exists(item_id))
            .unwrap_or(false)
    }

    /// Cost lines for the slowest pools
    pub fn cost_report(&self) -> String {
        self.lock().pools.cost_report()
    }

    /// Logs a diagnostic snapshot of the queue
    pub fn dump(&self, limit: usize) {
        let mut inner = self.lock();
        inner.pools.dump(limit);
        inner.recalculate_counters();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorInner> {
        // A worker panicking mid-operation leaves no partial mutation worth
        // preserving; recover the guard and continue.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MonitorInner {
    fn recalculate_counters(&mut self) {
        let mut ready = 0;
        let mut pending = 0;
        for pool in self.pools.iter() {
            ready += pool.ready_count();
            pending += pool.pending_count();
        }
        self.counters.ready = ready;
        self.counters.pending = pending;
    }
}
