//! Host-scoped task pool with politeness enforcement
//!
//! A [`TaskPool`] holds every task destined for one `(priority, protocol,
//! host)` triple. It keeps a FIFO queue of ready tasks, a map of tasks
//! dispatched but not yet finished, timing statistics, and the politeness
//! clock that spaces out requests to the host.

use crate::fetch::{FetchTask, PoolKey};
use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

/// How many recent task durations the statistics windows keep
const RECENT_TASKS_LIMIT: usize = 100;

/// Tasks that take longer than this are recorded as slow
const SLOW_TASK_THRESHOLD: Duration = Duration::from_millis(500);

/// Lifecycle state of a task pool
///
/// An inactive pool accepts no tasks and serves no requests, but still
/// holds its pending tasks so in-flight fetches can finish. A retired pool
/// is permanently out of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    Active,
    Inactive,
    Retired,
}

/// Holds all fetch tasks for one host at one priority
///
/// The pool is the sole admission-control gate: [`consume`] enforces both
/// the per-host concurrency cap and the crawl-delay politeness clock.
/// A task is in exactly one of the ready queue or the pending map until it
/// finishes or is dropped.
///
/// [`consume`]: TaskPool::consume
#[derive(Debug)]
pub struct TaskPool {
    key: PoolKey,

    /// Max concurrent pending tasks; 0 means unlimited
    allowed_threads: u32,
    crawl_delay: Duration,
    min_crawl_delay: Duration,
    /// Pending tasks older than this are reclaimed by [`retune`](Self::retune)
    pending_timeout: Duration,

    /// Tasks not yet dispatched to a worker, FIFO
    ready_tasks: VecDeque<FetchTask>,
    /// Tasks dispatched but not yet finished, keyed by item id
    pending_tasks: BTreeMap<u32, FetchTask>,

    /// Earliest time the next task may be dispatched
    next_fetch_time: Instant,

    /// Durations of the most recent finished tasks
    recent_durations: VecDeque<Duration>,
    /// Durations of recent tasks that exceeded the slow threshold
    slow_tasks: VecDeque<Duration>,

    // Lifetime totals start at 1/1 so the averages are defined from the
    // first query; early lifetime averages are biased toward 1 s/task.
    total_finished_tasks: u64,
    total_fetch_millis: u64,

    /// Completions discarded because their lease epoch was stale
    stale_finishes: u64,

    status: PoolStatus,
}

impl TaskPool {
    /// Creates an active pool whose politeness clock starts at `now`
    pub fn new(
        key: PoolKey,
        allowed_threads: u32,
        crawl_delay: Duration,
        min_crawl_delay: Duration,
        pending_timeout: Duration,
        now: Instant,
    ) -> Self {
        Self {
            key,
            allowed_threads,
            crawl_delay,
            min_crawl_delay,
            pending_timeout,
            ready_tasks: VecDeque::new(),
            pending_tasks: BTreeMap::new(),
            next_fetch_time: now,
            recent_durations: VecDeque::with_capacity(RECENT_TASKS_LIMIT),
            slow_tasks: VecDeque::with_capacity(RECENT_TASKS_LIMIT),
            total_finished_tasks: 1,
            total_fetch_millis: 1,
            stale_finishes: 0,
            status: PoolStatus::Active,
        }
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn priority(&self) -> i32 {
        self.key.priority()
    }

    pub fn host(&self) -> &str {
        self.key.host()
    }

    pub fn status(&self) -> PoolStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == PoolStatus::Active
    }

    pub fn is_inactive(&self) -> bool {
        self.status == PoolStatus::Inactive
    }

    pub fn is_retired(&self) -> bool {
        self.status == PoolStatus::Retired
    }

    pub fn enable(&mut self) {
        self.status = PoolStatus::Active;
    }

    pub fn disable(&mut self) {
        self.status = PoolStatus::Inactive;
    }

    pub fn retire(&mut self) {
        self.status = PoolStatus::Retired;
    }

    /// Appends a task to the ready queue
    ///
    /// Inactive and retired pools never accept new work. A task whose
    /// priority or host does not match the pool key is a caller bug; it is
    /// logged and rejected rather than misfiled. Returns whether the task
    /// was accepted.
    pub fn produce(&mut self, task: FetchTask) -> bool {
        if self.status != PoolStatus::Active {
            tracing::debug!("Pool {} is {:?}, dropping produce", self.key, self.status);
            return false;
        }

        if task.priority() != self.key.priority() || task.host() != self.key.host() {
            tracing::error!(
                "Pool key {} mismatches task <{}, {}>",
                self.key,
                task.item_id(),
                task.url()
            );
            return false;
        }

        self.ready_tasks.push_back(task);
        true
    }

    /// Dispatches the next ready task, if the pool may serve one at `now`
    ///
    /// Returns `None` when the pool is not active, the concurrency cap is
    /// reached, the politeness clock has not expired, or no task is ready.
    /// On success the task is stamped and moved into the pending map; the
    /// returned copy carries the lease epoch the eventual
    /// [`finish`](Self::finish) call must present.
    pub fn consume(&mut self, now: Instant) -> Option<FetchTask> {
        if self.status != PoolStatus::Active {
            return None;
        }

        if self.allowed_threads > 0 && self.pending_tasks.len() >= self.allowed_threads as usize {
            return None;
        }

        if now < self.next_fetch_time {
            return None;
        }

        let mut task = self.ready_tasks.pop_front()?;
        task.set_pending_start(now);
        self.pending_tasks.insert(task.item_id(), task.clone());

        Some(task)
    }

    /// Marks a pending task finished
    ///
    /// Returns `false` when the item id is unknown (a double finish, or a
    /// finish for a task another pool owns) or when `epoch` is stale
    /// because the task was already reclaimed and re-leased. On success the
    /// elapsed time feeds the statistics windows and the politeness clock
    /// advances: immediately when `asap`, else by the full crawl delay for
    /// serial pools or the minimum delay for pools allowed concurrency.
    pub fn finish(&mut self, item_id: u32, epoch: u32, asap: bool, now: Instant) -> bool {
        let task = match self.pending_tasks.remove(&item_id) {
            Some(task) => task,
            None => {
                tracing::warn!("Failed to finish unknown task {} in pool {}", item_id, self.key);
                return false;
            }
        };

        if epoch != task.epoch() {
            tracing::debug!(
                "Discarding stale completion for task {} in pool {} (epoch {} != {})",
                item_id,
                self.key,
                epoch,
                task.epoch()
            );
            self.stale_finishes += 1;
            self.pending_tasks.insert(item_id, task);
            return false;
        }

        self.set_next_fetch_time(now, asap);

        let time_cost = task
            .pending_start()
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();

        if time_cost > SLOW_TASK_THRESHOLD {
            if self.slow_tasks.len() >= RECENT_TASKS_LIMIT {
                self.slow_tasks.pop_front();
            }
            self.slow_tasks.push_back(time_cost);
        }

        if self.recent_durations.len() >= RECENT_TASKS_LIMIT {
            self.recent_durations.pop_front();
        }
        self.recent_durations.push_back(time_cost);

        self.total_finished_tasks += 1;
        self.total_fetch_millis += time_cost.as_millis() as u64;

        true
    }

    /// Reclaims pending tasks that have exceeded the pending timeout
    ///
    /// Reclaimed tasks move back to the ready queue with a bumped lease
    /// epoch, so a late completion of the original dispatch is discarded
    /// instead of racing the retry. When `force` is set every pending task
    /// is reclaimed regardless of age. Returns the number reclaimed.
    pub fn retune(&mut self, force: bool, now: Instant) -> usize {
        let expired: Vec<u32> = self
            .pending_tasks
            .values()
            .filter(|task| {
                force
                    || task
                        .pending_start()
                        .map(|start| now > start + self.pending_timeout)
                        .unwrap_or(true)
            })
            .map(|task| task.item_id())
            .collect();

        for item_id in &expired {
            if let Some(mut task) = self.pending_tasks.remove(item_id) {
                task.clear_pending_start();
                task.bump_epoch();
                self.ready_tasks.push_back(task);
            }
        }

        expired.len()
    }

    pub fn has_ready_tasks(&self) -> bool {
        !self.ready_tasks.is_empty()
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.pending_tasks.is_empty()
    }

    pub fn has_tasks(&self) -> bool {
        self.has_ready_tasks() || self.has_pending_tasks()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_tasks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_tasks.len()
    }

    pub fn finished_count(&self) -> u64 {
        self.total_finished_tasks
    }

    pub fn slow_task_count(&self) -> usize {
        self.slow_tasks.len()
    }

    pub fn stale_finish_count(&self) -> u64 {
        self.stale_finishes
    }

    pub fn pending_task_exists(&self, item_id: u32) -> bool {
        self.pending_tasks.contains_key(&item_id)
    }

    pub fn get_pending_task(&self, item_id: u32) -> Option<&FetchTask> {
        self.pending_tasks.get(&item_id)
    }

    /// Lifetime average cost in seconds per task
    pub fn average_time_cost(&self) -> f64 {
        self.total_fetch_millis as f64 / 1000.0 / self.total_finished_tasks as f64
    }

    /// Lifetime throughput in tasks per second
    pub fn average_tho_rate(&self) -> f64 {
        self.total_finished_tasks as f64 / (self.total_fetch_millis as f64 / 1000.0)
    }

    /// Average cost in seconds per task over the recent window
    ///
    /// An empty window reports 1.0 s/task, so a freshly created pool is
    /// judged against a one-second baseline rather than dividing by zero.
    pub fn average_recent_time_cost(&self) -> f64 {
        if self.recent_durations.is_empty() {
            return 1.0;
        }

        let total_millis: u128 = self.recent_durations.iter().map(|d| d.as_millis()).sum();
        total_millis as f64 / 1000.0 / self.recent_durations.len() as f64
    }

    /// Throughput in tasks per second over the recent window
    pub fn average_recent_tho_rate(&self) -> f64 {
        if self.recent_durations.is_empty() {
            return 1.0;
        }

        let total_millis: u128 = self.recent_durations.iter().map(|d| d.as_millis()).sum();
        self.recent_durations.len() as f64 / (total_millis.max(1) as f64 / 1000.0)
    }

    /// Whether the recent average cost exceeds `threshold`
    pub fn is_slow(&self, threshold: Duration) -> bool {
        self.average_recent_time_cost() > threshold.as_secs_f64()
    }

    /// One report line: average cost and throughput for this pool
    pub fn cost_report(&self) -> String {
        format!(
            "{:>40} -> aveTimeCost: {:.2} s/p, avgThoRate: {:.2} p/s",
            self.key.to_string(),
            self.average_time_cost(),
            self.average_tho_rate()
        )
    }

    /// Drops every ready task, returning how many were dropped
    pub fn clear_ready_tasks(&mut self) -> usize {
        let count = self.ready_tasks.len();
        self.ready_tasks.clear();
        count
    }

    /// Drops every pending task, returning how many were dropped
    pub fn clear_pending_tasks(&mut self) -> usize {
        let count = self.pending_tasks.len();
        self.pending_tasks.clear();
        count
    }

    /// Drops the pending tasks when only a few stragglers remain
    ///
    /// Used when retiring a slow pool: a handful of hung fetches should
    /// not keep the pool alive. No-ops when more than `threshold` tasks
    /// are pending. Returns the number dropped.
    pub fn clear_pending_tasks_if_few(&mut self, threshold: usize, now: Instant) -> usize {
        let count = self.pending_tasks.len();
        if count == 0 || count > threshold {
            return 0;
        }

        let report: Vec<String> = self
            .pending_tasks
            .values()
            .map(|task| {
                let elapsed = task
                    .pending_start()
                    .map(|start| now.saturating_duration_since(start))
                    .unwrap_or_default();
                format!("{} : {:?}", task.url(), elapsed)
            })
            .collect();
        tracing::info!("Clearing slow pending tasks: {}", report.join(", "));

        self.pending_tasks.clear();
        count
    }

    fn set_next_fetch_time(&mut self, finish_time: Instant, asap: bool) {
        self.next_fetch_time = if asap {
            finish_time
        } else if self.allowed_threads > 1 {
            finish_time + self.min_crawl_delay
        } else {
            finish_time + self.crawl_delay
        };
    }
}
