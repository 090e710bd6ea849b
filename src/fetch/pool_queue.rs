//! Priority collection of task pools
//!
//! Active pools are served in priority order; inactive pools are kept
//! aside so their in-flight pending tasks can still be tracked to
//! completion, but are never returned by `poll`/`peek`.

use crate::fetch::{PoolKey, TaskPool};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// How many pools the cost report covers
const COST_REPORT_LIMIT: usize = 50;

/// Serving order for the active set
///
/// Numerically larger priorities are served first; ties fall through to
/// protocol then host lexicographically, so iteration order is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ServeOrder(PoolKey);

impl Ord for ServeOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .priority()
            .cmp(&self.0.priority())
            .then_with(|| self.0.protocol().cmp(other.0.protocol()))
            .then_with(|| self.0.host().cmp(other.0.host()))
    }
}

impl PartialOrd for ServeOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of task pools with an inactive side-pen
///
/// The active set is a single ordered map keyed by the serving comparator,
/// so the priority ordering and the key index are one structure and cannot
/// drift apart. Disabled pools move to the inactive map, where
/// [`find_extend`](Self::find_extend) can still reach them to finish
/// pending tasks.
#[derive(Debug, Default)]
pub struct PoolQueue {
    active: BTreeMap<ServeOrder, TaskPool>,
    inactive: HashMap<PoolKey, TaskPool>,
}

impl PoolQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of active pools
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Number of inactive pools
    pub fn inactive_len(&self) -> usize {
        self.inactive.len()
    }

    /// Inserts a pool into the active set
    ///
    /// Returns `false` (and leaves the existing pool in place) when an
    /// active pool with the same key is already present.
    pub fn add(&mut self, pool: TaskPool) -> bool {
        let order = ServeOrder(pool.key().clone());
        if self.active.contains_key(&order) {
            tracing::warn!("Pool {} is already queued, ignoring add", pool.key());
            return false;
        }

        self.active.insert(order, pool);
        true
    }

    /// Alias for [`add`](Self::add), matching queue-style call sites
    pub fn offer(&mut self, pool: TaskPool) -> bool {
        self.add(pool)
    }

    /// Removes and returns the highest-priority active pool
    pub fn poll(&mut self) -> Option<TaskPool> {
        self.active.pop_first().map(|(_, pool)| pool)
    }

    /// The highest-priority active pool, without removing it
    pub fn peek(&self) -> Option<&TaskPool> {
        self.active.first_key_value().map(|(_, pool)| pool)
    }

    pub fn peek_mut(&mut self) -> Option<&mut TaskPool> {
        self.active.first_entry().map(|entry| entry.into_mut())
    }

    /// Removes a pool from the active set and the inactive map alike
    pub fn remove(&mut self, key: &PoolKey) -> Option<TaskPool> {
        self.active
            .remove(&ServeOrder(key.clone()))
            .or_else(|| self.inactive.remove(key))
    }

    /// Moves an inactive pool back into active service
    ///
    /// Returns `false` when no inactive pool has this key.
    pub fn enable(&mut self, key: &PoolKey) -> bool {
        match self.inactive.remove(key) {
            Some(mut pool) => {
                pool.enable();
                self.active.insert(ServeOrder(key.clone()), pool);
                true
            }
            None => false,
        }
    }

    /// Removes a pool from serving and files it under the inactive map
    ///
    /// The pool stops accepting and serving tasks but remains reachable
    /// via [`find_extend`](Self::find_extend) so pending tasks can still
    /// complete. Returns `false` when no active pool has this key.
    pub fn disable(&mut self, key: &PoolKey) -> bool {
        match self.active.remove(&ServeOrder(key.clone())) {
            Some(mut pool) => {
                pool.disable();
                self.inactive.insert(key.clone(), pool);
                true
            }
            None => false,
        }
    }

    /// Active-only lookup
    pub fn find(&self, key: &PoolKey) -> Option<&TaskPool> {
        self.active.get(&ServeOrder(key.clone()))
    }

    pub fn find_mut(&mut self, key: &PoolKey) -> Option<&mut TaskPool> {
        self.active.get_mut(&ServeOrder(key.clone()))
    }

    /// Active-or-inactive lookup
    pub fn find_extend(&self, key: &PoolKey) -> Option<&TaskPool> {
        self.find(key).or_else(|| self.inactive.get(key))
    }

    pub fn find_extend_mut(&mut self, key: &PoolKey) -> Option<&mut TaskPool> {
        if self.active.contains_key(&ServeOrder(key.clone())) {
            return self.active.get_mut(&ServeOrder(key.clone()));
        }
        self.inactive.get_mut(key)
    }

    /// Whether work above `priority` is still in flight
    ///
    /// True when any active pool with priority strictly greater than
    /// `priority` has pending tasks, or any inactive pool with priority
    /// greater than or equal to it does. Lower-priority consumption waits
    /// on this gate when the serving priority drops.
    pub fn has_prior_pending_tasks(&self, priority: i32) -> bool {
        let active_prior = self
            .active
            .values()
            .take_while(|pool| pool.priority() > priority)
            .any(|pool| pool.has_pending_tasks());
        if active_prior {
            return true;
        }

        self.inactive
            .values()
            .any(|pool| pool.priority() >= priority && pool.has_pending_tasks())
    }

    /// Iterates over active pools in serving order
    pub fn iter(&self) -> impl Iterator<Item = &TaskPool> {
        self.active.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskPool> {
        self.active.values_mut()
    }

    /// Iterates over inactive pools, in no particular order
    pub fn iter_inactive(&self) -> impl Iterator<Item = &TaskPool> {
        self.inactive.values()
    }

    /// Keys of all active pools, in serving order
    pub fn active_keys(&self) -> Vec<PoolKey> {
        self.active.keys().map(|order| order.0.clone()).collect()
    }

    /// Drops every pool, active and inactive
    pub fn clear(&mut self) {
        self.active.clear();
        self.inactive.clear();
    }

    /// Cost lines for the slowest active pools, most expensive first
    pub fn cost_report(&self) -> String {
        let mut pools: Vec<&TaskPool> = self.active.values().collect();
        pools.sort_by(|a, b| {
            b.average_time_cost()
                .partial_cmp(&a.average_time_cost())
                .unwrap_or(Ordering::Equal)
        });

        pools
            .iter()
            .take(COST_REPORT_LIMIT)
            .map(|pool| pool.cost_report())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Logs a diagnostic snapshot of the queue
    ///
    /// Covers up to `limit` active pools holding any tasks and up to
    /// `limit` inactive pools still holding pending tasks.
    pub fn dump(&self, limit: usize) {
        tracing::info!(
            "Pool queue: {} active, {} inactive",
            self.active.len(),
            self.inactive.len()
        );

        for pool in self.active.values().filter(|p| p.has_tasks()).take(limit) {
            tracing::info!(
                "  active {} ready: {}, pending: {}, finished: {}",
                pool.key(),
                pool.ready_count(),
                pool.pending_count(),
                pool.finished_count()
            );
        }

        for pool in self
            .inactive
            .values()
            .filter(|p| p.has_pending_tasks())
            .take(limit)
        {
            tracing::info!(
                "  inactive {} pending: {}",
                pool.key(),
                pool.pending_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchTask;
    use std::time::{Duration, Instant};
    use url::Url;

    fn make_pool(priority: i32, protocol: &str, host: &str) -> TaskPool {
        TaskPool::new(
            PoolKey::new(priority, protocol, host),
            1,
            Duration::ZERO,
            Duration::ZERO,
            Duration::from_secs(60),
            Instant::now(),
        )
    }

    fn make_task(item_id: u32, priority: i32, host: &str) -> FetchTask {
        let url = Url::parse(&format!("https://{}/p/{}", host, item_id)).unwrap();
        FetchTask::create(item_id, priority, url).unwrap()
    }

    #[test]
    fn test_poll_returns_pools_priority_descending() {
        let mut queue = PoolQueue::new();
        for (priority, host) in [(5, "a.com"), (1, "b.com"), (9, "c.com"), (5, "d.com")] {
            queue.add(make_pool(priority, "https", host));
        }

        let priorities: Vec<i32> = std::iter::from_fn(|| queue.poll())
            .map(|pool| pool.priority())
            .collect();
        assert_eq!(priorities, vec![9, 5, 5, 1]);
    }

    #[test]
    fn test_poll_breaks_priority_ties_by_host() {
        let mut queue = PoolQueue::new();
        queue.add(make_pool(10, "http", "a.com"));
        queue.add(make_pool(5, "http", "b.com"));
        queue.add(make_pool(10, "http", "z.com"));

        assert_eq!(queue.poll().unwrap().host(), "a.com");
        assert_eq!(queue.poll().unwrap().host(), "z.com");
        assert_eq!(queue.poll().unwrap().host(), "b.com");
        assert!(queue.poll().is_none());
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut queue = PoolQueue::new();
        queue.add(make_pool(3, "https", "a.com"));

        assert_eq!(queue.peek().unwrap().host(), "a.com");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_add_duplicate_key_rejected() {
        let mut queue = PoolQueue::new();
        assert!(queue.add(make_pool(3, "https", "a.com")));
        assert!(!queue.add(make_pool(3, "https", "a.com")));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_disable_hides_pool_from_poll_but_not_find_extend() {
        let mut queue = PoolQueue::new();
        let key = PoolKey::new(3, "https", "a.com");
        queue.add(make_pool(3, "https", "a.com"));

        assert!(queue.disable(&key));
        assert!(queue.poll().is_none());
        assert!(queue.find(&key).is_none());

        let pool = queue.find_extend(&key).unwrap();
        assert!(pool.is_inactive());
    }

    #[test]
    fn test_disable_enable_round_trip() {
        let mut queue = PoolQueue::new();
        let key = PoolKey::new(3, "https", "a.com");
        queue.add(make_pool(3, "https", "a.com"));

        assert!(queue.disable(&key));
        assert!(queue.enable(&key));

        let pool = queue.peek().unwrap();
        assert_eq!(pool.key(), &key);
        assert!(pool.is_active());
    }

    #[test]
    fn test_enable_unknown_key_is_false() {
        let mut queue = PoolQueue::new();
        assert!(!queue.enable(&PoolKey::new(1, "https", "nowhere.com")));
    }

    #[test]
    fn test_remove_reaches_both_sides() {
        let mut queue = PoolQueue::new();
        let active_key = PoolKey::new(1, "https", "a.com");
        let inactive_key = PoolKey::new(2, "https", "b.com");
        queue.add(make_pool(1, "https", "a.com"));
        queue.add(make_pool(2, "https", "b.com"));
        queue.disable(&inactive_key);

        assert!(queue.remove(&active_key).is_some());
        assert!(queue.remove(&inactive_key).is_some());
        assert!(queue.is_empty());
        assert_eq!(queue.inactive_len(), 0);
    }

    #[test]
    fn test_has_prior_pending_tasks() {
        let mut queue = PoolQueue::new();
        queue.add(make_pool(9, "https", "high.com"));
        queue.add(make_pool(3, "https", "low.com"));

        assert!(!queue.has_prior_pending_tasks(3));

        // Put a task in flight on the high-priority pool
        let high_key = PoolKey::new(9, "https", "high.com");
        let pool = queue.find_mut(&high_key).unwrap();
        pool.produce(make_task(1, 9, "high.com"));
        pool.consume(Instant::now()).unwrap();

        assert!(queue.has_prior_pending_tasks(3));
        // Not prior to its own priority
        assert!(!queue.has_prior_pending_tasks(9));
    }

    #[test]
    fn test_has_prior_pending_tasks_counts_inactive_at_equal_priority() {
        let mut queue = PoolQueue::new();
        let key = PoolKey::new(5, "https", "a.com");
        queue.add(make_pool(5, "https", "a.com"));

        let pool = queue.find_mut(&key).unwrap();
        pool.produce(make_task(1, 5, "a.com"));
        pool.consume(Instant::now()).unwrap();
        queue.disable(&key);

        // Inactive pools gate at >= priority
        assert!(queue.has_prior_pending_tasks(5));
        assert!(!queue.has_prior_pending_tasks(6));
    }

    #[test]
    fn test_cost_report_lists_pools() {
        let mut queue = PoolQueue::new();
        queue.add(make_pool(1, "https", "a.com"));
        queue.add(make_pool(2, "https", "b.com"));

        let report = queue.cost_report();
        assert!(report.contains("a.com"));
        assert!(report.contains("aveTimeCost"));
        assert!(report.contains("avgThoRate"));
    }
}
