//! Fetch task model

use crate::fetch::PoolKey;
use crate::url::{extract_host, extract_protocol};
use std::time::Instant;
use url::Url;

/// One URL to be fetched
///
/// Created during the generate step, queued into the [`TaskPool`] matching
/// its `(priority, protocol, host)`, and destroyed once it finishes or is
/// dropped. The only mutation after creation is the pending stamp applied
/// at dispatch and the lease epoch bumped when a timed-out task is
/// reclaimed for retry.
///
/// [`TaskPool`]: crate::fetch::TaskPool
#[derive(Debug, Clone)]
pub struct FetchTask {
    item_id: u32,
    priority: i32,
    url: Url,
    protocol: String,
    host: String,
    /// Set when the task moves from ready to pending
    pending_start: Option<Instant>,
    /// Lease epoch; bumped each time the task is reclaimed after a timeout.
    /// A completion carrying a stale epoch is discarded.
    epoch: u32,
}

impl FetchTask {
    /// Creates a task, deriving protocol and host from the URL
    ///
    /// Returns `None` when the URL has no host and therefore cannot be
    /// routed to any pool.
    pub fn create(item_id: u32, priority: i32, url: Url) -> Option<Self> {
        let host = extract_host(&url)?;
        let protocol = extract_protocol(&url);

        Some(Self {
            item_id,
            priority,
            url,
            protocol,
            host,
            pending_start: None,
            epoch: 0,
        })
    }

    pub fn item_id(&self) -> u32 {
        self.item_id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn pending_start(&self) -> Option<Instant> {
        self.pending_start
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// The key of the pool this task belongs to
    pub fn pool_key(&self) -> PoolKey {
        PoolKey::new(self.priority, self.protocol.clone(), self.host.clone())
    }

    pub(crate) fn set_pending_start(&mut self, now: Instant) {
        self.pending_start = Some(now);
    }

    pub(crate) fn clear_pending_start(&mut self) {
        self.pending_start = None;
    }

    pub(crate) fn bump_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_derives_protocol_and_host() {
        let url = Url::parse("https://Example.COM/page").unwrap();
        let task = FetchTask::create(1, 5, url).unwrap();

        assert_eq!(task.item_id(), 1);
        assert_eq!(task.priority(), 5);
        assert_eq!(task.protocol(), "https");
        assert_eq!(task.host(), "example.com");
        assert!(task.pending_start().is_none());
        assert_eq!(task.epoch(), 0);
    }

    #[test]
    fn test_create_rejects_hostless_url() {
        let url = Url::parse("data:text/plain,hi").unwrap();
        assert!(FetchTask::create(1, 5, url).is_none());
    }

    #[test]
    fn test_pool_key_matches_task() {
        let url = Url::parse("http://b.com/x").unwrap();
        let task = FetchTask::create(9, 2, url).unwrap();

        assert_eq!(task.pool_key(), PoolKey::new(2, "http", "b.com"));
    }
}
