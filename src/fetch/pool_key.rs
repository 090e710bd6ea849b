//! Composite key identifying one politeness-scoped task pool

use crate::url::{extract_host, extract_protocol};
use std::fmt;
use url::Url;

/// Identifies one task pool by `(priority, protocol, host)`
///
/// Two tasks sharing the same triple always route to the same pool, which
/// is what makes crawl-delay politeness enforceable per host. The key is
/// immutable after construction.
///
/// Natural ordering is structural: priority numerically (lower first),
/// then protocol, then host lexicographically. The priority-descending
/// order used for serving pools is applied by [`PoolQueue`], not here.
///
/// [`PoolQueue`]: crate::fetch::PoolQueue
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolKey {
    priority: i32,
    protocol: String,
    host: String,
}

impl PoolKey {
    /// Creates a key from its parts
    pub fn new(priority: i32, protocol: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            priority,
            protocol: protocol.into(),
            host: host.into(),
        }
    }

    /// Creates a key from a URL, deriving protocol and host
    ///
    /// Returns `None` when the URL has no host component.
    pub fn from_url(priority: i32, url: &Url) -> Option<Self> {
        let host = extract_host(url)?;
        Some(Self::new(priority, extract_protocol(url), host))
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}://{}", self.priority, self.protocol, self.host)
    }
}
