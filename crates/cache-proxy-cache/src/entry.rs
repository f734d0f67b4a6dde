//! [`CacheEntry`] and the freshness decision (§3, §4.3).

use cache_proxy_core::CacheResponse;
use cache_proxy_strategy::Rule;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached response plus the bookkeeping needed to decide freshness and
/// to guard a single active background refresh.
#[derive(Clone)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub payload: Arc<CacheResponse>,
    pub cached_at: Instant,
    /// The rule in effect when this entry was written. TTL checks use
    /// this snapshot rather than re-resolving the rule, so a config
    /// change after insert cannot retroactively change an entry's
    /// freshness window.
    pub rule_snapshot: Arc<Rule>,
    /// Single-active-refresh guard (§4.6): `compare_exchange`d by the
    /// refresh worker so at most one refresh is ever in flight for this
    /// fingerprint.
    pub refreshing: Arc<AtomicBool>,
}

impl CacheEntry {
    pub fn new(fingerprint: String, payload: CacheResponse, rule_snapshot: Arc<Rule>) -> Self {
        Self {
            fingerprint,
            payload: Arc::new(payload),
            cached_at: Instant::now(),
            rule_snapshot,
            refreshing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    /// `now < cached_at + rule.ttl` (§4.3).
    pub fn is_fresh(&self) -> bool {
        self.age() < self.rule_snapshot.ttl
    }

    /// `rule.allow_stale && now < cached_at + stale_ttl` (§4.3). Only
    /// meaningful once an entry has left the primary tier, but defined
    /// generally so the router can call it uniformly. `stale_ttl` is
    /// measured from `cached_at`, not from the moment the entry went
    /// stale, so it does not stack on top of the rule's `ttl`.
    pub fn is_stale_usable(&self, stale_ttl: Duration) -> bool {
        self.rule_snapshot.allow_stale && self.age() < stale_ttl
    }

    /// Whether `now - cached_at >= refresh_interval`, the Active-strategy
    /// trigger for scheduling a background refresh (§4.5).
    pub fn due_for_refresh(&self) -> bool {
        self.age() >= self.rule_snapshot.refresh_interval
    }
}

/// Which tier a lookup was satisfied from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Stale,
}
