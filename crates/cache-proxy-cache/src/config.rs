//! Configuration for [`crate::TwoTierCache`] (§4.3).

use std::time::Duration;

/// Sizing and TTL knobs for the two-tier cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub(crate) primary_max_entries: usize,
    pub(crate) stale_max_entries: usize,
    pub(crate) stale_ttl: Duration,
    pub(crate) record_stats: bool,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }

    pub fn stale_ttl(&self) -> Duration {
        self.stale_ttl
    }
}

/// Builder for [`CacheConfig`].
pub struct CacheConfigBuilder {
    primary_max_entries: usize,
    stale_max_entries: usize,
    stale_ttl: Duration,
    record_stats: bool,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        Self {
            primary_max_entries: 8000,
            stale_max_entries: 2000,
            stale_ttl: Duration::from_secs(2 * 3600),
            record_stats: true,
        }
    }

    /// Maximum number of entries held in the primary (fresh) tier.
    ///
    /// Default: 8000.
    pub fn primary_max_entries(mut self, n: usize) -> Self {
        self.primary_max_entries = n;
        self
    }

    /// Maximum number of entries held in the stale (post-eviction) tier.
    ///
    /// Default: 2000.
    pub fn stale_max_entries(mut self, n: usize) -> Self {
        self.stale_max_entries = n;
        self
    }

    /// How long a demoted entry remains stale-usable before it is dropped
    /// entirely.
    ///
    /// Default: 2 hours.
    pub fn stale_ttl(mut self, ttl: Duration) -> Self {
        self.stale_ttl = ttl;
        self
    }

    /// Enables/disables hit/miss/eviction counters.
    ///
    /// Default: enabled.
    pub fn record_stats(mut self, enabled: bool) -> Self {
        self.record_stats = enabled;
        self
    }

    pub fn build(self) -> CacheConfig {
        CacheConfig {
            primary_max_entries: self.primary_max_entries,
            stale_max_entries: self.stale_max_entries,
            stale_ttl: self.stale_ttl,
            record_stats: self.record_stats,
        }
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
