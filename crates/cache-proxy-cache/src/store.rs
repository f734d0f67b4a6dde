//! [`TwoTierCache`]: primary (fresh) + stale (post-eviction) storage (§4.3).

use crate::config::CacheConfig;
use crate::entry::{CacheEntry, Tier};
use crate::events::{CacheEvent, EvictionReason};
use crate::eviction::{EvictionStore, LruStore};
use cache_proxy_core::{EventListeners, Monitor, NoopMonitor};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Snapshot of cache counters (§4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub primary_size: usize,
    pub stale_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Primary + stale tiered cache, keyed by fingerprint.
///
/// Reads and writes never hold their lock across an `.await` — every
/// operation here is synchronous; callers perform I/O outside this type.
pub struct TwoTierCache {
    config: CacheConfig,
    primary: Mutex<LruStore<String, CacheEntry>>,
    stale: Mutex<LruStore<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    events: EventListeners<CacheEvent>,
    monitor: Arc<dyn Monitor>,
}

impl TwoTierCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_monitor(config, Arc::new(NoopMonitor))
    }

    pub fn with_monitor(config: CacheConfig, monitor: Arc<dyn Monitor>) -> Self {
        let primary = Mutex::new(LruStore::new(config.primary_max_entries));
        let stale = Mutex::new(LruStore::new(config.stale_max_entries));
        Self {
            config,
            primary,
            stale,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            events: EventListeners::new(),
            monitor,
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: cache_proxy_core::EventListener<CacheEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Checks primary, then stale. Entries in the stale tier are only
    /// returned when `rule.allow_stale` was set and they are within the
    /// configured `stale_ttl`; otherwise a lingering stale entry is
    /// dropped on access.
    pub fn get(&self, fingerprint: &str) -> Option<(CacheEntry, Tier)> {
        if let Some(entry) = self.primary.lock().get(&fingerprint.to_string()).cloned() {
            self.record_hit(fingerprint, "primary");
            return Some((entry, Tier::Primary));
        }

        let mut stale_guard = self.stale.lock();
        if let Some(entry) = stale_guard.get(&fingerprint.to_string()).cloned() {
            if entry.is_stale_usable(self.config.stale_ttl) {
                drop(stale_guard);
                self.record_hit(fingerprint, "stale");
                return Some((entry, Tier::Stale));
            }
            stale_guard.remove(&fingerprint.to_string());
        }
        drop(stale_guard);

        self.record_miss(fingerprint);
        None
    }

    /// Inserts into the primary tier. Any entry evicted to make room is
    /// demoted into the stale tier (the demotion invariant, §4.3) unless
    /// the stale tier is itself at capacity, in which case it is simply
    /// dropped (the stale tier's own LRU policy handles this
    /// transparently via its bounded `push`).
    pub fn put(&self, fingerprint: String, entry: CacheEntry) {
        let evicted = self.primary.lock().insert(fingerprint, entry);
        if let Some((evicted_fp, evicted_entry)) = evicted {
            self.demote(evicted_fp, evicted_entry, EvictionReason::Size);
        }
    }

    /// Removes the fingerprint from both tiers. This is the one removal
    /// path that does **not** demote to stale (§4.3).
    pub fn invalidate(&self, fingerprint: &str) {
        let removed_primary = self.primary.lock().remove(&fingerprint.to_string());
        let removed_stale = self.stale.lock().remove(&fingerprint.to_string());
        if removed_primary.is_some() || removed_stale.is_some() {
            self.emit_eviction(fingerprint, EvictionReason::Explicit, false);
        }
    }

    /// Evicts entries whose primary-tier TTL has expired, demoting each
    /// to the stale tier. Intended to be driven by a periodic sweeper
    /// task, following the corpus's pattern of background maintenance
    /// rather than checking TTL only reactively on each `get`.
    pub fn sweep_expired(&self) {
        let expired: Vec<(String, CacheEntry)> = {
            let guard = self.primary.lock();
            guard
                .iter()
                .filter(|(_, entry)| !entry.is_fresh())
                .map(|(fp, entry)| (fp.clone(), entry.clone()))
                .collect()
        };

        for (fp, entry) in expired {
            self.primary.lock().remove(&fp);
            self.demote(fp, entry, EvictionReason::Expired);
        }
    }

    fn demote(&self, fingerprint: String, entry: CacheEntry, reason: EvictionReason) {
        let evicted_from_stale = self.stale.lock().insert(fingerprint.clone(), entry);
        // If the stale tier itself had to evict to make room, that entry
        // is simply dropped — there is no third tier.
        let _ = evicted_from_stale;
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.emit_eviction(&fingerprint, reason, true);
    }

    fn emit_eviction(&self, fingerprint: &str, reason: EvictionReason, demoted: bool) {
        self.monitor.increment(
            "cache.access",
            &[("result", "eviction"), ("reason", reason_tag(reason))],
        );
        self.events.emit(&CacheEvent::Eviction {
            fingerprint: fingerprint.to_string(),
            reason,
            demoted,
            timestamp: Instant::now(),
        });
    }

    fn record_hit(&self, fingerprint: &str, tier: &'static str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.monitor
            .increment("cache.access", &[("result", "hit"), ("tier", tier)]);
        self.events.emit(&CacheEvent::Hit {
            fingerprint: fingerprint.to_string(),
            tier,
            timestamp: Instant::now(),
        });
    }

    fn record_miss(&self, fingerprint: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.monitor.increment("cache.access", &[("result", "miss")]);
        self.events.emit(&CacheEvent::Miss {
            fingerprint: fingerprint.to_string(),
            timestamp: Instant::now(),
        });
    }

    /// The configured stale-usable window, for callers (the router) that
    /// need to re-evaluate freshness on an entry returned from
    /// [`TwoTierCache::get`] rather than trusting the tier alone.
    pub fn stale_ttl(&self) -> std::time::Duration {
        self.config.stale_ttl()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            primary_size: self.primary.lock().len(),
            stale_size: self.stale.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

fn reason_tag(reason: EvictionReason) -> &'static str {
    match reason {
        EvictionReason::Expired => "expired",
        EvictionReason::Size => "size",
        EvictionReason::Explicit => "explicit",
    }
}
