//! Background repopulation of Active (and stale-served Passive) entries
//! without blocking any request (§4.6).

use crate::backend::Backend;
use crate::events::RouterEvent;
use cache_proxy_core::{CacheRequest, EventListeners, Monitor, NoopMonitor, Source};
use cache_proxy_cache::{CacheEntry, TwoTierCache};
use cache_proxy_resilience::BackendCaller;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hard backstop on a single refresh, independent of the resilience
/// stack's own 8s overall retry budget — it also has to absorb whatever
/// time the refresh spends queued in the bounded pool.
const REFRESH_DEADLINE: Duration = Duration::from_secs(10);

/// Dispatches at most one background refresh per fingerprint at a time.
///
/// Refresh failures never reach a caller: the result is consumed here and
/// only observed through [`Monitor`] and [`RouterEvent`].
pub struct RefreshWorker {
    cache: Arc<TwoTierCache>,
    resilience: Arc<BackendCaller>,
    backend: Arc<dyn Backend>,
    events: EventListeners<RouterEvent>,
    monitor: Arc<dyn Monitor>,
}

impl RefreshWorker {
    pub fn new(cache: Arc<TwoTierCache>, resilience: Arc<BackendCaller>, backend: Arc<dyn Backend>) -> Self {
        Self::with_monitor(cache, resilience, backend, Arc::new(NoopMonitor))
    }

    pub fn with_monitor(
        cache: Arc<TwoTierCache>,
        resilience: Arc<BackendCaller>,
        backend: Arc<dyn Backend>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self {
            cache,
            resilience,
            backend,
            events: EventListeners::new(),
            monitor,
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: cache_proxy_core::EventListener<RouterEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Schedules a refresh for `fingerprint` unless one for this entry is
    /// already in flight. `entry` supplies both the single-active-refresh
    /// guard and the rule snapshot the refreshed value is written back
    /// under.
    pub fn schedule(&self, source: Source, request: CacheRequest, fingerprint: String, entry: &CacheEntry) {
        if entry
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.events.emit(&RouterEvent::RefreshScheduled {
                fingerprint,
                source_id: source.as_str().to_string(),
                skipped_in_flight: true,
                timestamp: Instant::now(),
            });
            return;
        }

        self.events.emit(&RouterEvent::RefreshScheduled {
            fingerprint: fingerprint.clone(),
            source_id: source.as_str().to_string(),
            skipped_in_flight: false,
            timestamp: Instant::now(),
        });

        let cache = Arc::clone(&self.cache);
        let resilience = Arc::clone(&self.resilience);
        let backend = Arc::clone(&self.backend);
        let monitor = Arc::clone(&self.monitor);
        let events = self.events.clone();
        let refreshing = Arc::clone(&entry.refreshing);
        let rule = Arc::clone(&entry.rule_snapshot);

        tokio::spawn(async move {
            let source_id = source.as_str().to_string();
            let outcome = tokio::time::timeout(
                REFRESH_DEADLINE,
                resilience.call(&source_id, || {
                    let backend = Arc::clone(&backend);
                    let source = source.clone();
                    let request = request.clone();
                    async move { backend.call(source, request).await }
                }),
            )
            .await;

            let ok = match outcome {
                Ok(Ok(response)) if response.is_success() => {
                    cache.put(fingerprint.clone(), CacheEntry::new(fingerprint.clone(), response, rule));
                    true
                }
                _ => false,
            };

            refreshing.store(false, Ordering::Release);
            monitor.increment(
                "cache.refresh",
                &[("result", if ok { "ok" } else { "err" }), ("source_id", &source_id)],
            );
            events.emit(&RouterEvent::RefreshCompleted {
                fingerprint,
                source_id,
                ok,
                timestamp: Instant::now(),
            });
        });
    }
}
