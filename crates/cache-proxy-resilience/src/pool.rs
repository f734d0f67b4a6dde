//! Bounded isolation pool for backend-bound work (§4.7.1).
//!
//! Generalizes the corpus's single-semaphore bulkhead into three tiers:
//! `core_size` permits are always available, `max_size - core_size` more
//! are available as overflow, and once both are exhausted a bounded queue
//! holds waiters rather than rejecting them outright. A caller that can't
//! even get a queue ticket runs inline on its own task — the same
//! saturation fallback the corpus's bulkhead names, generalized from
//! "reject" to "run inline" so ingress never sees a pool-exhaustion error.

use crate::config::PoolConfig;
use crate::events::ResilienceEvent;
use cache_proxy_core::{EventListeners, Monitor};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// A dedicated worker budget for backend calls, independent of ingress
/// concurrency.
pub struct Pool {
    core: Arc<Semaphore>,
    overflow: Arc<Semaphore>,
    queue: Arc<Semaphore>,
    monitor: Arc<dyn Monitor>,
    events: EventListeners<ResilienceEvent>,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self::with_monitor(config, Arc::new(cache_proxy_core::NoopMonitor))
    }

    pub fn with_monitor(config: PoolConfig, monitor: Arc<dyn Monitor>) -> Self {
        Self {
            core: Arc::new(Semaphore::new(config.core_size)),
            overflow: Arc::new(Semaphore::new(config.max_size - config.core_size)),
            queue: Arc::new(Semaphore::new(config.queue)),
            monitor,
            events: EventListeners::new(),
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: cache_proxy_core::EventListener<ResilienceEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Runs `f` under the pool's concurrency budget. Cancelling the
    /// returned future (dropping it before it resolves) releases whatever
    /// permit/queue ticket was held, the same guarantee the coalescing
    /// crate's leader future gives its in-flight map slot on cancellation
    /// — nothing here needs an explicit `Drop` impl because the permits
    /// and the queue ticket are already RAII guards.
    pub async fn run<F, Fut, T>(&self, source_id: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Ok(permit) = self.core.clone().try_acquire_owned() {
            let _permit = permit;
            return f().await;
        }
        if let Ok(permit) = self.overflow.clone().try_acquire_owned() {
            let _permit = permit;
            return f().await;
        }

        if let Ok(ticket) = self.queue.clone().try_acquire_owned() {
            let permit = tokio::select! {
                biased;
                p = self.core.clone().acquire_owned() => p,
                p = self.overflow.clone().acquire_owned() => p,
            };
            drop(ticket);
            let _permit = permit.expect("pool semaphores are never closed");
            return f().await;
        }

        self.monitor.increment("pool.saturated", &[("source_id", source_id)]);
        self.events.emit(&ResilienceEvent::PoolSaturated {
            source_id: source_id.to_string(),
            ran_inline: true,
            timestamp: Instant::now(),
        });
        f().await
    }
}
