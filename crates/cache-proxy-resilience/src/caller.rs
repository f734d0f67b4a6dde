//! Composes the pool, circuit breaker, and retry logic into one entry
//! point (§4.7).

use crate::breaker::SourceBreakers;
use crate::config::ResilienceConfig;
use crate::events::ResilienceEvent;
use crate::pool::Pool;
use crate::retry;
use cache_proxy_core::{CacheResponse, EventListener, EventListeners, Monitor, NoopMonitor, ProxyError};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// The resilience stack every backend call passes through: bounded pool
/// wrapping a per-source circuit breaker wrapping retry/deadline logic,
/// mirroring the corpus's own `ServiceBuilder` layering
/// (`Bulkhead(CircuitBreaker(Retry(backend)))`).
pub struct BackendCaller {
    pool: Pool,
    breakers: SourceBreakers,
    retry: crate::config::RetryConfig,
    events: EventListeners<ResilienceEvent>,
    monitor: Arc<dyn Monitor>,
}

impl BackendCaller {
    pub fn new(config: ResilienceConfig) -> Self {
        Self::with_monitor(config, Arc::new(NoopMonitor))
    }

    pub fn with_monitor(config: ResilienceConfig, monitor: Arc<dyn Monitor>) -> Self {
        Self {
            pool: Pool::with_monitor(config.pool, Arc::clone(&monitor)),
            breakers: SourceBreakers::with_monitor(config.circuit, Arc::clone(&monitor)),
            retry: config.retry,
            events: EventListeners::new(),
            monitor,
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: EventListener<ResilienceEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Runs `producer` for `source_id` under the pool, circuit breaker,
    /// and retry budget. `producer` is invoked once per retry attempt and
    /// must be cancel-safe.
    pub async fn call<F, Fut>(&self, source_id: &str, producer: F) -> Result<CacheResponse, ProxyError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CacheResponse, ProxyError>>,
    {
        let retry = &self.retry;
        let events = &self.events;
        let breakers = &self.breakers;
        let monitor = self.monitor.as_ref();

        self.pool
            .run(source_id, || async move {
                if !breakers.try_acquire(source_id) {
                    monitor.increment("circuit.open_rejected", &[("source_id", source_id)]);
                    return Err(ProxyError::CircuitOpen {
                        source_id: source_id.to_string(),
                    });
                }

                let start = Instant::now();
                let result = retry::execute(retry, source_id, events, monitor, &producer).await;
                let elapsed = start.elapsed();

                match &result {
                    Ok(_) => breakers.record_success(source_id, elapsed),
                    Err(err) if matches!(err, ProxyError::CircuitOpen { .. }) => {}
                    Err(_) => breakers.record_failure(source_id, elapsed),
                }

                // `remote.call{result}` is counted per attempt inside
                // `retry::execute`; this timer covers the whole operation,
                // retries included.
                monitor.timer("remote.call.duration", elapsed, &[("source_id", source_id)]);

                result
            })
            .await
    }

    pub fn circuit_state(&self, source_id: &str) -> crate::circuit::CircuitState {
        self.breakers.state(source_id)
    }

    /// Drops idle per-source circuit state and, transitively through the
    /// caller passed in by the umbrella crate's sweeper, idle deduper
    /// stats. Intended to run on an hourly `tokio::time::interval`.
    pub fn gc_idle(&self) {
        self.breakers.gc_idle();
    }
}
