//! The per-source circuit breaker map (§4.7.2, §9).

use crate::circuit::{Circuit, CircuitState};
use crate::config::CircuitConfig;
use crate::events::ResilienceEvent;
use cache_proxy_core::{EventListeners, Monitor, NoopMonitor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One circuit per `source_id`, created lazily on first use. Unbounded
/// growth is bounded by periodic idle eviction rather than an upfront
/// size cap, since the set of sources is not known ahead of time.
pub struct SourceBreakers {
    circuits: Mutex<HashMap<String, Arc<Mutex<Circuit>>>>,
    config: CircuitConfig,
    events: EventListeners<ResilienceEvent>,
    monitor: Arc<dyn Monitor>,
}

impl SourceBreakers {
    pub fn new(config: CircuitConfig) -> Self {
        Self::with_monitor(config, Arc::new(NoopMonitor))
    }

    pub fn with_monitor(config: CircuitConfig, monitor: Arc<dyn Monitor>) -> Self {
        Self {
            circuits: Mutex::new(HashMap::new()),
            config,
            events: EventListeners::new(),
            monitor,
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: cache_proxy_core::EventListener<ResilienceEvent> + 'static,
    {
        self.events.add(listener);
    }

    fn circuit_for(&self, source_id: &str) -> Arc<Mutex<Circuit>> {
        let mut circuits = self.circuits.lock();
        Arc::clone(
            circuits
                .entry(source_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Circuit::new()))),
        )
    }

    pub fn try_acquire(&self, source_id: &str) -> bool {
        let circuit = self.circuit_for(source_id);
        let mut circuit = circuit.lock();
        circuit.try_acquire(&self.config, source_id, &self.events, self.monitor.as_ref())
    }

    pub fn record_success(&self, source_id: &str, duration: Duration) {
        let circuit = self.circuit_for(source_id);
        let mut circuit = circuit.lock();
        circuit.record_success(&self.config, duration, source_id, &self.events, self.monitor.as_ref());
    }

    pub fn record_failure(&self, source_id: &str, duration: Duration) {
        let circuit = self.circuit_for(source_id);
        let mut circuit = circuit.lock();
        circuit.record_failure(&self.config, duration, source_id, &self.events, self.monitor.as_ref());
    }

    pub fn state(&self, source_id: &str) -> CircuitState {
        self.circuit_for(source_id).lock().state()
    }

    /// Drops circuits idle for longer than `config.idle_gc`. Intended to
    /// be driven by the same periodic sweeper task that GCs the
    /// coalescing crate's slot statistics.
    pub fn gc_idle(&self) {
        let idle_for: Duration = self.config.idle_gc;
        let now = Instant::now();
        let mut circuits = self.circuits.lock();
        circuits.retain(|source_id, circuit| {
            let keep = now.duration_since(circuit.lock().last_activity()) < idle_for;
            if !keep {
                self.events.emit(&ResilienceEvent::SourceGarbageCollected {
                    source_id: source_id.clone(),
                    timestamp: now,
                });
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_source_gets_its_own_independent_circuit() {
        let breakers = SourceBreakers::new(
            CircuitConfig::builder()
                .min_calls(2)
                .window_size(2)
                .failure_rate_threshold(0.5)
                .build(),
        );

        breakers.record_failure("s1", Duration::from_millis(1));
        breakers.record_failure("s1", Duration::from_millis(1));
        assert_eq!(breakers.state("s1"), CircuitState::Open);
        assert_eq!(breakers.state("s2"), CircuitState::Closed);
    }

    #[test]
    fn gc_idle_drops_circuits_with_no_recent_activity() {
        let breakers = SourceBreakers::new(CircuitConfig::builder().idle_gc(Duration::ZERO).build());
        breakers.record_success("s1", Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        breakers.gc_idle();
        assert!(breakers.circuits.lock().is_empty());
    }
}
