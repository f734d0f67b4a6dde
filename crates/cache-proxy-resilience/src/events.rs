//! Events emitted by the pool and circuit breaker (§4.7, §6).

use crate::circuit::CircuitState;
use cache_proxy_core::ProxyEvent;
use std::time::Instant;

#[derive(Debug)]
pub enum ResilienceEvent {
    /// A call had to queue or run inline because the pool was saturated.
    PoolSaturated {
        source_id: String,
        ran_inline: bool,
        timestamp: Instant,
    },
    CircuitStateChanged {
        source_id: String,
        from: CircuitState,
        to: CircuitState,
        timestamp: Instant,
    },
    RetryAttempted {
        source_id: String,
        attempt: usize,
        timestamp: Instant,
    },
    /// A source's circuit/window was dropped by the idle sweep.
    SourceGarbageCollected {
        source_id: String,
        timestamp: Instant,
    },
}

impl ProxyEvent for ResilienceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ResilienceEvent::PoolSaturated { .. } => "pool_saturated",
            ResilienceEvent::CircuitStateChanged { .. } => "circuit_state_changed",
            ResilienceEvent::RetryAttempted { .. } => "retry_attempted",
            ResilienceEvent::SourceGarbageCollected { .. } => "source_garbage_collected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ResilienceEvent::PoolSaturated { timestamp, .. }
            | ResilienceEvent::CircuitStateChanged { timestamp, .. }
            | ResilienceEvent::RetryAttempted { timestamp, .. }
            | ResilienceEvent::SourceGarbageCollected { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        "resilience"
    }
}
