//! Events emitted by [`crate::Router`] and [`crate::RefreshWorker`] (§6).

use cache_proxy_core::ProxyEvent;
use std::time::Instant;

#[derive(Debug)]
pub enum RouterEvent {
    /// A cache decision was made for a request: a fresh/stale hit, or a
    /// miss that fell through to the backend.
    CacheDecision {
        fingerprint: String,
        source_id: String,
        strategy: &'static str,
        result: &'static str,
        timestamp: Instant,
    },
    /// The backend path failed and the router fell back to either a
    /// stale-usable entry or the synthetic unavailable response (§7).
    FallbackTriggered {
        fingerprint: String,
        source_id: String,
        kind: &'static str,
        timestamp: Instant,
    },
    /// A background refresh was scheduled for `fingerprint`, or skipped
    /// because one was already in flight.
    RefreshScheduled {
        fingerprint: String,
        source_id: String,
        skipped_in_flight: bool,
        timestamp: Instant,
    },
    /// A background refresh finished.
    RefreshCompleted {
        fingerprint: String,
        source_id: String,
        ok: bool,
        timestamp: Instant,
    },
}

impl ProxyEvent for RouterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RouterEvent::CacheDecision { .. } => "cache_decision",
            RouterEvent::FallbackTriggered { .. } => "fallback_triggered",
            RouterEvent::RefreshScheduled { .. } => "refresh_scheduled",
            RouterEvent::RefreshCompleted { .. } => "refresh_completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RouterEvent::CacheDecision { timestamp, .. }
            | RouterEvent::FallbackTriggered { timestamp, .. }
            | RouterEvent::RefreshScheduled { timestamp, .. }
            | RouterEvent::RefreshCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        "router"
    }
}
