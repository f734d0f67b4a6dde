//! Events emitted by [`crate::Deduper`] (§4.4, §6).

use cache_proxy_core::ProxyEvent;
use std::time::Instant;

/// Lifecycle events for a single-flight coalescing slot.
#[derive(Debug)]
pub enum CoalesceEvent {
    /// A caller installed a new slot and became the leader for `fingerprint`.
    LeaderStarted {
        fingerprint: String,
        timestamp: Instant,
    },
    /// A caller found an existing slot and is now waiting as a follower.
    FollowerJoined {
        fingerprint: String,
        timestamp: Instant,
    },
    /// The leader finished; `ok` is `false` if it failed or was cancelled.
    LeaderCompleted {
        fingerprint: String,
        ok: bool,
        timestamp: Instant,
    },
    /// A follower's wait exceeded `follower_wait` without a signal.
    FollowerTimedOut {
        fingerprint: String,
        timestamp: Instant,
    },
    /// The idle-statistics sweep dropped bookkeeping for a fingerprint with
    /// no recent activity.
    SlotGarbageCollected {
        fingerprint: String,
        timestamp: Instant,
    },
}

impl ProxyEvent for CoalesceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CoalesceEvent::LeaderStarted { .. } => "leader_started",
            CoalesceEvent::FollowerJoined { .. } => "follower_joined",
            CoalesceEvent::LeaderCompleted { .. } => "leader_completed",
            CoalesceEvent::FollowerTimedOut { .. } => "follower_timed_out",
            CoalesceEvent::SlotGarbageCollected { .. } => "slot_garbage_collected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CoalesceEvent::LeaderStarted { timestamp, .. }
            | CoalesceEvent::FollowerJoined { timestamp, .. }
            | CoalesceEvent::LeaderCompleted { timestamp, .. }
            | CoalesceEvent::FollowerTimedOut { timestamp, .. }
            | CoalesceEvent::SlotGarbageCollected { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        "deduper"
    }
}
