//! Configuration for [`crate::Deduper`] (§4.4).

use std::time::Duration;

/// Timing knobs for single-flight coalescing.
#[derive(Debug, Clone)]
pub struct CoalesceConfig {
    pub(crate) follower_wait: Duration,
    pub(crate) leader_ceiling: Duration,
    pub(crate) idle_gc_interval: Duration,
}

impl CoalesceConfig {
    pub fn builder() -> CoalesceConfigBuilder {
        CoalesceConfigBuilder::new()
    }

    pub fn follower_wait(&self) -> Duration {
        self.follower_wait
    }

    pub fn leader_ceiling(&self) -> Duration {
        self.leader_ceiling
    }

    pub fn idle_gc_interval(&self) -> Duration {
        self.idle_gc_interval
    }
}

/// Builder for [`CoalesceConfig`].
pub struct CoalesceConfigBuilder {
    follower_wait: Duration,
    leader_ceiling: Duration,
    idle_gc_interval: Duration,
}

impl CoalesceConfigBuilder {
    pub fn new() -> Self {
        Self {
            follower_wait: Duration::from_secs(10),
            leader_ceiling: Duration::from_secs(9),
            idle_gc_interval: Duration::from_secs(5 * 60),
        }
    }

    /// How long a follower waits for the leader's completion signal before
    /// giving up with [`crate::FollowerOutcome::Timeout`].
    ///
    /// Default: 10 seconds. Should stay above `leader_ceiling` so a
    /// follower never times out ahead of its own leader.
    pub fn follower_wait(mut self, wait: Duration) -> Self {
        self.follower_wait = wait;
        self
    }

    /// The leader's own hard ceiling on the producer call, enforced by the
    /// caller that drives a [`crate::LeaderGuard`], not by the guard
    /// itself. Exceeding it should be reported to `complete` as a failure
    /// so followers unblock promptly.
    ///
    /// Default: 9 seconds.
    pub fn leader_ceiling(mut self, ceiling: Duration) -> Self {
        self.leader_ceiling = ceiling;
        self
    }

    /// How often the idle-slot statistics sweep runs.
    ///
    /// Default: 5 minutes.
    pub fn idle_gc_interval(mut self, interval: Duration) -> Self {
        self.idle_gc_interval = interval;
        self
    }

    pub fn build(self) -> CoalesceConfig {
        CoalesceConfig {
            follower_wait: self.follower_wait,
            leader_ceiling: self.leader_ceiling,
            idle_gc_interval: self.idle_gc_interval,
        }
    }
}

impl Default for CoalesceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
