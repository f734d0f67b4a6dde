//! The single-flight slot map (§4.4).

use crate::config::CoalesceConfig;
use crate::events::CoalesceEvent;
use cache_proxy_core::{ErrorKind, EventListener, EventListeners, Monitor, NoopMonitor};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// The value carried by a slot's completion channel. Only ever a
/// success/failure marker — never the leader's response payload, which is
/// expected to already be in the cache by the time a follower observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Pending,
    Ok,
    Err(ErrorKind),
}

struct Slot {
    tx: watch::Sender<Signal>,
    generation: u64,
}

#[derive(Default)]
struct SlotStats {
    waiters: u64,
    processing: u64,
    success: u64,
    error: u64,
    last_activity: Option<Instant>,
}

/// Coordinates single-flight execution per fingerprint.
///
/// Construct behind an `Arc` — [`Deduper::acquire`] takes `self: &Arc<Self>`
/// because both the returned [`LeaderGuard`] and [`Follower`] need to hold
/// their own reference back into the slot map after this call returns.
pub struct Deduper {
    slots: Mutex<HashMap<String, Slot>>,
    stats: Mutex<HashMap<String, SlotStats>>,
    next_generation: AtomicU64,
    config: CoalesceConfig,
    events: EventListeners<CoalesceEvent>,
    monitor: Arc<dyn Monitor>,
}

/// The outcome of [`Deduper::acquire`]: this caller either leads the
/// execution for this fingerprint or follows an already-running one.
pub enum Attempt {
    Leader(LeaderGuard),
    Follower(Follower),
}

impl Deduper {
    pub fn new(config: CoalesceConfig) -> Arc<Self> {
        Self::with_monitor(config, Arc::new(NoopMonitor))
    }

    pub fn with_monitor(config: CoalesceConfig, monitor: Arc<dyn Monitor>) -> Arc<Self> {
        Arc::new(Self {
            slots: Mutex::new(HashMap::new()),
            stats: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            config,
            events: EventListeners::new(),
            monitor,
        })
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: EventListener<CoalesceEvent> + 'static,
    {
        self.events.add(listener);
    }

    pub fn config(&self) -> &CoalesceConfig {
        &self.config
    }

    /// Installs a slot for `fingerprint` if none exists, making the caller
    /// the leader; otherwise returns a follower handle to the existing
    /// slot.
    pub fn acquire(self: &Arc<Self>, fingerprint: &str) -> Attempt {
        let mut slots = self.slots.lock();
        if let Some(existing) = slots.get(fingerprint) {
            let follower = Follower {
                deduper: Arc::clone(self),
                fingerprint: fingerprint.to_string(),
                generation: existing.generation,
                rx: existing.tx.subscribe(),
            };
            drop(slots);
            self.touch_stats(fingerprint, |s| s.waiters += 1);
            self.monitor.increment(
                "request.deduplication",
                &[("deduplicated", "true")],
            );
            self.events.emit(&CoalesceEvent::FollowerJoined {
                fingerprint: fingerprint.to_string(),
                timestamp: Instant::now(),
            });
            return Attempt::Follower(follower);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, _rx) = watch::channel(Signal::Pending);
        slots.insert(
            fingerprint.to_string(),
            Slot {
                tx: tx.clone(),
                generation,
            },
        );
        drop(slots);

        self.touch_stats(fingerprint, |s| s.processing += 1);
        self.monitor
            .increment("request.deduplication", &[("deduplicated", "false")]);
        self.events.emit(&CoalesceEvent::LeaderStarted {
            fingerprint: fingerprint.to_string(),
            timestamp: Instant::now(),
        });

        Attempt::Leader(LeaderGuard {
            deduper: Arc::clone(self),
            fingerprint: fingerprint.to_string(),
            generation,
            tx,
            done: false,
        })
    }

    fn touch_stats(&self, fingerprint: &str, f: impl FnOnce(&mut SlotStats)) {
        let mut stats = self.stats.lock();
        let entry = stats.entry(fingerprint.to_string()).or_default();
        f(entry);
        entry.last_activity = Some(Instant::now());
    }

    /// Drops bookkeeping for fingerprints with no activity in the last
    /// `idle_gc_interval`. Intended to be driven by a periodic
    /// `tokio::time::interval` task, the same pattern the cache crate uses
    /// for its own TTL sweep.
    pub fn gc_idle(&self) {
        let cutoff = self.config.idle_gc_interval;
        let mut stats = self.stats.lock();
        let now = Instant::now();
        stats.retain(|fingerprint, entry| {
            let keep = entry
                .last_activity
                .map(|t| now.duration_since(t) < cutoff)
                .unwrap_or(false);
            if !keep {
                self.events.emit(&CoalesceEvent::SlotGarbageCollected {
                    fingerprint: fingerprint.clone(),
                    timestamp: now,
                });
            }
            keep
        });
    }

    fn remove_slot_if_generation(&self, fingerprint: &str, generation: u64) {
        let mut slots = self.slots.lock();
        if slots.get(fingerprint).map(|s| s.generation) == Some(generation) {
            slots.remove(fingerprint);
        }
    }
}

/// Held by the caller that won the race to lead execution for a
/// fingerprint. The caller must call [`LeaderGuard::complete`] when the
/// producer finishes; dropping the guard without completing is treated as
/// a leader failure so followers do not wait forever.
pub struct LeaderGuard {
    deduper: Arc<Deduper>,
    fingerprint: String,
    generation: u64,
    tx: watch::Sender<Signal>,
    done: bool,
}

impl LeaderGuard {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Signals completion to any waiting followers and releases the slot.
    /// `result` carries the error kind, never the original error value
    /// (§4.4, §7): followers reconstruct a representative error from the
    /// kind via [`ErrorKind::to_proxy_error`].
    pub fn complete(mut self, result: Result<(), ErrorKind>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<(), ErrorKind>) {
        if self.done {
            return;
        }
        self.done = true;
        self.deduper
            .remove_slot_if_generation(&self.fingerprint, self.generation);

        let ok = result.is_ok();
        self.deduper.touch_stats(&self.fingerprint, |s| {
            if ok {
                s.success += 1;
            } else {
                s.error += 1;
            }
        });
        self.deduper.events.emit(&CoalesceEvent::LeaderCompleted {
            fingerprint: self.fingerprint.clone(),
            ok,
            timestamp: Instant::now(),
        });

        let signal = match result {
            Ok(()) => Signal::Ok,
            Err(kind) => Signal::Err(kind),
        };
        // No receivers left is not an error: every follower may have given
        // up already.
        let _ = self.tx.send(signal);
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        if !self.done {
            self.finish(Err(ErrorKind::Cancelled));
        }
    }
}

/// Held by a caller that found an in-progress leader for its fingerprint.
pub struct Follower {
    deduper: Arc<Deduper>,
    fingerprint: String,
    generation: u64,
    rx: watch::Receiver<Signal>,
}

/// What a follower observed after waiting on the leader's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowerOutcome {
    /// The leader succeeded. The caller should re-run its own
    /// cache-strategy path, which is expected to now hit the primary
    /// cache.
    Ok,
    /// The leader failed (or was cancelled); carries the error kind only.
    Err(ErrorKind),
    /// `follower_wait` elapsed with no signal from the leader.
    Timeout,
}

impl Follower {
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Waits for the leader's completion signal, bounded by
    /// `follower_wait`.
    pub async fn wait(mut self) -> FollowerOutcome {
        let wait = self.deduper.config.follower_wait;
        let outcome = tokio::time::timeout(wait, async {
            loop {
                let signal = *self.rx.borrow_and_update();
                match signal {
                    Signal::Pending => {}
                    Signal::Ok => return FollowerOutcome::Ok,
                    Signal::Err(kind) => return FollowerOutcome::Err(kind),
                }
                if self.rx.changed().await.is_err() {
                    // Sender dropped without a terminal signal — leader's
                    // guard was dropped before `finish` ran, which should
                    // not happen since `Drop` always calls `finish`, but
                    // treat it as cancellation defensively.
                    return FollowerOutcome::Err(ErrorKind::Cancelled);
                }
            }
        })
        .await;

        match outcome {
            Ok(outcome) => outcome,
            Err(_elapsed) => {
                self.deduper
                    .remove_slot_if_generation(&self.fingerprint, self.generation);
                self.deduper.events.emit(&CoalesceEvent::FollowerTimedOut {
                    fingerprint: self.fingerprint.clone(),
                    timestamp: Instant::now(),
                });
                FollowerOutcome::Timeout
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deduper() -> Arc<Deduper> {
        Deduper::new(
            CoalesceConfig::builder()
                .follower_wait(Duration::from_millis(200))
                .leader_ceiling(Duration::from_millis(150))
                .build(),
        )
    }

    #[tokio::test]
    async fn first_caller_leads_second_follows() {
        let deduper = deduper();

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };

        let follower = match deduper.acquire("fp1") {
            Attempt::Follower(f) => f,
            Attempt::Leader(_) => panic!("expected follower"),
        };

        let wait_handle = tokio::spawn(follower.wait());
        leader.complete(Ok(()));

        assert_eq!(wait_handle.await.unwrap(), FollowerOutcome::Ok);
    }

    #[tokio::test]
    async fn leader_failure_propagates_error_kind_to_follower() {
        let deduper = deduper();

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };
        let follower = match deduper.acquire("fp1") {
            Attempt::Follower(f) => f,
            Attempt::Leader(_) => panic!("expected follower"),
        };

        let wait_handle = tokio::spawn(follower.wait());
        leader.complete(Err(ErrorKind::UpstreamServer));

        assert_eq!(
            wait_handle.await.unwrap(),
            FollowerOutcome::Err(ErrorKind::UpstreamServer)
        );
    }

    #[tokio::test]
    async fn dropping_the_leader_guard_without_completing_unblocks_followers() {
        let deduper = deduper();

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };
        let follower = match deduper.acquire("fp1") {
            Attempt::Follower(f) => f,
            Attempt::Leader(_) => panic!("expected follower"),
        };

        let wait_handle = tokio::spawn(follower.wait());
        drop(leader);

        assert_eq!(
            wait_handle.await.unwrap(),
            FollowerOutcome::Err(ErrorKind::Cancelled)
        );
    }

    #[tokio::test]
    async fn different_fingerprints_both_lead() {
        let deduper = deduper();

        let a = deduper.acquire("fp1");
        let b = deduper.acquire("fp2");

        assert!(matches!(a, Attempt::Leader(_)));
        assert!(matches!(b, Attempt::Leader(_)));
    }

    #[tokio::test]
    async fn follower_gives_up_after_follower_wait_elapses() {
        let deduper = deduper();

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };
        let follower = match deduper.acquire("fp1") {
            Attempt::Follower(f) => f,
            Attempt::Leader(_) => panic!("expected follower"),
        };

        let outcome = follower.wait().await;
        assert_eq!(outcome, FollowerOutcome::Timeout);

        // The leader is still free to complete after the follower gave up.
        leader.complete(Ok(()));
    }

    #[tokio::test]
    async fn new_leader_can_start_once_the_previous_slot_is_removed() {
        let deduper = deduper();

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };
        leader.complete(Ok(()));

        let second = deduper.acquire("fp1");
        assert!(matches!(second, Attempt::Leader(_)));
    }

    #[tokio::test]
    async fn idle_gc_drops_stats_for_fingerprints_with_old_activity() {
        let deduper = Deduper::new(CoalesceConfig::builder().idle_gc_interval(Duration::ZERO).build());

        let leader = match deduper.acquire("fp1") {
            Attempt::Leader(g) => g,
            Attempt::Follower(_) => panic!("expected leader"),
        };
        leader.complete(Ok(()));

        tokio::time::sleep(Duration::from_millis(5)).await;
        deduper.gc_idle();

        assert!(deduper.stats.lock().is_empty());
    }
}
