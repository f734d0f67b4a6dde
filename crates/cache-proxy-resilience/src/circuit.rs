//! The per-source sliding-window circuit (§4.7.2).

use crate::config::CircuitConfig;
use crate::events::ResilienceEvent;
use cache_proxy_core::{EventListeners, Monitor};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

/// Point-in-time snapshot for observability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub total_calls: usize,
    pub failure_count: usize,
    pub slow_call_count: usize,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    is_failure: bool,
    is_slow: bool,
}

/// A rolling-window circuit for one `source_id`.
///
/// Window evaluation is count-based only (the corpus's time-based window
/// variant is not needed here — §4.7.2 only calls for "the last N
/// outcomes"). State is mirrored into an `AtomicU8` so
/// [`Circuit::state_sync`] can be read without taking the window lock, the
/// same lock-free read path the corpus's circuit breaker offers to its
/// monitoring integration.
pub struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    last_activity: Instant,
    window: VecDeque<CallRecord>,
    half_open_outcomes: usize,
}

impl Circuit {
    pub fn new() -> Self {
        Self::new_with_atomic(Arc::new(AtomicU8::new(CircuitState::Closed as u8)))
    }

    fn new_with_atomic(state_atomic: Arc<AtomicU8>) -> Self {
        let now = Instant::now();
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: now,
            last_activity: now,
            window: VecDeque::new(),
            half_open_outcomes: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    /// Lock-free read of the mirrored state, for callers that only need a
    /// cheap `Closed`/`Open`/`HalfOpen` glance.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let total = self.window.len();
        let failures = self.window.iter().filter(|r| r.is_failure).count();
        let slow = self.window.iter().filter(|r| r.is_slow).count();
        CircuitMetrics {
            state: self.state,
            total_calls: total,
            failure_count: failures,
            slow_call_count: slow,
            failure_rate: if total == 0 {
                0.0
            } else {
                failures as f64 / total as f64
            },
        }
    }

    /// Whether a call may proceed right now. `Open` transitions to
    /// `HalfOpen` on its own once `open_wait` has elapsed.
    pub fn try_acquire(
        &mut self,
        config: &CircuitConfig,
        source_id: &str,
        events: &EventListeners<ResilienceEvent>,
        monitor: &dyn Monitor,
    ) -> bool {
        self.last_activity = Instant::now();
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.open_wait {
                    self.transition_to(CircuitState::HalfOpen, source_id, events, monitor);
                    true
                } else {
                    monitor.increment("circuit.rejected", &[("source_id", source_id)]);
                    false
                }
            }
            CircuitState::HalfOpen => self.half_open_outcomes < config.trial_count,
        }
    }

    pub fn record_success(
        &mut self,
        config: &CircuitConfig,
        duration: Duration,
        source_id: &str,
        events: &EventListeners<ResilienceEvent>,
        monitor: &dyn Monitor,
    ) {
        let is_slow = duration >= config.slow_threshold;
        self.push_record(CallRecord {
            is_failure: false,
            is_slow,
        }, config);
        monitor.increment("circuit.call", &[("source_id", source_id), ("outcome", "success")]);

        match self.state {
            CircuitState::HalfOpen => {
                self.half_open_outcomes += 1;
                if self.half_open_outcomes >= config.trial_count {
                    self.transition_to(CircuitState::Closed, source_id, events, monitor);
                }
            }
            _ => self.evaluate_window(config, source_id, events, monitor),
        }
    }

    pub fn record_failure(
        &mut self,
        config: &CircuitConfig,
        duration: Duration,
        source_id: &str,
        events: &EventListeners<ResilienceEvent>,
        monitor: &dyn Monitor,
    ) {
        let is_slow = duration >= config.slow_threshold;
        self.push_record(CallRecord {
            is_failure: true,
            is_slow,
        }, config);
        monitor.increment("circuit.call", &[("source_id", source_id), ("outcome", "failure")]);

        match self.state {
            CircuitState::HalfOpen => {
                self.transition_to(CircuitState::Open, source_id, events, monitor);
            }
            _ => self.evaluate_window(config, source_id, events, monitor),
        }
    }

    fn push_record(&mut self, record: CallRecord, config: &CircuitConfig) {
        self.window.push_back(record);
        while self.window.len() > config.window_size {
            self.window.pop_front();
        }
    }

    fn evaluate_window(
        &mut self,
        config: &CircuitConfig,
        source_id: &str,
        events: &EventListeners<ResilienceEvent>,
        monitor: &dyn Monitor,
    ) {
        let total = self.window.len();
        if total < config.min_calls {
            return;
        }

        let failures = self.window.iter().filter(|r| r.is_failure || r.is_slow).count();
        let rate = failures as f64 / total as f64;

        if rate >= config.failure_rate_threshold {
            self.transition_to(CircuitState::Open, source_id, events, monitor);
        }
    }

    fn transition_to(
        &mut self,
        state: CircuitState,
        source_id: &str,
        events: &EventListeners<ResilienceEvent>,
        monitor: &dyn Monitor,
    ) {
        if self.state == state {
            return;
        }
        let from = self.state;
        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.window.clear();
        self.half_open_outcomes = 0;

        monitor.gauge(
            "circuit.state",
            state as u8 as f64,
            &[("source_id", source_id)],
        );
        events.emit(&ResilienceEvent::CircuitStateChanged {
            source_id: source_id.to_string(),
            from,
            to: state,
            timestamp: Instant::now(),
        });
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}
