//! Configuration for the pool, circuit breaker, and retry logic (§4.7).

use std::time::Duration;

/// Sizing for the bounded isolation pool (§4.7.1).
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub(crate) core_size: usize,
    pub(crate) max_size: usize,
    pub(crate) queue: usize,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }
}

pub struct PoolConfigBuilder {
    core_size: usize,
    max_size: usize,
    queue: usize,
}

impl PoolConfigBuilder {
    pub fn new() -> Self {
        Self {
            core_size: 10,
            max_size: 50,
            queue: 200,
        }
    }

    /// Permits always available. Default: 10.
    pub fn core_size(mut self, n: usize) -> Self {
        self.core_size = n;
        self
    }

    /// Permits available beyond `core_size` before calls start queuing.
    /// Default: 50.
    pub fn max_size(mut self, n: usize) -> Self {
        self.max_size = n;
        self
    }

    /// Bounded queue depth once `max_size` is saturated. A call that also
    /// can't enqueue runs inline on the caller's task. Default: 200.
    pub fn queue(mut self, n: usize) -> Self {
        self.queue = n;
        self
    }

    pub fn build(self) -> PoolConfig {
        PoolConfig {
            core_size: self.core_size,
            max_size: self.max_size.max(self.core_size),
            queue: self.queue,
        }
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sliding-window circuit breaker knobs (§4.7.2).
#[derive(Debug, Clone, Copy)]
pub struct CircuitConfig {
    pub(crate) window_size: usize,
    pub(crate) min_calls: usize,
    pub(crate) failure_rate_threshold: f64,
    pub(crate) open_wait: Duration,
    pub(crate) trial_count: usize,
    pub(crate) slow_threshold: Duration,
    pub(crate) idle_gc: Duration,
}

impl CircuitConfig {
    pub fn builder() -> CircuitConfigBuilder {
        CircuitConfigBuilder::new()
    }
}

pub struct CircuitConfigBuilder {
    window_size: usize,
    min_calls: usize,
    failure_rate_threshold: f64,
    open_wait: Duration,
    trial_count: usize,
    slow_threshold: Duration,
    idle_gc: Duration,
}

impl CircuitConfigBuilder {
    pub fn new() -> Self {
        Self {
            window_size: 20,
            min_calls: 5,
            failure_rate_threshold: 0.5,
            open_wait: Duration::from_secs(10),
            trial_count: 3,
            slow_threshold: Duration::from_secs(2),
            idle_gc: Duration::from_secs(3600),
        }
    }

    /// How many recent outcomes are kept per source. Default: 20.
    pub fn window_size(mut self, n: usize) -> Self {
        self.window_size = n;
        self
    }

    /// Minimum outcomes observed before the window is evaluated. Default: 5.
    pub fn min_calls(mut self, n: usize) -> Self {
        self.min_calls = n;
        self
    }

    /// Combined failure+slow rate at which the circuit opens. Default: 0.5.
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate;
        self
    }

    /// How long the circuit stays `Open` before admitting a trial call.
    /// Default: 10 seconds.
    pub fn open_wait(mut self, duration: Duration) -> Self {
        self.open_wait = duration;
        self
    }

    /// Probe calls admitted while `HalfOpen`. Default: 3.
    pub fn trial_count(mut self, n: usize) -> Self {
        self.trial_count = n;
        self
    }

    /// Duration above which a successful call still counts against the
    /// failure rate. Default: 2 seconds.
    pub fn slow_threshold(mut self, duration: Duration) -> Self {
        self.slow_threshold = duration;
        self
    }

    /// How long a source's breaker may sit idle before the sweep drops it.
    /// Default: 1 hour.
    pub fn idle_gc(mut self, duration: Duration) -> Self {
        self.idle_gc = duration;
        self
    }

    pub fn build(self) -> CircuitConfig {
        CircuitConfig {
            window_size: self.window_size,
            min_calls: self.min_calls,
            failure_rate_threshold: self.failure_rate_threshold,
            open_wait: self.open_wait,
            trial_count: self.trial_count,
            slow_threshold: self.slow_threshold,
            idle_gc: self.idle_gc,
        }
    }
}

impl Default for CircuitConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry and deadline knobs (§4.7.3).
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub(crate) attempt_deadline: Duration,
    pub(crate) overall_deadline: Duration,
    pub(crate) max_retries: usize,
    pub(crate) initial_backoff: Duration,
    pub(crate) max_backoff: Duration,
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}

pub struct RetryConfigBuilder {
    attempt_deadline: Duration,
    overall_deadline: Duration,
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self {
            attempt_deadline: Duration::from_secs(5),
            overall_deadline: Duration::from_secs(8),
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        }
    }

    /// Deadline for a single backend attempt. Default: 5 seconds.
    pub fn attempt_deadline(mut self, duration: Duration) -> Self {
        self.attempt_deadline = duration;
        self
    }

    /// Deadline across the initial attempt and all retries. Default: 8 seconds.
    pub fn overall_deadline(mut self, duration: Duration) -> Self {
        self.overall_deadline = duration;
        self
    }

    /// Retries attempted on top of the initial call. Default: 2.
    pub fn max_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// First backoff delay, doubled each retry up to `max_backoff`.
    /// Default: 100ms.
    pub fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Cap on the exponential backoff delay. Default: 500ms.
    pub fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            attempt_deadline: self.attempt_deadline,
            overall_deadline: self.overall_deadline,
            max_retries: self.max_retries,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bundles the three resilience knob groups for [`crate::BackendCaller`].
#[derive(Debug, Clone, Copy)]
pub struct ResilienceConfig {
    pub pool: PoolConfig,
    pub circuit: CircuitConfig,
    pub retry: RetryConfig,
}

impl ResilienceConfig {
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct ResilienceConfigBuilder {
    pool: Option<PoolConfig>,
    circuit: Option<CircuitConfig>,
    retry: Option<RetryConfig>,
}

impl ResilienceConfigBuilder {
    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn circuit(mut self, circuit: CircuitConfig) -> Self {
        self.circuit = Some(circuit);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn build(self) -> ResilienceConfig {
        ResilienceConfig {
            pool: self.pool.unwrap_or_else(|| PoolConfig::builder().build()),
            circuit: self.circuit.unwrap_or_else(|| CircuitConfig::builder().build()),
            retry: self.retry.unwrap_or_else(|| RetryConfig::builder().build()),
        }
    }
}
