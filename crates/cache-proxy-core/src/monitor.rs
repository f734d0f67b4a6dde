//! Observability facade (§6).
//!
//! Every outer crate reports through this trait rather than calling
//! `metrics`/`tracing` macros directly, so a caller that wants a different
//! sink (a test harness counting invocations, a push-gateway exporter) only
//! needs to implement [`Monitor`] once.

use std::time::Duration;

/// Sink for the counters, gauges, and timers named in the observability
/// table. Implementations must be cheap to call on every request path —
/// no blocking I/O.
pub trait Monitor: Send + Sync {
    /// A monotonically increasing counter, e.g. `cache.hit`, `cache.miss`,
    /// `business.error`. `labels` are `key=value` pairs.
    fn counter(&self, name: &'static str, value: u64, labels: &[(&'static str, &str)]);

    /// A point-in-time value, e.g. `deduper.inflight`, `pool.queue_depth`.
    fn gauge(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]);

    /// A duration sample, e.g. `upstream.latency`, `cache.lookup_latency`.
    fn timer(&self, name: &'static str, elapsed: Duration, labels: &[(&'static str, &str)]);

    fn increment(&self, name: &'static str, labels: &[(&'static str, &str)]) {
        self.counter(name, 1, labels);
    }
}

/// A [`Monitor`] that discards everything. The default when no
/// observability backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn counter(&self, _name: &'static str, _value: u64, _labels: &[(&'static str, &str)]) {}
    fn gauge(&self, _name: &'static str, _value: f64, _labels: &[(&'static str, &str)]) {}
    fn timer(&self, _name: &'static str, _elapsed: Duration, _labels: &[(&'static str, &str)]) {}
}

/// A [`Monitor`] that forwards to the `metrics` and `tracing` crates,
/// matching the feature-gated pattern used by [`crate::events`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BackendMonitor;

impl Monitor for BackendMonitor {
    fn counter(&self, name: &'static str, value: u64, labels: &[(&'static str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let owned: Vec<(String, String)> = labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            metrics::counter!(name, &owned).increment(value);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(counter = name, value, ?labels, "cache-proxy counter");
        #[cfg(not(any(feature = "metrics", feature = "tracing")))]
        {
            let _ = (name, value, labels);
        }
    }

    fn gauge(&self, name: &'static str, value: f64, labels: &[(&'static str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let owned: Vec<(String, String)> = labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            metrics::gauge!(name, &owned).set(value);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(gauge = name, value, ?labels, "cache-proxy gauge");
        #[cfg(not(any(feature = "metrics", feature = "tracing")))]
        {
            let _ = (name, value, labels);
        }
    }

    fn timer(&self, name: &'static str, elapsed: Duration, labels: &[(&'static str, &str)]) {
        #[cfg(feature = "metrics")]
        {
            let owned: Vec<(String, String)> = labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            metrics::histogram!(name, &owned).record(elapsed.as_secs_f64());
        }
        #[cfg(feature = "tracing")]
        tracing::trace!(timer = name, ?elapsed, ?labels, "cache-proxy timer");
        #[cfg(not(any(feature = "metrics", feature = "tracing")))]
        {
            let _ = (name, elapsed, labels);
        }
    }
}
