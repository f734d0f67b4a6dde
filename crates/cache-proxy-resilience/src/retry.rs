//! Retry, backoff, and deadline enforcement (§4.7.3).

use crate::config::RetryConfig;
use crate::events::ResilienceEvent;
use cache_proxy_core::{EventListeners, Monitor, ProxyError};
use std::future::Future;
use std::time::{Duration, Instant};

/// Runs `producer` under the attempt and overall deadlines, retrying on
/// transient failures up to `config.max_retries` times with exponential
/// backoff.
///
/// `producer` is called once per attempt and must itself be cancel-safe:
/// dropping its future (on attempt-deadline expiry) must release any
/// resource it holds, exactly as the bounded pool's permits do.
///
/// Emits `remote.call{result,source_id}` once per attempt, so a call that
/// fails twice before succeeding reports two `error`s and one `success`,
/// not a single result for the whole operation.
pub async fn execute<F, Fut>(
    config: &RetryConfig,
    source_id: &str,
    events: &EventListeners<ResilienceEvent>,
    monitor: &dyn Monitor,
    mut producer: F,
) -> Result<cache_proxy_core::CacheResponse, ProxyError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<cache_proxy_core::CacheResponse, ProxyError>>,
{
    let overall_start = Instant::now();
    let mut backoff = config.initial_backoff;
    let mut attempt = 0usize;

    loop {
        let remaining_overall = config.overall_deadline.saturating_sub(overall_start.elapsed());
        if remaining_overall.is_zero() {
            return Err(ProxyError::Timeout {
                elapsed: overall_start.elapsed(),
                overall: true,
            });
        }

        let attempt_budget = config.attempt_deadline.min(remaining_overall);
        let attempt_start = Instant::now();
        let outcome = tokio::time::timeout(attempt_budget, producer()).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(ProxyError::Timeout {
                elapsed: attempt_start.elapsed(),
                overall: false,
            }),
        };

        monitor.increment(
            "remote.call",
            &[("result", if result.is_ok() { "success" } else { "error" }), ("source_id", source_id)],
        );

        let err = match result {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let remaining_after = config.overall_deadline.saturating_sub(overall_start.elapsed());
        let near_overall_deadline = remaining_after <= Duration::from_secs(1);
        let can_retry = err.is_retriable() && attempt < config.max_retries && !near_overall_deadline;

        if !can_retry {
            return Err(err);
        }

        attempt += 1;
        events.emit(&ResilienceEvent::RetryAttempted {
            source_id: source_id.to_string(),
            attempt,
            timestamp: Instant::now(),
        });

        tokio::time::sleep(backoff.min(remaining_after)).await;
        backoff = (backoff * 2).min(config.max_backoff);
    }
}
