//! The strategy state machine tying the other four subsystems together (§4.5).

use crate::backend::Backend;
use crate::events::RouterEvent;
use crate::refresh::RefreshWorker;
use cache_proxy_cache::{CacheEntry, TwoTierCache};
use cache_proxy_coalesce::{Attempt, Deduper, FollowerOutcome};
use cache_proxy_core::{
    fingerprint, CacheRequest, CacheResponse, ErrorKind, EventListener, EventListeners, Monitor, NoopMonitor, ProxyError,
    Source,
};
use cache_proxy_resilience::BackendCaller;
use cache_proxy_strategy::{Rule, Strategy, StrategyResolver};
use futures::future::BoxFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

/// Composes [`StrategyResolver`], [`TwoTierCache`], [`Deduper`],
/// [`BackendCaller`], and [`RefreshWorker`] into the single entry point a
/// transport adapter calls per request.
///
/// Cheap to clone: every field is an `Arc`, matching the corpus's own
/// `Service` structs that hold shared middleware state behind `Arc`.
#[derive(Clone)]
pub struct Router {
    resolver: Arc<StrategyResolver>,
    cache: Arc<TwoTierCache>,
    deduper: Arc<Deduper>,
    resilience: Arc<BackendCaller>,
    backend: Arc<dyn Backend>,
    refresh: Arc<RefreshWorker>,
    events: EventListeners<RouterEvent>,
    monitor: Arc<dyn Monitor>,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<StrategyResolver>,
        cache: Arc<TwoTierCache>,
        deduper: Arc<Deduper>,
        resilience: Arc<BackendCaller>,
        backend: Arc<dyn Backend>,
        refresh: Arc<RefreshWorker>,
    ) -> Self {
        Self::with_monitor(resolver, cache, deduper, resilience, backend, refresh, Arc::new(NoopMonitor))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_monitor(
        resolver: Arc<StrategyResolver>,
        cache: Arc<TwoTierCache>,
        deduper: Arc<Deduper>,
        resilience: Arc<BackendCaller>,
        backend: Arc<dyn Backend>,
        refresh: Arc<RefreshWorker>,
        monitor: Arc<dyn Monitor>,
    ) -> Self {
        Self {
            resolver,
            cache,
            deduper,
            resilience,
            backend,
            refresh,
            events: EventListeners::new(),
            monitor,
        }
    }

    pub fn add_event_listener<L>(&mut self, listener: L)
    where
        L: EventListener<RouterEvent> + 'static,
    {
        self.events.add(listener);
    }

    /// Runs a single query through the cache-strategy state machine. Never
    /// fails except for [`ProxyError::Validation`] and
    /// [`ProxyError::Cancelled`] — every other backend-path error is
    /// absorbed by the fallback policy (§7) and returned as `Ok`.
    pub async fn route(&self, source: &Source, request: &CacheRequest) -> Result<CacheResponse, ProxyError> {
        let start = Instant::now();
        let first_code = request.codes.first().map(|c| c.r#type.as_str()).unwrap_or("");
        let first_index = request.indexes.first().map(|i| i.index_id.as_str()).unwrap_or("");
        let rule = self.resolver.resolve(first_code, first_index, source.as_str());
        let fp = fingerprint(source, request);

        let result = match rule.strategy {
            Strategy::NoCache => self.nocache_path(source, request, &rule, &fp).await,
            Strategy::Passive => self.cached_path(source, request, &rule, &fp, false).await,
            Strategy::Active => self.cached_path(source, request, &rule, &fp, true).await,
        };

        self.monitor.timer(
            "api.response.duration",
            start.elapsed(),
            &[("strategy", strategy_tag(rule.strategy)), ("source_id", source.as_str())],
        );
        result
    }

    async fn nocache_path(
        &self,
        source: &Source,
        request: &CacheRequest,
        rule: &Arc<Rule>,
        fp: &str,
    ) -> Result<CacheResponse, ProxyError> {
        self.record_decision(fp, source, rule.strategy, "miss");
        match self.dedupe_call(source, request, fp, rule, false).await {
            Ok(response) => Ok(response),
            Err(err) => self.apply_fallback(source, fp, rule, err),
        }
    }

    /// Shared by Passive and Active: only their refresh-scheduling
    /// behavior on a fresh hit differs (`active_refresh_on_fresh`).
    async fn cached_path(
        &self,
        source: &Source,
        request: &CacheRequest,
        rule: &Arc<Rule>,
        fp: &str,
        active_refresh_on_fresh: bool,
    ) -> Result<CacheResponse, ProxyError> {
        if let Some((entry, tier)) = self.cache.get(fp) {
            if entry.is_fresh() {
                self.record_decision(fp, source, rule.strategy, "hit_fresh");
                if active_refresh_on_fresh && entry.due_for_refresh() {
                    self.refresh.schedule(source.clone(), request.clone(), fp.to_string(), &entry);
                }
                return Ok((*entry.payload).clone());
            }
            if entry.is_stale_usable(self.cache.stale_ttl()) {
                self.record_decision(fp, source, rule.strategy, "hit_stale");
                self.refresh.schedule(source.clone(), request.clone(), fp.to_string(), &entry);
                return Ok((*entry.payload).clone());
            }
            // Entry is past both the fresh and stale-usable windows; fall
            // through to the backend as though it were a miss. A primary
            // entry in this state only exists in the window between TTL
            // expiry and the next sweep (`TwoTierCache::sweep_expired`).
            let _ = tier;
        }

        self.record_decision(fp, source, rule.strategy, "miss");
        match self.dedupe_call(source, request, fp, rule, true).await {
            Ok(response) => Ok(response),
            Err(err) => self.apply_fallback(source, fp, rule, err),
        }
    }

    /// Drives `(source, request)` to the backend through the deduper and
    /// resilience stack, writing the result to cache on success when
    /// `writes_cache` is set. Recurses once per follower wake-up — see
    /// module docs on [`cache_proxy_coalesce::FollowerOutcome::Ok`].
    fn dedupe_call<'a>(
        &'a self,
        source: &'a Source,
        request: &'a CacheRequest,
        fp: &'a str,
        rule: &'a Arc<Rule>,
        writes_cache: bool,
    ) -> Pin<Box<dyn Future<Output = Result<CacheResponse, ProxyError>> + Send + 'a>> {
        Box::pin(async move {
            match self.deduper.acquire(fp) {
                Attempt::Leader(leader) => {
                    let backend = Arc::clone(&self.backend);
                    let source_owned = source.clone();
                    let request_owned = request.clone();
                    let leader_ceiling = self.deduper.config().leader_ceiling();
                    let ceiling_start = Instant::now();
                    let call = self.resilience.call(source.as_str(), || {
                        let backend = Arc::clone(&backend);
                        let source = source_owned.clone();
                        let request = request_owned.clone();
                        async move { backend.call(source, request).await }
                    });
                    // §4.4 point 4: the leader's own hard ceiling on its
                    // producer is strictly below the follower's wait (10s),
                    // so a breach here unblocks followers before they time
                    // out on their own.
                    let result = match tokio::time::timeout(leader_ceiling, call).await {
                        Ok(result) => result,
                        Err(_elapsed) => Err(ProxyError::Timeout {
                            elapsed: ceiling_start.elapsed(),
                            overall: true,
                        }),
                    };

                    match &result {
                        Ok(response) => {
                            if writes_cache && response.is_success() {
                                self.cache.put(
                                    fp.to_string(),
                                    CacheEntry::new(fp.to_string(), response.clone(), Arc::clone(rule)),
                                );
                            }
                            leader.complete(Ok(()));
                        }
                        Err(err) => {
                            self.monitor
                                .increment("business.error", &[("type", err.kind_tag()), ("source_id", source.as_str())]);
                            leader.complete(Err(ErrorKind::from(err)));
                        }
                    }
                    result
                }
                Attempt::Follower(follower) => {
                    let wait_start = Instant::now();
                    let outcome = follower.wait().await;
                    self.monitor
                        .timer("request.wait.duration", wait_start.elapsed(), &[("source_id", source.as_str())]);

                    match outcome {
                        FollowerOutcome::Ok => {
                            if let Some((entry, _)) = self.cache.get(fp) {
                                if entry.is_fresh() || entry.is_stale_usable(self.cache.stale_ttl()) {
                                    return Ok((*entry.payload).clone());
                                }
                            }
                            self.dedupe_call(source, request, fp, rule, writes_cache).await
                        }
                        FollowerOutcome::Err(kind) => Err(kind.to_proxy_error()),
                        FollowerOutcome::Timeout => Err(ProxyError::FollowerTimeout),
                    }
                }
            }
        })
    }

    /// §7 propagation policy: a stale-usable entry beats the synthetic
    /// response; `Validation`/`Cancelled` are not fallback triggers and
    /// propagate as-is.
    fn apply_fallback(
        &self,
        source: &Source,
        fp: &str,
        rule: &Arc<Rule>,
        err: ProxyError,
    ) -> Result<CacheResponse, ProxyError> {
        if !err.is_fallback_trigger() {
            return Err(err);
        }

        if rule.allow_stale {
            if let Some((entry, _)) = self.cache.get(fp) {
                if entry.is_stale_usable(self.cache.stale_ttl()) {
                    self.emit_fallback(fp, source, "stale_cache");
                    return Ok((*entry.payload).clone());
                }
            }
        }

        self.emit_fallback(fp, source, "error_response");
        Ok(CacheResponse::synthetic_unavailable())
    }

    fn emit_fallback(&self, fp: &str, source: &Source, kind: &'static str) {
        self.monitor
            .increment("fallback.triggered", &[("type", kind), ("source_id", source.as_str())]);
        self.events.emit(&RouterEvent::FallbackTriggered {
            fingerprint: fp.to_string(),
            source_id: source.as_str().to_string(),
            kind,
            timestamp: Instant::now(),
        });
    }

    fn record_decision(&self, fp: &str, source: &Source, strategy: Strategy, result: &'static str) {
        self.monitor.increment(
            "cache.access",
            &[
                ("result", result),
                ("strategy", strategy_tag(strategy)),
                ("source_id", source.as_str()),
            ],
        );
        self.events.emit(&RouterEvent::CacheDecision {
            fingerprint: fp.to_string(),
            source_id: source.as_str().to_string(),
            strategy: strategy_tag(strategy),
            result,
            timestamp: Instant::now(),
        });
    }
}

fn strategy_tag(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::NoCache => "nocache",
        Strategy::Passive => "passive",
        Strategy::Active => "active",
    }
}

use std::future::Future;

/// `tower::Service<(Source, CacheRequest)>` adapter (§4.5, §6): the
/// router is the one place in the workspace where a plain `Service` with
/// explicit internal branches is used instead of a `Layer` stack, since
/// the control flow between collaborators is conditional rather than
/// linear.
impl tower_service::Service<(Source, CacheRequest)> for Router {
    type Response = CacheResponse;
    type Error = ProxyError;
    type Future = BoxFuture<'static, Result<CacheResponse, ProxyError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, (source, request): (Source, CacheRequest)) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { router.route(&source, &request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cache_proxy_cache::CacheConfig;
    use cache_proxy_coalesce::CoalesceConfig;
    use cache_proxy_core::{CodeSelector, IndexSelector, PageInfo};
    use cache_proxy_resilience::{CircuitConfig, ResilienceConfig, RetryConfig};
    use cache_proxy_strategy::{Pattern, RuleConfig};
    use regex::Regex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tower_service::Service as _;

    fn request() -> CacheRequest {
        CacheRequest {
            codes: vec![CodeSelector {
                r#type: "EQ".to_string(),
                values: vec!["AAPL".to_string()],
            }],
            indexes: vec![IndexSelector {
                index_id: "idx1".to_string(),
                time_type: None,
                timestamp: None,
                attributes: None,
            }],
            page: PageInfo { begin: 0, size: 1 },
        }
    }

    fn ok_response(tag: &str) -> CacheResponse {
        CacheResponse {
            status_code: 0,
            status_msg: tag.to_string(),
            body: Default::default(),
        }
    }

    /// Replays a fixed list of outcomes, one per call, holding the last
    /// one for any calls beyond the scripted list; counts total calls.
    struct ScriptedBackend {
        outcomes: parking_lot::Mutex<Vec<Result<CacheResponse, ProxyError>>>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<Result<CacheResponse, ProxyError>>) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    outcomes: parking_lot::Mutex::new(outcomes),
                    calls: Arc::clone(&calls),
                    delay: Duration::ZERO,
                }),
                calls,
            )
        }

        fn with_delay(outcomes: Vec<Result<CacheResponse, ProxyError>>, delay: Duration) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Arc::new(Self {
                    outcomes: parking_lot::Mutex::new(outcomes),
                    calls: Arc::clone(&calls),
                    delay,
                }),
                calls,
            )
        }
    }

    impl Backend for ScriptedBackend {
        fn call(&self, _source: Source, _request: CacheRequest) -> BoxFuture<'static, Result<CacheResponse, ProxyError>> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock();
            let last = outcomes.len() - 1;
            let outcome = outcomes[index.min(last)].clone();
            let delay = self.delay;
            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            })
        }
    }

    fn rule(name: &str, strategy: Strategy, ttl: Duration, allow_stale: bool, refresh_interval: Duration) -> RuleConfig {
        RuleConfig {
            name: name.to_string(),
            code_pattern: Some("^EQ".to_string()),
            index_pattern: None,
            source_pattern: None,
            strategy: match strategy {
                Strategy::NoCache => "NoCache".to_string(),
                Strategy::Passive => "Passive".to_string(),
                Strategy::Active => "Active".to_string(),
            },
            cache_ttl: Some(humantime::format_duration(ttl).to_string()),
            refresh_interval: if refresh_interval.is_zero() {
                None
            } else {
                Some(humantime::format_duration(refresh_interval).to_string())
            },
            allow_stale_data: allow_stale,
            priority: 1,
        }
    }

    fn router_with_rule(rule_cfg: RuleConfig, backend: Arc<dyn Backend>) -> Router {
        let resolver = Arc::new(StrategyResolver::new(vec![rule_cfg.compile().unwrap()]));
        let cache = Arc::new(TwoTierCache::new(
            CacheConfig::builder().stale_ttl(Duration::from_secs(3600)).build(),
        ));
        let deduper = Deduper::new(CoalesceConfig::builder().follower_wait(Duration::from_secs(2)).build());
        let resilience = Arc::new(BackendCaller::new(
            ResilienceConfig::builder()
                .circuit(CircuitConfig::builder().min_calls(2).window_size(2).build())
                .retry(
                    RetryConfig::builder()
                        .max_retries(2)
                        .initial_backoff(Duration::from_millis(1))
                        .max_backoff(Duration::from_millis(2))
                        .attempt_deadline(Duration::from_millis(200))
                        .overall_deadline(Duration::from_millis(600))
                        .build(),
                )
                .build(),
        ));
        let refresh = Arc::new(RefreshWorker::new(Arc::clone(&cache), Arc::clone(&resilience), Arc::clone(&backend)));
        Router::new(resolver, cache, deduper, resilience, backend, refresh)
    }

    #[tokio::test]
    async fn nocache_never_writes_to_the_cache() {
        let (backend, calls) = ScriptedBackend::new(vec![Ok(ok_response("a")), Ok(ok_response("b"))]);
        let router = router_with_rule(
            rule("r", Strategy::NoCache, Duration::from_secs(60), false, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let first = router.route(&source, &request()).await.unwrap();
        let second = router.route(&source, &request()).await.unwrap();

        assert_eq!(first.status_msg, "a");
        assert_eq!(second.status_msg, "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn passive_caches_on_miss_and_serves_the_cached_value_on_hit() {
        let (backend, calls) = ScriptedBackend::new(vec![Ok(ok_response("first")), Ok(ok_response("second"))]);
        let router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_secs(60), true, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let first = router.route(&source, &request()).await.unwrap();
        let second = router.route(&source, &request()).await.unwrap();

        assert_eq!(first.status_msg, "first");
        assert_eq!(second.status_msg, "first");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_are_coalesced_into_one_backend_call() {
        let (backend, calls) = ScriptedBackend::with_delay(vec![Ok(ok_response("shared"))], Duration::from_millis(30));
        let router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_secs(60), true, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let mut handles = Vec::new();
        for _ in 0..20 {
            let router = router.clone();
            let source = source.clone();
            handles.push(tokio::spawn(async move { router.route(&source, &request()).await.unwrap() }));
        }
        for h in handles {
            let response = h.await.unwrap();
            assert_eq!(response.status_msg, "shared");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_4xx_is_not_retried_and_falls_back_to_the_synthetic_response() {
        let (backend, calls) = ScriptedBackend::new(vec![Err(ProxyError::UpstreamClient { status: 404 })]);
        let router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_secs(60), false, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let response = router.route(&source, &request()).await.unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_5xx_is_retried_then_succeeds() {
        let (backend, calls) = ScriptedBackend::new(vec![
            Err(ProxyError::UpstreamServer { status: 503 }),
            Err(ProxyError::UpstreamServer { status: 503 }),
            Ok(ok_response("recovered")),
        ]);
        let router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_secs(60), false, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let response = router.route(&source, &request()).await.unwrap();
        assert_eq!(response.status_msg, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn backend_failure_after_ttl_falls_back_to_a_stale_entry() {
        let (backend, _calls) = ScriptedBackend::new(vec![
            Ok(ok_response("fresh")),
            Err(ProxyError::UpstreamServer { status: 500 }),
            Err(ProxyError::UpstreamServer { status: 500 }),
            Err(ProxyError::UpstreamServer { status: 500 }),
        ]);
        let router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_millis(20), true, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        let first = router.route(&source, &request()).await.unwrap();
        assert_eq!(first.status_msg, "fresh");

        tokio::time::sleep(Duration::from_millis(40)).await;

        let second = router.route(&source, &request()).await.unwrap();
        assert_eq!(second.status_msg, "fresh");
    }

    #[tokio::test]
    async fn the_circuit_opens_after_repeated_failures_and_the_router_still_falls_back() {
        let outcomes: Vec<Result<CacheResponse, ProxyError>> =
            (0..10).map(|_| Err(ProxyError::UpstreamServer { status: 500 })).collect();
        let (backend, _calls) = ScriptedBackend::new(outcomes);
        let router = router_with_rule(
            rule("r", Strategy::NoCache, Duration::ZERO, false, Duration::ZERO),
            backend,
        );
        let source = Source::new("s1");

        for _ in 0..6 {
            let response = router.route(&source, &request()).await.unwrap();
            assert_eq!(response.status_code, 500);
        }
    }

    #[tokio::test]
    async fn active_strategy_schedules_a_refresh_once_due() {
        let (backend, calls) = ScriptedBackend::new(vec![Ok(ok_response("first")), Ok(ok_response("refreshed"))]);
        let router = router_with_rule(
            rule(
                "r",
                Strategy::Active,
                Duration::from_secs(60),
                true,
                Duration::from_millis(10),
            ),
            backend,
        );
        let source = Source::new("s1");

        router.route(&source, &request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        router.route(&source, &request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn the_tower_service_impl_delegates_to_route() {
        let (backend, _calls) = ScriptedBackend::new(vec![Ok(ok_response("via-service"))]);
        let mut router = router_with_rule(
            rule("r", Strategy::Passive, Duration::from_secs(60), false, Duration::ZERO),
            backend,
        );
        let response = router.call((Source::new("s1"), request())).await.unwrap();
        assert_eq!(response.status_msg, "via-service");
    }
}
