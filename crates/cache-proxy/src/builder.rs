//! Assembles the five subsystems into a [`Router`] from a [`ProxyConfig`]
//! (§1's "Startup wiring"), in the same spirit as the corpus's
//! per-pattern `*ConfigBuilder` types composed into a `ServiceBuilder`
//! stack.

use crate::config::{compile_snapshot, ConfigSource};
use cache_proxy_cache::{CacheConfig, TwoTierCache};
use cache_proxy_coalesce::{CoalesceConfig, Deduper};
use cache_proxy_core::Monitor;
use cache_proxy_resilience::{BackendCaller, ResilienceConfig};
use cache_proxy_router::{Backend, RefreshWorker, Router};
use cache_proxy_strategy::StrategyResolver;
use std::sync::Arc;

/// Everything needed to assemble a [`Router`], gathered from the
/// configuration inputs named in §6: `cache.strategy.*`,
/// `remote.service.config` (split here into [`ResilienceConfig`]),
/// and `cache.memory.config` (split here into [`CacheConfig`] and
/// [`CoalesceConfig`]).
pub struct ProxyConfig {
    pub cache: CacheConfig,
    pub coalesce: CoalesceConfig,
    pub resilience: ResilienceConfig,
}

impl ProxyConfig {
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::new()
    }
}

pub struct ProxyConfigBuilder {
    config: ProxyConfig,
}

impl ProxyConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ProxyConfig {
                cache: CacheConfig::builder().build(),
                coalesce: CoalesceConfig::builder().build(),
                resilience: ResilienceConfig::builder().build(),
            },
        }
    }
}

impl Default for ProxyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyConfigBuilder {
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn coalesce(mut self, coalesce: CoalesceConfig) -> Self {
        self.config.coalesce = coalesce;
        self
    }

    pub fn resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.config.resilience = resilience;
        self
    }

    pub fn build(self) -> ProxyConfig {
        self.config
    }
}

/// Builds a [`Router`] from a [`ProxyConfig`], an initial [`ConfigSource`]
/// for the rule set, and a [`Backend`] implementation for the egress
/// boundary.
///
/// Compiled rules that fail validation at build time are reported in
/// [`Built::rule_errors`] rather than failing the build outright — a
/// single malformed rule in a large config should not take the whole
/// proxy down; it just never matches anything.
pub struct ProxyBuilder {
    config: ProxyConfig,
    monitor: Arc<dyn Monitor>,
}

/// The outcome of [`ProxyBuilder::build`]: a ready-to-use [`Router`]
/// plus a handle to keep the strategy resolver in sync with
/// `config_source` as it changes.
pub struct Built {
    pub router: Router,
    pub resolver: Arc<StrategyResolver>,
    pub rule_errors: Vec<cache_proxy_strategy::RuleParseError>,
}

impl ProxyBuilder {
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_monitor(config, Arc::new(cache_proxy_core::NoopMonitor))
    }

    pub fn with_monitor(config: ProxyConfig, monitor: Arc<dyn Monitor>) -> Self {
        Self { config, monitor }
    }

    pub fn build(self, config_source: &dyn ConfigSource, backend: Arc<dyn Backend>) -> Built {
        let snapshot = config_source.snapshot();
        let (rules, rule_errors) = compile_snapshot(&snapshot);

        let resolver = Arc::new(StrategyResolver::new(rules));
        let cache = Arc::new(TwoTierCache::with_monitor(self.config.cache, Arc::clone(&self.monitor)));
        let deduper = Deduper::with_monitor(self.config.coalesce, Arc::clone(&self.monitor));
        let resilience = Arc::new(BackendCaller::with_monitor(self.config.resilience, Arc::clone(&self.monitor)));
        let refresh = Arc::new(RefreshWorker::with_monitor(
            Arc::clone(&cache),
            Arc::clone(&resilience),
            Arc::clone(&backend),
            Arc::clone(&self.monitor),
        ));

        let router = Router::with_monitor(
            Arc::clone(&resolver),
            cache,
            deduper,
            resilience,
            backend,
            refresh,
            self.monitor,
        );

        Built {
            router,
            resolver,
            rule_errors,
        }
    }
}

/// Spawns a task that republishes the resolver's rule list every time
/// `config_source` reports a change (§4.2's hot-reload requirement).
/// Runs until `config_source.changed()` stops resolving, which for a
/// [`crate::config::StaticConfigSource`] is never.
pub fn spawn_config_watcher(resolver: Arc<StrategyResolver>, config_source: Arc<dyn ConfigSource>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            config_source.changed().await;
            let snapshot = config_source.snapshot();
            let (rules, _errors) = compile_snapshot(&snapshot);
            resolver.publish(rules);
        }
    })
}
