//! A reactive caching proxy: rule-based cache strategy selection, a
//! two-tier (fresh + stale) response cache, single-flight request
//! coalescing, and resilient backend calls, wired behind a single
//! `tower_service::Service<(Source, CacheRequest)>`.
//!
//! This crate is the assembly point for the five subsystem crates; it
//! does not implement any strategy itself. See [`builder`] for how a
//! `Router` gets built from a [`builder::ProxyConfig`] and a
//! [`config::ConfigSource`], and [`cache_proxy_router::Backend`] for
//! the egress boundary an embedder implements.
//!
//! # Example
//!
//! ```no_run
//! use cache_proxy::{ProxyBuilder, ProxyConfig};
//! use cache_proxy::config::StaticConfigSource;
//! use cache_proxy_core::{CacheRequest, CacheResponse, CodeSelector, IndexSelector, PageInfo, ProxyError, Source};
//! use cache_proxy_router::Backend;
//! use cache_proxy_strategy::RuleConfig;
//! use futures::future::BoxFuture;
//! use std::sync::Arc;
//! use tower_service::Service;
//!
//! struct NullBackend;
//!
//! impl Backend for NullBackend {
//!     fn call(&self, _source: Source, _request: CacheRequest) -> BoxFuture<'static, Result<CacheResponse, ProxyError>> {
//!         Box::pin(async { Ok(CacheResponse::synthetic_unavailable()) })
//!     }
//! }
//!
//! # async fn example() {
//! let rules = vec![RuleConfig {
//!     name: "equities".to_string(),
//!     strategy: "Passive".to_string(),
//!     cache_ttl: Some("5m".to_string()),
//!     allow_stale_data: true,
//!     priority: 10,
//!     ..Default::default()
//! }];
//! let config_source = StaticConfigSource::new(rules);
//!
//! let built = ProxyBuilder::new(ProxyConfig::builder().build())
//!     .build(&config_source, Arc::new(NullBackend));
//!
//! let request = CacheRequest {
//!     codes: vec![CodeSelector { r#type: "EQ".to_string(), values: vec!["AAPL".to_string()] }],
//!     indexes: vec![IndexSelector { index_id: "idx1".to_string(), time_type: None, timestamp: None, attributes: None }],
//!     page: PageInfo { begin: 0, size: 1 },
//! };
//!
//! let mut router = built.router;
//! let _ = router.call((Source::new("default"), request)).await;
//! # }
//! ```

pub mod builder;
pub mod config;

pub use builder::{Built, ProxyBuilder, ProxyConfig, ProxyConfigBuilder};

pub use cache_proxy_cache as cache;
pub use cache_proxy_coalesce as coalesce;
pub use cache_proxy_core as core;
pub use cache_proxy_resilience as resilience;
pub use cache_proxy_router as router;
pub use cache_proxy_strategy as strategy;
