//! Resilient backend calling for cache-proxy (§4.7).
//!
//! A cache miss that has to go to the backend passes through three
//! cooperating mechanisms, composed by [`BackendCaller`]:
//!
//! - a bounded isolation [`Pool`] so backend latency cannot starve
//!   ingress capacity;
//! - a per-`source_id` [`SourceBreakers`] circuit breaker keyed on a
//!   rolling failure+slow-call rate;
//! - retry with exponential backoff and a hard attempt/overall deadline,
//!   applied by [`retry::execute`].
//!
//! # Example
//!
//! ```no_run
//! use cache_proxy_resilience::{BackendCaller, ResilienceConfig};
//! use cache_proxy_core::{CacheResponse, ProxyError};
//!
//! # async fn example() {
//! let caller = BackendCaller::new(ResilienceConfig::builder().build());
//!
//! let result = caller
//!     .call("source-1", || async {
//!         Ok::<_, ProxyError>(CacheResponse {
//!             status_code: 0,
//!             status_msg: "ok".to_string(),
//!             body: Default::default(),
//!         })
//!     })
//!     .await;
//! # let _ = result;
//! # }
//! ```

mod breaker;
mod caller;
mod circuit;
mod config;
mod events;
mod pool;
mod retry;

pub use breaker::SourceBreakers;
pub use caller::BackendCaller;
pub use circuit::{Circuit, CircuitMetrics, CircuitState};
pub use config::{
    CircuitConfig, CircuitConfigBuilder, PoolConfig, PoolConfigBuilder, ResilienceConfig,
    ResilienceConfigBuilder, RetryConfig, RetryConfigBuilder,
};
pub use events::ResilienceEvent;
pub use pool::Pool;
