//! Core infrastructure for cache-proxy.
//!
//! This crate provides the shared foundation used by every other
//! cache-proxy crate:
//! - the request/response data model and ingress validation (§6)
//! - the closed proxy error taxonomy (§7)
//! - the stable request fingerprint used as cache/deduper key (§4.1)
//! - the event system used for cross-cutting observability
//! - the [`Monitor`] facade for counters/gauges/timers

pub mod error;
pub mod events;
pub mod fingerprint;
pub mod model;
pub mod monitor;

pub use error::{ErrorKind, ProxyError};
pub use events::{EventListener, EventListeners, ProxyEvent};
pub use fingerprint::fingerprint;
pub use model::{
    CacheRequest, CacheResponse, CodeSelector, IndexSelector, PageInfo, Source, ValidationError,
};
pub use monitor::{BackendMonitor, Monitor, NoopMonitor};
