//! The egress boundary: the core's only dependency on the real backend (§6).

use cache_proxy_core::{CacheRequest, CacheResponse, ProxyError, Source};
use futures::future::BoxFuture;

/// Calls the real remote service for `(source, request)`.
///
/// Implementations adapt whatever wire transport `remote.service.config`
/// points at into this shape; the router only ever sees [`ProxyError`],
/// never a transport-specific error type.
pub trait Backend: Send + Sync {
    fn call(&self, source: Source, request: CacheRequest) -> BoxFuture<'static, Result<CacheResponse, ProxyError>>;
}

impl<F> Backend for F
where
    F: Fn(Source, CacheRequest) -> BoxFuture<'static, Result<CacheResponse, ProxyError>> + Send + Sync,
{
    fn call(&self, source: Source, request: CacheRequest) -> BoxFuture<'static, Result<CacheResponse, ProxyError>> {
        (self)(source, request)
    }
}
