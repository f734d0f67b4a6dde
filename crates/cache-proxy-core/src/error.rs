//! The error taxonomy shared by every layer of the proxy.
//!
//! Unlike a generic composable wrapper, [`ProxyError`] is a closed enum: the
//! proxy's failure modes are fully enumerated by the backend contract
//! (timeouts, circuit state, transport/status-code classes) plus the
//! proxy's own bookkeeping (cancellation, internal invariant violations).
//! Every layer from the resilience call down to the router propagates this
//! same type, so no `From` boilerplate is needed between crates.

use std::fmt;
use std::time::Duration;

/// Errors produced anywhere in the cache-proxy call path.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProxyError {
    /// Ingress body or field-constraint validation failed.
    ///
    /// Not expected to reach the core `Service` boundary in practice — the
    /// transport adapter is expected to call [`crate::model::validate`]
    /// first — but kept as a variant so an adapter can still propagate it
    /// through the same error type.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The per-source circuit breaker is open (or the half-open trial quota
    /// is exhausted). Never retried.
    #[error("circuit breaker open for source {source_id:?}")]
    CircuitOpen { source_id: String },

    /// A deadline elapsed. `overall` distinguishes the 8s end-to-end budget
    /// (not retried) from a single 5s attempt (retried).
    #[error("timed out after {elapsed:?} (overall deadline: {overall})")]
    Timeout { elapsed: Duration, overall: bool },

    /// Connection refused/reset, TLS failure, DNS failure. Retried.
    #[error("transport error: {0}")]
    Transport(String),

    /// Backend returned a 5xx-equivalent failure. Retried.
    #[error("upstream server error: {status}")]
    UpstreamServer { status: i32 },

    /// Backend returned a 4xx-equivalent failure. Never retried.
    #[error("upstream client error: {status}")]
    UpstreamClient { status: i32 },

    /// The caller's future was dropped before completion.
    #[error("request cancelled")]
    Cancelled,

    /// The deduper follower's 10s ceiling elapsed while waiting on the
    /// leader's completion signal.
    #[error("deduper follower timed out waiting for leader")]
    FollowerTimeout,

    /// An invariant was violated; this indicates a bug, not a caller or
    /// backend fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Classifies this error for the retry predicate of §4.7.3: `true` means
    /// the resilience layer may attempt another call.
    pub fn is_retriable(&self) -> bool {
        match self {
            ProxyError::Timeout { overall, .. } => !overall,
            ProxyError::Transport(_) => true,
            ProxyError::UpstreamServer { .. } => true,
            ProxyError::CircuitOpen { .. } => false,
            ProxyError::UpstreamClient { .. } => false,
            ProxyError::Validation(_) => false,
            ProxyError::Cancelled => false,
            ProxyError::FollowerTimeout => false,
            ProxyError::Internal(_) => false,
        }
    }

    /// Returns `true` for errors that should trigger the stale-cache /
    /// synthetic-503 fallback path in the router (§7 propagation policy).
    pub fn is_fallback_trigger(&self) -> bool {
        !matches!(self, ProxyError::Validation(_) | ProxyError::Cancelled)
    }

    /// A short, stable tag for monitoring labels (`business.error{type=...}`).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            ProxyError::Validation(_) => "validation",
            ProxyError::CircuitOpen { .. } => "circuit_breaker_open",
            ProxyError::Timeout { overall: true, .. } => "overall_timeout",
            ProxyError::Timeout { overall: false, .. } => "attempt_timeout",
            ProxyError::Transport(_) => "transport",
            ProxyError::UpstreamServer { .. } => "upstream_server",
            ProxyError::UpstreamClient { .. } => "upstream_client",
            ProxyError::Cancelled => "cancelled",
            ProxyError::FollowerTimeout => "follower_timeout",
            ProxyError::Internal(_) => "internal",
        }
    }
}

/// The error kind alone, stripped of any payload that isn't `Clone + Send`
/// across the deduper's completion channel — followers receive this, never
/// the leader's original [`ProxyError`] value (§4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    CircuitOpen,
    Timeout,
    Transport,
    UpstreamServer,
    UpstreamClient,
    Cancelled,
    FollowerTimeout,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&ProxyError> for ErrorKind {
    fn from(err: &ProxyError) -> Self {
        match err {
            ProxyError::Validation(_) => ErrorKind::Validation,
            ProxyError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            ProxyError::Timeout { .. } => ErrorKind::Timeout,
            ProxyError::Transport(_) => ErrorKind::Transport,
            ProxyError::UpstreamServer { .. } => ErrorKind::UpstreamServer,
            ProxyError::UpstreamClient { .. } => ErrorKind::UpstreamClient,
            ProxyError::Cancelled => ErrorKind::Cancelled,
            ProxyError::FollowerTimeout => ErrorKind::FollowerTimeout,
            ProxyError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ErrorKind {
    /// Reconstructs a representative [`ProxyError`] from just the kind, for
    /// the follower path which only ever observed the kind, not the
    /// leader's original error value.
    pub fn to_proxy_error(self) -> ProxyError {
        match self {
            ErrorKind::Validation => ProxyError::Validation("propagated from leader".into()),
            ErrorKind::CircuitOpen => ProxyError::CircuitOpen {
                source_id: "unknown".into(),
            },
            ErrorKind::Timeout => ProxyError::Timeout {
                elapsed: Duration::ZERO,
                overall: true,
            },
            ErrorKind::Transport => ProxyError::Transport("propagated from leader".into()),
            ErrorKind::UpstreamServer => ProxyError::UpstreamServer { status: 0 },
            ErrorKind::UpstreamClient => ProxyError::UpstreamClient { status: 0 },
            ErrorKind::Cancelled => ProxyError::Cancelled,
            ErrorKind::FollowerTimeout => ProxyError::FollowerTimeout,
            ErrorKind::Internal => ProxyError::Internal("propagated from leader".into()),
        }
    }
}
