//! The request/response shape the core operates on.
//!
//! These types are deliberately plain data — no HTTP framing, no JSON
//! parsing. A transport adapter owns turning wire bytes into these values
//! (and back); the core only needs `validate` to agree with whatever
//! adapter is in front of it.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single code selector group: a `type` tag and its associated values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CodeSelector {
    pub r#type: String,
    pub values: Vec<String>,
}

/// A single index selector.
///
/// `attributes` is carried for the backend's benefit only — it is
/// explicitly excluded from the fingerprint (see
/// [`crate::fingerprint::fingerprint`]), so a `BTreeMap` is used purely to
/// keep any future serialization deterministic, not because ordering
/// matters to the cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexSelector {
    pub index_id: String,
    pub time_type: Option<String>,
    pub timestamp: Option<i64>,
    pub attributes: Option<BTreeMap<String, String>>,
}

/// Page bounds for the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PageInfo {
    pub begin: u32,
    pub size: u32,
}

/// The structured query request, opaque to everything except the
/// fingerprinter and strategy resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheRequest {
    pub codes: Vec<CodeSelector>,
    pub indexes: Vec<IndexSelector>,
    pub page: PageInfo,
}

/// The business-tenant identifier carried out of band (`Source-Id` header
/// at the transport boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Source(pub String);

impl Source {
    /// The default tenant used when the header is absent or empty.
    pub const DEFAULT: &'static str = "default";

    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.trim().is_empty() {
            Source(Self::DEFAULT.to_string())
        } else {
            Source(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Source {
    fn default() -> Self {
        Source(Self::DEFAULT.to_string())
    }
}

/// The response payload. Only `status_code` is interpreted by the core:
/// `0` means success and is the sole condition under which a response may
/// be cached (§9 design note — the backend's other convention, HTTP-style
/// 200, is explicitly not treated as success here).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheResponse {
    pub status_code: i32,
    pub status_msg: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub body: serde_json_value::Value,
}

impl CacheResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }

    /// The synthetic fallback body returned when every recovery path has
    /// been exhausted (§7 propagation policy, path 2).
    pub fn synthetic_unavailable() -> Self {
        CacheResponse {
            status_code: 500,
            status_msg: "service temporarily unavailable, please retry".to_string(),
            body: serde_json_value::Value::Null,
        }
    }
}

/// Minimal stand-in for an opaque JSON body so this crate does not force a
/// hard dependency on `serde_json` when the `serde` feature is disabled.
/// With `serde` enabled, this re-exports `serde_json::Value` directly.
#[cfg(feature = "serde")]
pub mod serde_json_value {
    pub use serde_json::Value;
}

#[cfg(not(feature = "serde"))]
pub mod serde_json_value {
    #[derive(Debug, Clone, Default, PartialEq)]
    pub enum Value {
        #[default]
        Null,
        Opaque(std::sync::Arc<Vec<u8>>),
    }
}

/// Ingress validation failures (§6).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("code_selectors.include must be present and non-empty")]
    EmptyCodeSelectors,
    #[error("code selector `type` must be non-blank")]
    BlankCodeType,
    #[error("code selector `values` must be non-empty")]
    EmptyCodeValues,
    #[error("indexes must be present and non-empty")]
    EmptyIndexes,
    #[error("index `index_id` must be non-blank")]
    BlankIndexId,
    #[error("page_info.page_begin must be >= 0")]
    NegativePageBegin,
    #[error("page_info.page_size must be > 0")]
    NonPositivePageSize,
}

/// Pure validation function for ingress requests (§6). The transport
/// adapter is expected to call this before invoking the core `Service`;
/// it is exposed here so tests (and any adapter) share one definition of
/// "valid".
pub fn validate(req: &CacheRequest) -> Result<(), ValidationError> {
    if req.codes.is_empty() {
        return Err(ValidationError::EmptyCodeSelectors);
    }
    for selector in &req.codes {
        if selector.r#type.trim().is_empty() {
            return Err(ValidationError::BlankCodeType);
        }
        if selector.values.is_empty() {
            return Err(ValidationError::EmptyCodeValues);
        }
    }
    if req.indexes.is_empty() {
        return Err(ValidationError::EmptyIndexes);
    }
    for index in &req.indexes {
        if index.index_id.trim().is_empty() {
            return Err(ValidationError::BlankIndexId);
        }
    }
    if req.page.size == 0 {
        return Err(ValidationError::NonPositivePageSize);
    }
    Ok(())
}
