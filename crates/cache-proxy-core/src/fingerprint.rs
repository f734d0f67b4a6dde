//! Deterministic stable fingerprint for `(source_id, request)` (§4.1).
//!
//! The hash seed is fixed rather than process-random: `ahash`'s default
//! construction draws its keys from the OS RNG once per process, which
//! would silently invalidate every cache key across a restart or rolling
//! deploy. A cache key needs to be stable, not collision-hardened against
//! an adversary, so a fixed seed is the correct tradeoff here.

use crate::model::{CacheRequest, Source};
use ahash::RandomState;
use std::fmt::Write as _;
use std::hash::{BuildHasher, Hasher};

const FINGERPRINT_KEYS: (u64, u64, u64, u64) = (
    0x9E3779B97F4A7C15,
    0xC2B2AE3D27D4EB4F,
    0x165667B19E3779F9,
    0x27D4EB2F165667C5,
);

fn hasher() -> ahash::AHasher {
    let (k0, k1, k2, k3) = FINGERPRINT_KEYS;
    RandomState::with_seeds(k0, k1, k2, k3).build_hasher()
}

/// Canonicalizes the `codes` sequence: selector groups keep their input
/// order; within a group, values are joined by `,` in input order (order
/// is caller-significant, so it is preserved rather than sorted).
fn canonical_codes(req: &CacheRequest) -> String {
    let mut out = String::new();
    for (i, selector) in req.codes.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        let _ = write!(out, "{}:{}", selector.r#type, selector.values.join(","));
    }
    out
}

/// Canonicalizes `indexes`: each entry as `index_id[:time_type][:timestamp]`
/// joined by `|`. `attributes` is intentionally excluded — it is a
/// presentation hint for the backend, not part of cache identity.
fn canonical_indexes(req: &CacheRequest) -> String {
    let mut out = String::new();
    for (i, index) in req.indexes.iter().enumerate() {
        if i > 0 {
            out.push('|');
        }
        out.push_str(&index.index_id);
        if let Some(time_type) = &index.time_type {
            let _ = write!(out, ":{time_type}");
        }
        if let Some(timestamp) = index.timestamp {
            let _ = write!(out, ":{timestamp}");
        }
    }
    out
}

fn canonical_page(req: &CacheRequest) -> String {
    format!("p{}s{}", req.page.begin, req.page.size)
}

/// Computes the stable fingerprint for `(source, request)`, used as the
/// cache and deduper map key.
pub fn fingerprint(source: &Source, req: &CacheRequest) -> String {
    let canonical = format!(
        "{}#{}#{}#{}",
        source.as_str(),
        canonical_codes(req),
        canonical_indexes(req),
        canonical_page(req)
    );

    let mut hasher = hasher();
    hasher.write(canonical.as_bytes());
    format!("cache:{:016x}", hasher.finish())
}
