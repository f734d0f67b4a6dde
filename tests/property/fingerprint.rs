//! Property tests for the request fingerprinter.
//!
//! Invariants tested:
//! - Deterministic: the same `(source, request)` always hashes the same
//! - Attribute-map permutation-invariant: `attributes` is excluded from
//!   the key entirely, so any map content never changes the fingerprint
//! - Page bounds are key-significant: changing `begin` or `size` always
//!   changes the fingerprint

use cache_proxy_core::{fingerprint, CacheRequest, CodeSelector, IndexSelector, PageInfo, Source};
use proptest::collection::{btree_map, vec as pvec};
use proptest::prelude::*;

fn code_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z]{1,8}"
}

fn request_strategy() -> impl Strategy<Value = CacheRequest> {
    (
        code_strategy(),
        pvec("[A-Z]{1,6}", 1..4),
        "[a-z0-9]{1,8}",
        0u32..1000,
        1u32..200,
    )
        .prop_map(|(code_type, values, index_id, begin, size)| CacheRequest {
            codes: vec![CodeSelector { r#type: code_type, values }],
            indexes: vec![IndexSelector {
                index_id,
                time_type: None,
                timestamp: None,
                attributes: None,
            }],
            page: PageInfo { begin, size },
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: fingerprinting the same request twice always yields the
    /// same key.
    #[test]
    fn fingerprint_is_deterministic(source_id in "[a-z0-9_-]{1,12}", req in request_strategy()) {
        let source = Source::new(source_id.as_str());
        prop_assert_eq!(fingerprint(&source, &req), fingerprint(&source, &req));
    }

    /// Property: any two attribute maps with the same entries (or
    /// different entries entirely) never change the fingerprint, since
    /// `attributes` is not part of cache identity.
    #[test]
    fn attributes_never_affect_the_fingerprint(
        source_id in "[a-z0-9_-]{1,12}",
        mut req in request_strategy(),
        attrs_a in btree_map("[a-z]{1,4}", "[a-z0-9]{1,4}", 0..5),
        attrs_b in btree_map("[a-z]{1,4}", "[a-z0-9]{1,4}", 0..5),
    ) {
        let source = Source::new(source_id.as_str());
        req.indexes[0].attributes = Some(attrs_a);
        let fp_a = fingerprint(&source, &req);
        req.indexes[0].attributes = Some(attrs_b);
        let fp_b = fingerprint(&source, &req);
        prop_assert_eq!(fp_a, fp_b);
    }

    /// Property: changing the page window always changes the fingerprint.
    #[test]
    fn page_bounds_are_key_significant(
        source_id in "[a-z0-9_-]{1,12}",
        mut req in request_strategy(),
        delta in 1u32..50,
    ) {
        let source = Source::new(source_id.as_str());
        let before = fingerprint(&source, &req);
        req.page.begin = req.page.begin.wrapping_add(delta);
        let after = fingerprint(&source, &req);
        prop_assert_ne!(before, after);
    }

    /// Property: two different source ids for an otherwise identical
    /// request never collide.
    #[test]
    fn distinct_sources_never_share_a_fingerprint(
        source_a in "[a-z]{1,8}",
        source_b in "[a-z]{1,8}",
        req in request_strategy(),
    ) {
        prop_assume!(source_a != source_b);
        let fp_a = fingerprint(&Source::new(source_a.as_str()), &req);
        let fp_b = fingerprint(&Source::new(source_b.as_str()), &req);
        prop_assert_ne!(fp_a, fp_b);
    }
}
