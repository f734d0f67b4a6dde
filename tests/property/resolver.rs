//! Property tests for `StrategyResolver`.
//!
//! Invariants tested:
//! - Resolution is a pure function: the same inputs against the same
//!   published rule list always resolve to the same rule
//! - Among rules that all match, the lowest-priority one always wins,
//!   regardless of the order the rules were given in

use cache_proxy_strategy::{Rule, RuleConfig, StrategyResolver};
use proptest::prelude::*;

fn matches_all_rule(name: String, priority: i32) -> RuleConfig {
    RuleConfig {
        name,
        strategy: "Passive".to_string(),
        cache_ttl: Some("1m".to_string()),
        allow_stale_data: true,
        priority,
        ..Default::default()
    }
}

fn priorities_strategy() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-1000i32..1000, 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: resolving the same triple twice against an unchanged
    /// rule list always returns the same rule.
    #[test]
    fn resolution_is_deterministic(priorities in priorities_strategy()) {
        let rules: Vec<Rule> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| matches_all_rule(format!("r{i}"), *p).compile().unwrap())
            .collect();
        let resolver = StrategyResolver::new(rules);

        let a = resolver.resolve("EQ", "idx1", "s1");
        let b = resolver.resolve("EQ", "idx1", "s1");
        prop_assert_eq!(a.name, b.name);
        prop_assert_eq!(a.priority, b.priority);
    }

    /// Property: whichever rule has the numerically lowest priority
    /// among all matches always wins, regardless of list order.
    #[test]
    fn the_lowest_priority_match_always_wins(priorities in priorities_strategy()) {
        let min_priority = *priorities.iter().min().unwrap();
        let rules: Vec<Rule> = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| matches_all_rule(format!("r{i}"), *p).compile().unwrap())
            .collect();
        let resolver = StrategyResolver::new(rules);

        let resolved = resolver.resolve("EQ", "idx1", "s1");
        prop_assert_eq!(resolved.priority, min_priority);
    }

    /// Property: no matter what is published, the resolver never fails
    /// to resolve a rule — the built-in default always backstops it.
    #[test]
    fn resolution_never_fails_even_with_an_empty_rule_list(
        code in "[a-zA-Z]{0,8}",
        index in "[a-zA-Z]{0,8}",
        source in "[a-zA-Z]{0,8}",
    ) {
        let resolver = StrategyResolver::new(vec![]);
        let resolved = resolver.resolve(&code, &index, &source);
        prop_assert_eq!(resolved.name, "default");
    }
}
