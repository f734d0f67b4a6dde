//! The `StrategyResolver`: pure pattern-match lookup over an atomically
//! swappable rule list (§4.2).

use crate::rule::Rule;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Resolves a `(code, index, source)` triple to exactly one [`Rule`].
///
/// Readers call [`StrategyResolver::resolve`] on the hot path and never
/// block; a config update publishes an entirely new `Vec<Rule>` via
/// [`StrategyResolver::publish`], which readers pick up on their next
/// `load()` with no torn reads.
pub struct StrategyResolver {
    rules: ArcSwap<Vec<Rule>>,
}

impl StrategyResolver {
    /// Creates a resolver seeded with `rules` plus the built-in default
    /// rule, which always exists regardless of what is passed in.
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.push(Rule::default_rule());
        Self {
            rules: ArcSwap::from_pointee(rules),
        }
    }

    /// Atomically replaces the rule list. The built-in default rule is
    /// re-appended so callers never need to carry it themselves.
    pub fn publish(&self, mut rules: Vec<Rule>) {
        rules.push(Rule::default_rule());
        self.rules.store(Arc::new(rules));
    }

    /// Resolves the rule for `(first_code, first_index, source_id)`.
    ///
    /// Scans the current rule-list snapshot, keeps matches (all three
    /// patterns match), and returns the lowest-`priority` match, ties
    /// broken by list order. Falls back to the default rule when no
    /// configured rule matches — which is always present, so this never
    /// fails.
    pub fn resolve(&self, first_code: &str, first_index: &str, source_id: &str) -> Arc<Rule> {
        let snapshot = self.rules.load();
        let best = snapshot
            .iter()
            .filter(|rule| rule.pattern.matches(first_code, first_index, source_id))
            .min_by_key(|rule| rule.priority)
            .expect("the default rule always matches and is always present");

        // Re-wrap in an Arc sharing the snapshot's allocation lifetime would
        // require leaking the Guard; cheaper to clone the matched Rule once
        // per resolution than to hold the ArcSwap guard across the call.
        Arc::new(best.clone())
    }
}
