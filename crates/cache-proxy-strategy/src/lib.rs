//! Rule-based cache strategy resolution.
//!
//! A [`Rule`] picks the caching behavior (`NoCache`/`Passive`/`Active`)
//! for a given `(code, index, source_id)` triple. Rules are parsed from
//! configuration (see [`RuleConfig::compile`]) and resolved by
//! [`StrategyResolver`], which keeps the active rule list behind an
//! atomic pointer swap so concurrent readers never block.

pub mod resolver;
pub mod rule;

pub use resolver::StrategyResolver;
pub use rule::{Pattern, Rule, RuleConfig, RuleParseError, Strategy};
