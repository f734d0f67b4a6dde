//! Dynamic rule configuration (§4.2, §6): the `ConfigSource` trait
//! boundary between the strategy resolver and wherever rules actually
//! live (a config file, a remote config service, ...).

use cache_proxy_strategy::{Rule, RuleConfig, RuleParseError};

/// A point-in-time view of the configured rule set, as read from a
/// [`ConfigSource`].
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub rules: Vec<RuleConfig>,
}

/// Supplies the rule set the [`StrategyResolver`](cache_proxy_strategy::StrategyResolver)
/// publishes. The concrete transport — a file watcher, a remote config
/// service poll loop — lives outside this crate; only the snapshot shape
/// and the ability to be notified of a change are part of the contract.
pub trait ConfigSource: Send + Sync {
    /// Reads the current rule set. Called once at startup and again
    /// every time [`ConfigSource::changed`] resolves.
    fn snapshot(&self) -> ConfigSnapshot;

    /// Resolves when the underlying source believes its rules have
    /// changed. A source with no change notification (e.g. a static
    /// in-memory list) can return a future that never resolves.
    fn changed(&self) -> futures::future::BoxFuture<'static, ()>;
}

/// A [`ConfigSource`] that never changes, for tests and for embedding a
/// fixed rule set directly in process.
pub struct StaticConfigSource {
    snapshot: ConfigSnapshot,
}

impl StaticConfigSource {
    pub fn new(rules: Vec<RuleConfig>) -> Self {
        Self {
            snapshot: ConfigSnapshot { rules },
        }
    }
}

impl ConfigSource for StaticConfigSource {
    fn snapshot(&self) -> ConfigSnapshot {
        self.snapshot.clone()
    }

    fn changed(&self) -> futures::future::BoxFuture<'static, ()> {
        Box::pin(futures::future::pending())
    }
}

/// Compiles every rule in `snapshot`, returning the compiled rules plus
/// the parse errors of any rule that was rejected. A malformed rule
/// never prevents the rest of the snapshot from publishing — callers
/// are expected to log/emit the errors and keep serving the rules that
/// did compile.
pub fn compile_snapshot(snapshot: &ConfigSnapshot) -> (Vec<Rule>, Vec<RuleParseError>) {
    let mut rules = Vec::with_capacity(snapshot.rules.len());
    let mut errors = Vec::new();
    for raw in &snapshot.rules {
        match raw.compile() {
            Ok(rule) => rules.push(rule),
            Err(err) => errors.push(err),
        }
    }
    (rules, errors)
}
