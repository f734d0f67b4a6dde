//! The `Rule` policy tuple and its JSON configuration shape (§3, §4.2, §6).

use regex::Regex;
use std::time::Duration;

/// Caching behavior selected by a matched [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Never cache; every request goes straight through to the backend.
    NoCache,
    /// Cache on miss; stale entries may be served but are never refreshed
    /// in the background.
    Passive,
    /// Cache on miss; fresh entries past `refresh_interval` trigger a
    /// background refresh.
    Active,
}

/// The compiled match pattern of a rule. Unset fields default to `.*`
/// (match anything) at parse time — see [`RuleConfig::compile`].
#[derive(Debug, Clone)]
pub struct Pattern {
    pub code_re: Regex,
    pub index_re: Regex,
    pub source_re: Regex,
}

impl Pattern {
    fn matches_all() -> Result<Self, regex::Error> {
        Ok(Pattern {
            code_re: Regex::new(".*")?,
            index_re: Regex::new(".*")?,
            source_re: Regex::new(".*")?,
        })
    }

    pub fn matches(&self, code: &str, index: &str, source: &str) -> bool {
        self.code_re.is_match(code) && self.index_re.is_match(index) && self.source_re.is_match(source)
    }
}

/// A single resolved caching policy (§3).
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub strategy: Strategy,
    pub ttl: Duration,
    pub refresh_interval: Duration,
    pub allow_stale: bool,
    pub priority: i32,
    pub pattern: Pattern,
}

impl Rule {
    /// The rule used when no configured rule matches: `NoCache`, lowest
    /// priority, matches everything. Always present so resolution never
    /// fails (§4.2).
    pub fn default_rule() -> Self {
        Rule {
            name: "default".to_string(),
            strategy: Strategy::NoCache,
            ttl: Duration::ZERO,
            refresh_interval: Duration::ZERO,
            allow_stale: false,
            priority: i32::MAX,
            pattern: Pattern::matches_all().expect("`.*` is always a valid regex"),
        }
    }
}

/// Parse failure for a rule JSON document (§4.2).
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleParseError {
    #[error("rule `{name}`: invalid {field} regex: {source}")]
    InvalidPattern {
        name: String,
        field: &'static str,
        source: regex::Error,
    },
    #[error("rule `{name}`: invalid cache_ttl duration `{value}`: {source}")]
    InvalidTtl {
        name: String,
        value: String,
        source: humantime::DurationError,
    },
    #[error("rule `{name}`: invalid refresh_interval duration `{value}`: {source}")]
    InvalidRefreshInterval {
        name: String,
        value: String,
        source: humantime::DurationError,
    },
    #[error("rule `{name}`: refresh_interval must be less than cache_ttl for an Active strategy")]
    RefreshNotBeforeTtl { name: String },
    #[error("rule `{name}`: unknown strategy `{value}` (expected NoCache, Passive, or Active)")]
    UnknownStrategy { name: String, value: String },
}

/// The raw, as-configured shape of a rule (§6): `pattern.{code,index,source_id}`,
/// `strategy`, `cache_ttl`, `refresh_interval`, `allow_stale_data`, `priority`.
#[derive(Debug, Clone, Default)]
pub struct RuleConfig {
    pub name: String,
    pub code_pattern: Option<String>,
    pub index_pattern: Option<String>,
    pub source_pattern: Option<String>,
    pub strategy: String,
    pub cache_ttl: Option<String>,
    pub refresh_interval: Option<String>,
    pub allow_stale_data: bool,
    pub priority: i32,
}

impl RuleConfig {
    /// Compiles and validates this raw config into a published [`Rule`],
    /// rejecting malformed regex or duration strings before the rule is
    /// ever admitted to the resolver's rule list.
    pub fn compile(&self) -> Result<Rule, RuleParseError> {
        let strategy = match self.strategy.as_str() {
            "NoCache" => Strategy::NoCache,
            "Passive" => Strategy::Passive,
            "Active" => Strategy::Active,
            other => {
                return Err(RuleParseError::UnknownStrategy {
                    name: self.name.clone(),
                    value: other.to_string(),
                })
            }
        };

        let compile_re = |field: &'static str, pattern: &Option<String>| -> Result<Regex, RuleParseError> {
            match pattern {
                Some(p) => Regex::new(p).map_err(|source| RuleParseError::InvalidPattern {
                    name: self.name.clone(),
                    field,
                    source,
                }),
                None => Ok(Regex::new(".*").expect("`.*` is always valid")),
            }
        };

        let pattern = Pattern {
            code_re: compile_re("code", &self.code_pattern)?,
            index_re: compile_re("index", &self.index_pattern)?,
            source_re: compile_re("source", &self.source_pattern)?,
        };

        let ttl = match &self.cache_ttl {
            Some(raw) => humantime::parse_duration(raw).map_err(|source| RuleParseError::InvalidTtl {
                name: self.name.clone(),
                value: raw.clone(),
                source,
            })?,
            None => Duration::ZERO,
        };

        let refresh_interval = match &self.refresh_interval {
            Some(raw) => {
                humantime::parse_duration(raw).map_err(|source| RuleParseError::InvalidRefreshInterval {
                    name: self.name.clone(),
                    value: raw.clone(),
                    source,
                })?
            }
            None => Duration::ZERO,
        };

        if matches!(strategy, Strategy::Active) && refresh_interval >= ttl {
            return Err(RuleParseError::RefreshNotBeforeTtl {
                name: self.name.clone(),
            });
        }

        Ok(Rule {
            name: self.name.clone(),
            strategy,
            ttl,
            refresh_interval,
            allow_stale: self.allow_stale_data,
            priority: self.priority,
            pattern,
        })
    }
}
