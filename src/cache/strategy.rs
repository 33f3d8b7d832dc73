//! Cache Strategy Module
//!
//! Named caching policies keyed by pattern, so callers need not repeat TTL,
//! tags, or compression settings on every `set`. The registry matches the
//! first registered pattern (a literal or a `*`-wildcard) against the key;
//! when none matches, engine defaults apply.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

// == TTL Rule ==
/// TTL for a strategy: a fixed number of seconds, or a function of the
/// value being cached.
#[derive(Clone)]
pub enum TtlRule {
    /// Fixed TTL in seconds
    Fixed(u64),
    /// TTL computed from the serialized value
    PerValue(Arc<dyn Fn(&Value) -> u64 + Send + Sync>),
}

impl TtlRule {
    /// Resolves the rule against a value.
    pub fn resolve(&self, value: &Value) -> u64 {
        match self {
            TtlRule::Fixed(secs) => *secs,
            TtlRule::PerValue(f) => f(value),
        }
    }
}

impl fmt::Debug for TtlRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtlRule::Fixed(secs) => write!(f, "Fixed({})", secs),
            TtlRule::PerValue(_) => write!(f, "PerValue(..)"),
        }
    }
}

// == Cache Strategy ==
/// A reusable caching policy: TTL rule, tags, cacheability condition,
/// compression flag, and the keys this strategy's entries depend on.
#[derive(Clone, Default)]
pub struct CacheStrategy {
    /// TTL rule; None falls through to the engine default
    pub ttl: Option<TtlRule>,
    /// Tags applied to every entry stored under this strategy
    pub tags: Vec<String>,
    /// Predicate deciding whether a key/value pair is cacheable at all
    pub condition: Option<Arc<dyn Fn(&str, &Value) -> bool + Send + Sync>>,
    /// Whether payloads should be LZ4-compressed
    pub compress: bool,
    /// Keys whose change invalidates entries stored under this strategy
    pub dependencies: Vec<String>,
}

impl CacheStrategy {
    // == Constructor ==
    /// Creates an empty strategy (engine defaults for everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed TTL in seconds.
    pub fn with_ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(TtlRule::Fixed(seconds));
        self
    }

    /// Sets a TTL computed from the value being cached.
    pub fn with_ttl_fn(mut self, f: impl Fn(&Value) -> u64 + Send + Sync + 'static) -> Self {
        self.ttl = Some(TtlRule::PerValue(Arc::new(f)));
        self
    }

    /// Sets the tags applied to entries stored under this strategy.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the cacheability condition.
    pub fn with_condition(
        mut self,
        f: impl Fn(&str, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.condition = Some(Arc::new(f));
        self
    }

    /// Enables LZ4 payload compression for this strategy.
    pub fn with_compression(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Sets the keys whose change invalidates entries stored under this
    /// strategy.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    // == Allows ==
    /// Returns whether the key/value pair is cacheable under this strategy.
    pub fn allows(&self, key: &str, value: &Value) -> bool {
        match &self.condition {
            Some(condition) => condition(key, value),
            None => true,
        }
    }

    // == Resolve TTL ==
    /// Resolves the strategy TTL for a value, or None if the strategy does
    /// not specify one.
    pub fn resolve_ttl(&self, value: &Value) -> Option<u64> {
        self.ttl.as_ref().map(|rule| rule.resolve(value))
    }
}

impl fmt::Debug for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStrategy")
            .field("ttl", &self.ttl)
            .field("tags", &self.tags)
            .field("condition", &self.condition.is_some())
            .field("compress", &self.compress)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

// == Strategy Registry ==
/// Ordered pattern → strategy mapping consulted on every `set`.
#[derive(Debug, Default)]
pub struct StrategyRegistry {
    /// Registration-ordered (pattern, strategy) pairs; first match wins
    strategies: Vec<(String, CacheStrategy)>,
}

impl StrategyRegistry {
    // == Constructor ==
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Register ==
    /// Associates a key pattern with a strategy.
    ///
    /// Patterns are literals or `*`-wildcards (`"session:*"`). Lookup order
    /// is registration order.
    pub fn register(&mut self, pattern: impl Into<String>, strategy: CacheStrategy) {
        self.strategies.push((pattern.into(), strategy));
    }

    // == Resolve ==
    /// Returns the first strategy whose pattern matches the key.
    pub fn resolve(&self, key: &str) -> Option<&CacheStrategy> {
        self.strategies
            .iter()
            .find(|(pattern, _)| pattern_matches(pattern, key))
            .map(|(_, strategy)| strategy)
    }

    // == Get ==
    /// Returns the strategy registered under an exact pattern, if any.
    pub fn get(&self, pattern: &str) -> Option<&CacheStrategy> {
        self.strategies
            .iter()
            .find(|(p, _)| p == pattern)
            .map(|(_, strategy)| strategy)
    }

    // == Length ==
    /// Returns the number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategies are registered.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

// == Pattern Matching ==
/// Matches a key against a literal or `*`-wildcard pattern.
///
/// Each `*` matches any run of characters, including the empty run.
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == key;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let last = parts.len() - 1;
    let mut remainder = key;

    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match remainder.strip_prefix(part) {
                Some(rest) => remainder = rest,
                None => return false,
            }
        } else if i == last {
            return part.is_empty() || remainder.ends_with(part);
        } else if !part.is_empty() {
            match remainder.find(part) {
                Some(idx) => remainder = &remainder[idx + part.len()..],
                None => return false,
            }
        }
    }

    // Unreachable: a pattern containing '*' always has at least two parts,
    // so the loop returns from the i == last branch.
    false
}
