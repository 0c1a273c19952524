//! Index configuration.
//!
//! Every namespace runs with an [`IndexConfig`]. The service keeps a global
//! default and optional per-namespace [`ConfigOverride`]s; the effective
//! configuration of a namespace is the global one with the override's set
//! fields applied on top.

use std::collections::HashMap;
use std::time::Duration;

/// Environment variable overriding [`IndexConfig::retry_count`].
pub const ENV_RETRY_COUNT: &str = "DOCINDEX_RETRY_COUNT";
/// Environment variable overriding [`IndexConfig::retry_wait_ms`].
pub const ENV_RETRY_WAIT_MS: &str = "DOCINDEX_RETRY_WAIT_MS";
/// Environment variable overriding [`IndexConfig::default_limit`].
pub const ENV_DEFAULT_LIMIT: &str = "DOCINDEX_DEFAULT_LIMIT";
/// Environment variable overriding [`IndexConfig::max_limit`].
pub const ENV_MAX_LIMIT: &str = "DOCINDEX_MAX_LIMIT";

const DEFAULT_RETRY_COUNT: u32 = 5;
const DEFAULT_RETRY_WAIT_MS: u64 = 50;
const DEFAULT_LIMIT: usize = 100;
const DEFAULT_MAX_LIMIT: usize = 1000;

/// Configuration for index maintenance and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Retries allowed after the first attempt of a transactional operation.
    pub retry_count: u32,

    /// Base wait before a retry, in milliseconds.
    pub retry_wait_ms: u64,

    /// Page size used when a request names no limit.
    pub default_limit: usize,

    /// Largest page size a request may ask for.
    pub max_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_wait_ms: DEFAULT_RETRY_WAIT_MS,
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl IndexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from defaults overridden by `DOCINDEX_*`
    /// environment variables. Unparseable values are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_RETRY_COUNT).and_then(|raw| raw.parse().ok()) {
            config.retry_count = v;
        }
        if let Some(v) = lookup(ENV_RETRY_WAIT_MS).and_then(|raw| raw.parse().ok()) {
            config.retry_wait_ms = v;
        }
        if let Some(v) = lookup(ENV_DEFAULT_LIMIT)
            .and_then(|raw| raw.parse().ok())
            .filter(|v| *v > 0)
        {
            config.default_limit = v;
        }
        if let Some(v) = lookup(ENV_MAX_LIMIT)
            .and_then(|raw| raw.parse().ok())
            .filter(|v| *v > 0)
        {
            config.max_limit = v;
        }
        config
    }

    /// Sets the retry count.
    #[must_use]
    pub const fn retry_count(mut self, value: u32) -> Self {
        self.retry_count = value;
        self
    }

    /// Sets the base retry wait in milliseconds.
    #[must_use]
    pub const fn retry_wait_ms(mut self, value: u64) -> Self {
        self.retry_wait_ms = value;
        self
    }

    /// Sets the default page size.
    #[must_use]
    pub const fn default_limit(mut self, value: usize) -> Self {
        self.default_limit = value;
        self
    }

    /// Sets the maximum page size.
    #[must_use]
    pub const fn max_limit(mut self, value: usize) -> Self {
        self.max_limit = value;
        self
    }

    /// Returns the base retry wait.
    #[must_use]
    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    /// Resolves a requested page size: absent or zero means the default,
    /// anything above the maximum is clamped.
    #[must_use]
    pub fn page_limit(&self, requested: Option<usize>) -> usize {
        let max = self.max_limit.max(1);
        match requested {
            Some(0) | None => self.default_limit.clamp(1, max),
            Some(n) => n.min(max),
        }
    }

    /// Returns this configuration with the override's set fields applied.
    #[must_use]
    pub fn with_override(&self, over: &ConfigOverride) -> Self {
        Self {
            retry_count: over.retry_count.unwrap_or(self.retry_count),
            retry_wait_ms: over.retry_wait_ms.unwrap_or(self.retry_wait_ms),
            default_limit: over.default_limit.unwrap_or(self.default_limit),
            max_limit: over.max_limit.unwrap_or(self.max_limit),
        }
    }
}

/// Per-namespace configuration override. Unset fields inherit the global
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverride {
    /// Overrides [`IndexConfig::retry_count`].
    pub retry_count: Option<u32>,
    /// Overrides [`IndexConfig::retry_wait_ms`].
    pub retry_wait_ms: Option<u64>,
    /// Overrides [`IndexConfig::default_limit`].
    pub default_limit: Option<usize>,
    /// Overrides [`IndexConfig::max_limit`].
    pub max_limit: Option<usize>,
}

/// Service-wide configuration: a global default plus namespace overrides.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Configuration used by namespaces without an override.
    pub global: IndexConfig,
    /// Overrides keyed by namespace name.
    pub namespaces: HashMap<String, ConfigOverride>,
}

impl ServiceConfig {
    /// Creates a service configuration with the given global default.
    #[must_use]
    pub fn new(global: IndexConfig) -> Self {
        Self {
            global,
            namespaces: HashMap::new(),
        }
    }

    /// Adds or replaces the override for a namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>, over: ConfigOverride) -> Self {
        self.namespaces.insert(namespace.into(), over);
        self
    }

    /// Returns the effective configuration of a namespace.
    #[must_use]
    pub fn for_namespace(&self, namespace: &str) -> IndexConfig {
        match self.namespaces.get(namespace) {
            Some(over) => self.global.with_override(over),
            None => self.global.clone(),
        }
    }
}
