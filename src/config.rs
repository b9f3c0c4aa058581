//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `RQL_*` environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::schema::UnknownFilterPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub parser: ParserConfig,

    #[serde(default)]
    pub compiler: CompilerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Eviction policy of the query plan cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Evict the least recently used plan
    #[default]
    Lru,
    /// Evict the least frequently used plan
    Lfu,
}

impl std::str::FromStr for CachePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(CachePolicy::Lru),
            "lfu" => Ok(CachePolicy::Lfu),
            other => Err(format!("unknown cache policy: {}", other)),
        }
    }
}

/// Query plan cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub policy: CachePolicy,

    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    1000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            policy: CachePolicy::default(),
            capacity: default_cache_capacity(),
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ParserConfig {
    /// Parsed AST cache size, 0 disables it
    #[serde(default = "default_parser_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_parser_cache_capacity() -> usize {
    crate::query::CachedParser::DEFAULT_CAPACITY
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_parser_cache_capacity(),
        }
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompilerConfig {
    /// Overrides the unknown filter policy of loaded schema definitions
    #[serde(default)]
    pub unknown_filters: Option<UnknownFilterPolicy>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rql").join("config.toml")),
            Some(PathBuf::from("/etc/rql/config.toml")),
            Some(PathBuf::from("./rql.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!(path = ?path, "Loaded config");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = ?path, error = %e, "Failed to load config");
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Cache overrides
        if let Some(enabled) = var("RQL_CACHE_ENABLED").and_then(|v| v.parse().ok()) {
            self.cache.enabled = enabled;
        }
        if let Some(policy) = var("RQL_CACHE_POLICY").and_then(|v| v.parse().ok()) {
            self.cache.policy = policy;
        }
        if let Some(capacity) = var("RQL_CACHE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.cache.capacity = capacity;
        }

        // Parser overrides
        if let Some(capacity) = var("RQL_PARSER_CACHE_CAPACITY").and_then(|v| v.parse().ok()) {
            self.parser.cache_capacity = capacity;
        }

        // Compiler overrides
        match var("RQL_UNKNOWN_FILTERS").as_deref() {
            Some("ignore") => self.compiler.unknown_filters = Some(UnknownFilterPolicy::Ignore),
            Some("reject") => self.compiler.unknown_filters = Some(UnknownFilterPolicy::Reject),
            _ => {}
        }

        // Logging overrides
        if let Some(level) = var("RQL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("RQL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# RQL Compiler Configuration
#
# Environment variables override these settings:
# - RQL_CACHE_ENABLED
# - RQL_CACHE_POLICY
# - RQL_CACHE_CAPACITY
# - RQL_PARSER_CACHE_CAPACITY
# - RQL_UNKNOWN_FILTERS
# - RQL_LOG_LEVEL
# - RQL_LOG_FORMAT

[cache]
# Cache compiled query plans for read-only requests
enabled = true

# Eviction policy: lru (recency) or lfu (frequency)
policy = "lru"

# Maximum number of cached plans per schema
capacity = 1000

[parser]
# Number of parsed queries to keep (0 disables the AST cache)
cache_capacity = 1000

[compiler]
# Override how schemas treat unknown filter names: ignore or reject
# unknown_filters = "reject"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
