//! TOML-based settings for the semantic layer.
//!
//! Supports a settings file (semlayer.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [cache]
//! enabled = true
//! max_size = 1000
//! default_ttl_seconds = 3600
//!
//! [engine]
//! db_path = "${SEMLAYER_DATA_DIR:./data}/warehouse.db"
//!
//! [model]
//! temporal_path = "config/temporal_dimensions.toml"
//!
//! [query]
//! strict_filters = false
//! max_derived_depth = 4
//! ```
//!
//! Environment overrides applied after the file is read:
//! - `SEMLAYER_DB_PATH`: database path, wins over the file and the model document
//! - `SEMLAYER_CACHE_TTL`: default cache TTL in seconds
//! - `SEMLAYER_CACHE_MAX_SIZE`: cache capacity
//! - `SEMLAYER_TEMPORAL_PATH`: temporal dimensions document merged into the model

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "SEMLAYER_CONFIG";
pub const ENV_DB_PATH: &str = "SEMLAYER_DB_PATH";
pub const ENV_CACHE_TTL: &str = "SEMLAYER_CACHE_TTL";
pub const ENV_CACHE_MAX_SIZE: &str = "SEMLAYER_CACHE_MAX_SIZE";
pub const ENV_TEMPORAL_PATH: &str = "SEMLAYER_TEMPORAL_PATH";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

/// Root settings structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Query cache settings.
    pub cache: CacheSettings,

    /// Execution engine settings.
    pub engine: EngineSettings,

    /// Extra model documents.
    pub model: ModelSettings,

    /// Compiler behaviour.
    pub query: QuerySettings,
}

/// Query cache settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false the cache accepts no entries and every lookup misses.
    pub enabled: bool,

    /// Maximum number of entries before LRU eviction.
    pub max_size: usize,

    /// TTL applied when a write does not specify one.
    pub default_ttl_seconds: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            default_ttl_seconds: 3600,
        }
    }
}

/// Execution engine settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Overrides the connection path from the model document.
    pub db_path: Option<String>,
}

/// Extra model documents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Standalone `temporal_dimensions` document, merged after the model
    /// document. Names the model already defines keep that definition.
    pub temporal_path: Option<String>,
}

/// Compiler behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuerySettings {
    /// Fail on filters that cannot be applied instead of skipping them.
    pub strict_filters: bool,

    /// Maximum nesting of derived metrics referencing derived metrics.
    pub max_derived_depth: usize,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            strict_filters: false,
            max_derived_depth: 4,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, expanding `${VAR}` placeholders first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let expanded = expand_env_document(content);
        let settings: Settings = toml::from_str(&expanded)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations, then apply
    /// environment overrides.
    ///
    /// Searches in order:
    /// 1. Environment variable `SEMLAYER_CONFIG`
    /// 2. `./semlayer.toml`
    /// 3. `<user config dir>/semlayer/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_file()?;
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn load_file() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(ENV_CONFIG) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("semlayer.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("semlayer").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Apply `SEMLAYER_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), SettingsError> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            self.engine.db_path = Some(path);
        }
        if let Some(path) = lookup(ENV_TEMPORAL_PATH).filter(|p| !p.trim().is_empty()) {
            self.model.temporal_path = Some(path);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.cache.default_ttl_seconds = parse_number(ENV_CACHE_TTL, &ttl)?;
        }
        if let Some(size) = lookup(ENV_CACHE_MAX_SIZE) {
            self.cache.max_size = parse_number(ENV_CACHE_MAX_SIZE, &size)?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SettingsError> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Expand environment placeholders across a whole document.
///
/// Lines whose first non-blank character is `#` are copied untouched.
pub fn expand_env_document(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for (i, line) in content.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        if line.trim_start().starts_with('#') {
            out.push_str(line);
        } else {
            out.push_str(&expand_env_vars(line));
        }
    }
    out
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `${VAR:default}`. An unset variable without a
/// default is left verbatim and logged.
pub fn expand_env_vars(s: &str) -> String {
    expand_with(s, |name| env::var(name).ok())
}

fn expand_with<F>(s: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' || chars.peek() != Some(&'{') {
            result.push(c);
            continue;
        }
        chars.next(); // consume '{'

        let mut body = String::new();
        let mut closed = false;
        for ch in chars.by_ref() {
            if ch == '}' {
                closed = true;
                break;
            }
            body.push(ch);
        }

        if !closed {
            // Unterminated placeholder, keep it as written
            result.push_str("${");
            result.push_str(&body);
            continue;
        }

        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body.as_str(), None),
        };

        match (lookup(name), default) {
            (Some(value), _) => result.push_str(&value),
            (None, Some(default)) => result.push_str(default),
            (None, None) => {
                tracing::warn!(variable = name, "environment variable not set, leaving placeholder");
                result.push_str("${");
                result.push_str(&body);
                result.push('}');
            }
        }
    }

    result
}
