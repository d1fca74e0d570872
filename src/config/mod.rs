//! Configuration module.
//!
//! Handles connection descriptors, the settings file and environment overrides.

pub mod connection;
pub mod settings;

pub use connection::{ConnectionDescriptor, ConnectionError, ConnectionKind};
pub use settings::{
    expand_env_document, expand_env_vars, CacheSettings, EngineSettings, ModelSettings,
    QuerySettings, Settings, SettingsError,
};
