//! Configuration System
//!
//! Layered configuration for applications built on this crate: compiled-in
//! defaults, an optional persisted document and environment overrides, merged
//! onto arbitrary serde types. The framework's own [`AppConfig`] goes through
//! the same overlay as the command's configuration.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

mod merge;
mod overlay;
mod sources;

pub use merge::merge_policy::{env_key, env_prefix};
pub use overlay::ConfigOverlay;
pub use sources::persisted_file::{candidate_paths, PersistedDocument, EXTENSIONS};

/// Application identity used for defaults, the environment prefix and the
/// user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identification {
    pub name: String,
    pub version: String,
}

impl Identification {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Prefix for environment overrides, e.g. `PUPPY` for `puppy`.
    pub fn env_prefix(&self) -> String {
        env_prefix(&self.name)
    }

    /// `name/version`, suitable for a User-Agent header.
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Top-level merged configuration handed to every constructor and initializer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Not part of the overlay; restored from the setup config after merging.
    #[serde(skip)]
    pub identification: Identification,

    /// Logging configuration
    #[serde(default)]
    pub log: LoggingConfig,
}

impl AppConfig {
    pub fn new(identification: Identification, log: LoggingConfig) -> Self {
        Self { identification, log }
    }

    pub fn name(&self) -> &str {
        &self.identification.name
    }

    pub fn version(&self) -> &str {
        &self.identification.version
    }
}
