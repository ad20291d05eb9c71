//! # World Configuration
//!
//! Loaded once at startup, either built in code or read from a TOML file:
//!
//! ```toml
//! development = true
//! initial_capacity = 4096
//! growth_chunk = 1024
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// Entity rows preallocated in the flag buffer by default.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1024;

/// Rows added to the flag buffer each time it runs out.
pub const DEFAULT_GROWTH_CHUNK: usize = 1024;

/// Configuration threaded into a [`World`](crate::World) at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Enables development checks: undeclared query-row access and adding
    /// components to dead entities panic. Without it undeclared access is
    /// permitted and adds to dead entities are handed back as rejected.
    pub development: bool,
    /// Number of entity rows the flag buffer starts with.
    pub initial_capacity: usize,
    /// Number of entity rows added whenever the flag buffer must grow.
    pub growth_chunk: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            development: cfg!(debug_assertions),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth_chunk: DEFAULT_GROWTH_CHUNK,
        }
    }
}

impl WorldConfig {
    /// Development configuration regardless of build profile.
    #[must_use]
    pub fn development() -> Self {
        Self {
            development: true,
            ..Self::default()
        }
    }

    /// Production configuration: no development checks.
    #[must_use]
    pub fn production() -> Self {
        Self {
            development: false,
            ..Self::default()
        }
    }

    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the text is not valid TOML for
    /// this structure or fails validation.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the file cannot be read or its
    /// contents are invalid.
    pub fn from_file(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcsError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `growth_chunk` is zero.
    pub fn validate(&self) -> EcsResult<()> {
        if self.growth_chunk == 0 {
            return Err(EcsError::InvalidConfig(
                "growth_chunk must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
