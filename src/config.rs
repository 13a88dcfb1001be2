//! Session configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! progress_slots = 7
//! rng_seed = 42
//! ```

use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default number of progress flags (rows, columns, diagonals, full card).
pub const DEFAULT_PROGRESS_SLOTS: usize = 7;

/// Upper bound accepted for `progress_slots`.
pub const MAX_PROGRESS_SLOTS: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Size of every player's progress flag set.
    pub progress_slots: usize,

    /// Seed for draws and board generation. `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            progress_slots: DEFAULT_PROGRESS_SLOTS,
            rng_seed: None,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_slots == 0 || self.progress_slots > MAX_PROGRESS_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "progress_slots must be between 1 and {}, got {}",
                MAX_PROGRESS_SLOTS, self.progress_slots
            )));
        }
        Ok(())
    }

    /// Build the session RNG.
    pub fn rng(&self) -> StdRng {
        match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}
