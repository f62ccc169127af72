use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::node::NodeEncoding;

/// The length of a SHA-1 digest, the content identifier of a default store.
pub const DEFAULT_HASH_LEN: usize = 20;

/// The store-wide format of manifest records. Every manifest parsed or built with the same
/// store must use the same config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of bytes in a binary content identifier.
    pub hash_len: usize,
    /// How content identifiers are written in a record.
    pub node_encoding: NodeEncoding,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hash_len: DEFAULT_HASH_LEN,
            node_encoding: NodeEncoding::Hex,
        }
    }
}

impl Config {
    /// Returns the number of bytes a node takes in a record. For a config that fails
    /// [`Config::validate`] this saturates, and no record can then be parsed or built.
    #[inline]
    pub const fn node_width(&self) -> usize {
        self.node_encoding.stored_len(self.hash_len)
    }

    /// Check that the hash length is usable. A zero length is rejected, and so is one whose
    /// stored width overflows.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let width = self.node_encoding.checked_stored_len(self.hash_len);
        if self.hash_len == 0 || width.is_none() {
            return Err(ConfigError::InvalidHashLength);
        }
        Ok(())
    }

    /// Parse and validate a config from its TOML representation. Missing keys take their
    /// default value.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file from the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}
