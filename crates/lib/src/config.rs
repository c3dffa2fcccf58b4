//! Per-collection limits.
//!
//! A [`Config`] is fixed when a top-level collection is created and is shared
//! by everything embedded into it. Missing fields fall back to the defaults
//! in [`constants`](crate::constants), so a partial document is enough:
//!
//! ```rust
//! # use proptree::Config;
//! let config = Config::from_json(r#"{ "max_data": 1024 }"#)?;
//! assert_eq!(config.max_data, 1024);
//! assert_eq!(config.stack_depth_block, 15);
//! # Ok::<(), proptree::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    collection::CollectionError,
    constants::{MAX_DATA, STACK_DEPTH_BLOCK},
};

/// Limits applied to a collection and its embedded sub-collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest payload in bytes accepted by add, insert, update and modify
    pub max_data: usize,
    /// Growth step of an iterator's ancestor stack
    pub stack_depth_block: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_data: MAX_DATA,
            stack_depth_block: STACK_DEPTH_BLOCK,
        }
    }
}

impl Config {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects zero limits.
    pub fn validate(&self) -> Result<()> {
        if self.max_data == 0 {
            return Err(CollectionError::invalid_argument("max_data must be positive").into());
        }
        if self.stack_depth_block == 0 {
            return Err(
                CollectionError::invalid_argument("stack_depth_block must be positive").into(),
            );
        }
        Ok(())
    }
}
