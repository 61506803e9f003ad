//! Store behavior switches.
//!
//! Every switch defaults to the behavior of the classic single-file store
//! this crate models; hosts opt into the stricter or wider variants.
//!
//! ```
//! use larder::config::{DispatchMode, StoreConfig};
//!
//! let config = StoreConfig::from_toml_str("dispatch = \"fan_out\"").unwrap();
//! assert_eq!(config.dispatch, DispatchMode::FanOut);
//! ```

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};

/// What happens when two modules declare a getter with the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetterCollision {
    /// The later registration wins; a warning is logged.
    #[default]
    Overwrite,
    /// Registration fails with a structural error.
    Reject,
}

/// What happens to a module mutation or action whose name has no entry yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Only names already declared by the root or an earlier module fan out.
    #[default]
    Drop,
    /// Every declaration gets an entry, creating one if needed.
    Register,
}

/// Which actions `dispatch` runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Only the action the root module declared.
    #[default]
    RootOnly,
    /// Every registered action of that name, root first.
    FanOut,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub getter_collision: GetterCollision,
    pub orphan_handlers: OrphanPolicy,
    pub dispatch: DispatchMode,
}

impl StoreConfig {
    /// Parse a config from TOML; missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn with_getter_collision(mut self, policy: GetterCollision) -> Self {
        self.getter_collision = policy;
        self
    }

    pub fn with_orphan_handlers(mut self, policy: OrphanPolicy) -> Self {
        self.orphan_handlers = policy;
        self
    }

    pub fn with_dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }
}
