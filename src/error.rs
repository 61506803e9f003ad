use std::fmt;

use crate::store::ModulePath;

/// The registry a failed lookup was made against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Getter,
    Mutation,
    Action,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HandlerKind::Getter => "getter",
            HandlerKind::Mutation => "mutation",
            HandlerKind::Action => "action",
        })
    }
}

/// Errors from store construction, registration and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A commit, dispatch or getter read named something nobody registered.
    #[error("unknown {kind}: {name}")]
    Lookup { kind: HandlerKind, name: String },

    /// A module tree does not fit onto the state tree.
    #[error("malformed module at {path}: {reason}")]
    Structural { path: ModulePath, reason: String },

    /// A component asked for a store but neither it nor any ancestor has one.
    #[error("no store bound to this component or any ancestor")]
    MissingStore,

    /// Store configuration could not be parsed.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub(crate) fn lookup(kind: HandlerKind, name: impl Into<String>) -> Self {
        StoreError::Lookup {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn structural(path: &ModulePath, reason: impl Into<String>) -> Self {
        StoreError::Structural {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// True for unknown mutation/action/getter names.
    pub fn is_lookup(&self) -> bool {
        matches!(self, StoreError::Lookup { .. })
    }

    /// True for registration-time shape errors.
    pub fn is_structural(&self) -> bool {
        matches!(self, StoreError::Structural { .. })
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::Config(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
