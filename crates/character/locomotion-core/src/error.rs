//! Error types for loading, configuration and the character state machine.

use thiserror::Error;

use crate::fsm::StateKind;

/// Failure to fetch or decode a single asset. Reported per asset; never aborts a load plan.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("asset not found: {path}")]
    NotFound { path: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid asset {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Errors raised by [`CharacterFsm`](crate::fsm::CharacterFsm) transitions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FsmError {
    #[error("unknown state '{0}'")]
    UnknownState(String),

    #[error("state {state:?} has no factory registered")]
    Unregistered { state: StateKind },

    /// The animation backing a state never finished loading.
    #[error("state '{state}' requires animation '{animation}', which is not loaded")]
    MissingAnimation {
        state: &'static str,
        animation: String,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fsm(#[from] FsmError),

    #[error("asset loading thread could not be started: {0}")]
    Spawn(#[source] std::io::Error),

    /// The initial state has not been entered yet; assets are still loading or missing.
    #[error("controller is not ready: initial state not entered")]
    NotReady,
}
