//! Component runtime errors.

use thiserror::Error;

use super::cache::ResourceKind;
use super::selector::SelectorError;
use crate::bridge::fetch::FetchError;

/// Errors that can occur while initializing or operating a component
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    #[error("Failed to load {kind} for <{tag}>: {source}")]
    ResourceLoad {
        tag: &'static str,
        kind: ResourceKind,
        #[source]
        source: FetchError,
    },

    #[error("<{tag}> declares no {kind} path")]
    MissingResourcePath { tag: &'static str, kind: ResourceKind },

    #[error("Invalid resource URL for <{tag}> ({path}): {message}")]
    InvalidUrl {
        tag: &'static str,
        path: String,
        message: String,
    },

    #[error("<{tag}> template has no element matching '{selector}'")]
    MissingElement { tag: &'static str, selector: &'static str },

    #[error("Invalid selector: {0}")]
    Selector(#[from] SelectorError),

    #[error("<{tag}> was detached before initialization finished")]
    Detached { tag: &'static str },

    #[error("<{tag}> is still running a previous setup")]
    SetupInFlight { tag: &'static str },

    #[error("Setup of <{tag}> failed: {message}")]
    Setup { tag: &'static str, message: String },
}

/// Result type for component operations
pub type ComponentResult<T> = Result<T, ComponentError>;

impl ComponentError {
    /// Whether a later attempt (another instance, or a re-attach) may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResourceLoad { .. } | Self::Detached { .. } | Self::SetupInFlight { .. }
        )
    }
}
