use std::path::PathBuf;
use thiserror::Error;

/// Registration errors of the [`UrlDispatcher`](crate::router::UrlDispatcher).
///
/// A failed registration leaves the dispatcher unchanged.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("invalid resource name {name:?}: every part separated by '.', ':' or '-' must be an identifier")]
    InvalidName { name: String },

    #[error("duplicate resource name {name:?}")]
    DuplicateName { name: String },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("bad pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{method:?} is not allowed for routes")]
    InvalidMethod { method: String },

    #[error("route for {method} will never be reached, the resource already handles it")]
    UnreachableRoute { method: String },

    #[error("no directory exists at {path:?}")]
    InvalidDirectory { path: PathBuf },

    #[error("missing value for path variable {name:?}")]
    MissingVariable { name: String },

    #[error("cannot encode query: {source}")]
    InvalidQuery {
        #[from]
        source: serde_urlencoded::ser::Error,
    },
}

impl RouterError {
    pub fn invalid_path<P: ToString, S: ToString>(path: P, reason: S) -> Self {
        Self::InvalidPath { path: path.to_string(), reason: reason.to_string() }
    }

    pub fn missing_variable<S: ToString>(name: S) -> Self {
        Self::MissingVariable { name: name.to_string() }
    }
}
