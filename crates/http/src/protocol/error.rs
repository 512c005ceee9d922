use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("lookup error: {source}")]
    LookupError {
        #[from]
        source: MultiMapError,
    },
}

/// Failures of the strict lookups on [`crate::multimap::MultiMap`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiMapError {
    #[error("key not found: {key:?}")]
    KeyNotFound { key: String },

    #[error("multiple values ({count}) match key {key:?}")]
    MultipleValues { key: String, count: usize },
}

impl MultiMapError {
    pub fn key_not_found<S: ToString>(key: S) -> Self {
        Self::KeyNotFound { key: key.to_string() }
    }

    pub fn multiple_values<S: ToString>(key: S, count: usize) -> Self {
        Self::MultipleValues { key: key.to_string(), count }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method: {reason}")]
    InvalidMethod { reason: String },

    #[error("invalid request target: {reason}")]
    InvalidUri { reason: String },

    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },
}

impl ParseError {
    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_method<S: ToString>(str: S) -> Self {
        Self::InvalidMethod { reason: str.to_string() }
    }

    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }

    pub fn invalid_query<S: ToString>(str: S) -> Self {
        Self::InvalidQuery { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid response head: {reason}")]
    InvalidHead { reason: String },

    #[error("invalid writer state: {reason}")]
    InvalidState { reason: String },

    #[error("connection closed before a transport was attached")]
    ConnectionClosed,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_head<S: ToString>(str: S) -> Self {
        Self::InvalidHead { reason: str.to_string() }
    }

    pub fn invalid_state<S: ToString>(str: S) -> Self {
        Self::InvalidState { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
