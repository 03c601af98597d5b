//! Error types shared by every layer of the client
//!
//! Errors fall into three groups that propagate differently:
//! - transport failures (connect, timeout, unexpected HTTP status) pass through unchanged
//! - service failures (an `<Error>` in the response body) are always classified
//!   into a [`ServiceError`] before they reach the caller
//! - client-side validation failures (unknown locale, bad batch) are raised
//!   before any request is sent

pub mod taxonomy;

pub use taxonomy::{classify, ServiceError};

use crate::api::operation::CompositionError;
use hyper::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unknown locale: {0}")]
    UnknownLocale(String),

    #[error("Invalid batch operation: {0}")]
    Composition(#[from] CompositionError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {status} - {message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<hyper_util::client::legacy::Error> for ApiError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        ApiError::Transport(format!("Client error: {}", err))
    }
}

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::InvalidResponse(format!("Request build error: {}", err))
    }
}

impl ApiError {
    /// The classified service error, if this is one
    pub fn service(&self) -> Option<&ServiceError> {
        match self {
            ApiError::Service(err) => Some(err),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    ///
    /// Used by [`crate::api::retry::Retry`]; the client itself never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout(_) => true,
            ApiError::Service(err) => err.is_retryable(),
            _ => false,
        }
    }
}
