//! Platform API error types.
//!
//! Errors are classified so callers can decide how to degrade:
//!
//! - **Transient** errors (5xx, rate limits, network failures) leave the cached
//!   state in place; the next event or periodic refresh will try again.
//! - **NotFound** (HTTP 404) means the addressed resource is gone. For channels
//!   this triggers settings self-healing.
//! - **Permanent** errors (other 4xx, undecodable bodies) need an operator.
//!
//! Nothing in the engine retries inline.

use std::fmt;
use thiserror::Error;

/// The kind of platform API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformErrorKind {
    Transient,
    NotFound,
    Permanent,
}

impl PlatformErrorKind {
    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => PlatformErrorKind::NotFound,
            429 => PlatformErrorKind::Transient,
            code if (500..600).contains(&code) => PlatformErrorKind::Transient,
            _ => PlatformErrorKind::Permanent,
        }
    }
}

/// A platform API error with its classification.
#[derive(Debug, Error)]
pub struct PlatformApiError {
    pub kind: PlatformErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    pub message: String,

    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for PlatformApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "platform API error (HTTP {}): {}", code, self.message),
            None => write!(f, "platform API error: {}", self.message),
        }
    }
}

impl PlatformApiError {
    /// Creates an error from a non-success HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::from_status(status),
            status_code: Some(status),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transient error without an HTTP source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::Transient,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without an HTTP source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: PlatformErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Categorizes a transport-level reqwest error.
    ///
    /// Connection failures and timeouts are transient. Decoding failures mean
    /// the platform sent something we do not understand, which retrying will
    /// not fix.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = match status_code {
            Some(code) => PlatformErrorKind::from_status(code),
            None if err.is_decode() || err.is_builder() => PlatformErrorKind::Permanent,
            None => PlatformErrorKind::Transient,
        };

        Self {
            kind,
            status_code,
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == PlatformErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == PlatformErrorKind::NotFound
    }
}

impl From<reqwest::Error> for PlatformApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(err)
    }
}
