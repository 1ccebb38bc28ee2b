//! Error type definitions for the EPG grabber
//!
//! This module defines the error hierarchy used by the fetch pipeline, the
//! poster processor and the guide writer.

use std::fmt;

use thiserror::Error;

/// Top-level application error type
///
/// Anything that reaches this type ends the run. Transient fetch failures are
/// resolved to defaults long before they could be converted into it.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (non-positive options, bad base URL, unreadable file)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Fetch errors outside the transient set of their call site
    #[error("Fatal fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Filesystem errors while reading inputs or writing the guide
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input files that do not parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run stopped by Ctrl-C before the guide was written
    #[error("Interrupted")]
    Interrupted,

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Classification of a single failed fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Request did not complete within the attempt timeout
    Timeout,
    /// Connection refused, reset or dropped mid-response
    Connection,
    /// Server answered with a non-success status
    Status(u16),
    /// Response body is not well-formed (bad JSON syntax, truncated body)
    Decode,
    /// Response is well-formed but does not have the expected shape
    Validation,
    /// Loader failed to post-process the payload (e.g. image decoding)
    Processing,
    /// Anything else, e.g. an invalid request
    Other,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connection => write!(f, "connection"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Decode => write!(f, "decode"),
            Self::Validation => write!(f, "validation"),
            Self::Processing => write!(f, "processing"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A failed fetch attempt
#[derive(Error, Debug, Clone)]
#[error("{kind} error for {url}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new<U: Into<String>, M: Into<String>>(kind: FetchErrorKind, url: U, message: M) -> Self {
        Self {
            kind,
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::new(FetchErrorKind::Timeout, url, "request timed out")
    }

    pub fn validation<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::new(FetchErrorKind::Validation, url, message)
    }

    /// Classify a JSON error: syntax problems are decode errors, shape
    /// mismatches are validation errors.
    pub fn from_json<U: Into<String>>(url: U, error: &serde_json::Error) -> Self {
        let kind = if error.is_data() {
            FetchErrorKind::Validation
        } else {
            FetchErrorKind::Decode
        };
        Self::new(kind, url, error.to_string())
    }

    /// Classify a reqwest error into a fetch error kind
    pub fn from_reqwest<U: Into<String>>(url: U, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else if let Some(status) = error.status() {
            FetchErrorKind::Status(status.as_u16())
        } else if error.is_connect() || error.is_request() || error.is_body() {
            FetchErrorKind::Connection
        } else if error.is_decode() {
            FetchErrorKind::Decode
        } else {
            FetchErrorKind::Other
        };
        Self::new(kind, url, error.to_string())
    }
}

/// Poster processing errors
#[derive(Error, Debug)]
pub enum ImageError {
    /// Download failed with a fatal fetch error
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    /// Bucket path would resolve outside the posters directory
    #[error("Refusing poster path outside the posters directory: {path}")]
    UnsafePath { path: String },

    /// Download exhausted its retries
    #[error("Download gave up after retries: {url}")]
    Exhausted { url: String },

    /// Decode or encode failure
    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    /// Writing the poster file failed
    #[error("Image write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Non-fatal problems found while mapping records into the guide document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingWarning {
    /// Rating code does not belong to any known rating system
    UnknownRatingSystem { rating: String },
    /// Icon key missing from its manifest
    MissingIcon { manifest: String, key: String },
}

impl fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownRatingSystem { rating } => {
                write!(f, "No rating system detected for rating \"{rating}\"")
            }
            Self::MissingIcon { manifest, key } => {
                write!(f, "Failed to get icon \"{key}\" from manifest \"{manifest}\"")
            }
        }
    }
}
