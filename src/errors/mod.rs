//! Centralized error handling for the EPG grabber
//!
//! Errors are split by how far they are allowed to travel:
//!
//! - **Fetch errors** are classified as transient or fatal by the retrying
//!   fetcher. Transient ones are retried and finally replaced by a default
//!   value, fatal ones abort the run.
//! - **Image errors** never leave the poster processor; a failed poster keeps
//!   its remote location.
//! - **Mapping warnings** are collected by the guide builder and only logged.
//! - **Application errors** are what the runner and `main` see.
//!
//! # Usage
//!
//! ```rust
//! use epg_grabber::errors::{AppError, AppResult};
//!
//! fn check_parallel(parallel: usize) -> AppResult<usize> {
//!     if parallel == 0 {
//!         return Err(AppError::configuration("parallel must be positive"));
//!     }
//!     Ok(parallel)
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for fetch attempts
pub type FetchResult<T> = Result<T, FetchError>;
