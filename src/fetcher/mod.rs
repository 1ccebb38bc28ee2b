//! Cached remote reads with classified retry
//!
//! Every remote read goes through [`RetryingFetcher::fetch`]:
//!
//! 1. a live cache entry for the request URL is returned without touching the
//!    network;
//! 2. otherwise the request is attempted with the policy's initial timeout;
//! 3. on success the caller's loader decodes the body, the decoded value is
//!    cached and returned as [`FetchOutcome::Success`];
//! 4. on a transient failure the timeout grows by the policy increment (up to
//!    its cap) and the request is retried, at most `max_retries` times, after
//!    which the caller's default is returned as [`FetchOutcome::Defaulted`];
//! 5. any other failure is returned immediately as [`FetchOutcome::Fatal`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::cache::CacheStore;
use crate::errors::{AppResult, FetchError, FetchErrorKind, FetchResult};
use crate::models::{Program, ProgramDetails, ShowsCast};

pub mod http;

pub use http::{FetchRequest, HttpSource, ReqwestSource};

/// Timeout escalation and retry budget for one kind of request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub timeout_increment: Duration,
    pub timeout_max: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Policy for small JSON metadata requests
    pub fn metadata() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            timeout_increment: Duration::from_secs(1),
            timeout_max: Duration::from_secs(10),
            max_retries: 10,
        }
    }

    /// Policy for poster downloads
    pub fn images() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            timeout_increment: Duration::from_secs(10),
            timeout_max: Duration::from_secs(120),
            max_retries: 10,
        }
    }

    fn next_timeout(&self, current: Duration) -> Duration {
        (current + self.timeout_increment).min(self.timeout_max)
    }
}

/// Error kinds that a call site agrees to retry and finally default
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientKinds {
    extra: Vec<FetchErrorKind>,
}

impl TransientKinds {
    /// Timeouts, connection problems and error statuses
    pub fn raw() -> Self {
        Self { extra: Vec::new() }
    }

    /// [`TransientKinds::raw`] plus malformed bodies
    pub fn json() -> Self {
        Self::raw().with(FetchErrorKind::Decode)
    }

    pub fn with(mut self, kind: FetchErrorKind) -> Self {
        if !self.extra.contains(&kind) {
            self.extra.push(kind);
        }
        self
    }

    pub fn contains(&self, kind: FetchErrorKind) -> bool {
        matches!(
            kind,
            FetchErrorKind::Timeout | FetchErrorKind::Connection | FetchErrorKind::Status(_)
        ) || self.extra.contains(&kind)
    }
}

/// Result of a logical fetch
#[derive(Debug)]
pub enum FetchOutcome<T> {
    /// Fresh or cached value
    Success(T),
    /// Retries exhausted; the caller's default
    Defaulted(T),
    /// Error outside the transient set
    Fatal(FetchError),
}

impl<T> FetchOutcome<T> {
    /// Value for both success and default, the error for fatal outcomes
    pub fn into_result(self) -> FetchResult<T> {
        match self {
            Self::Success(value) | Self::Defaulted(value) => Ok(value),
            Self::Fatal(error) => Err(error),
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Self::Defaulted(_))
    }
}

/// Conversion between decoded payloads and cache bytes
pub trait CachePayload: Sized {
    fn to_cache_bytes(&self) -> AppResult<Vec<u8>>;

    /// `None` when the cached bytes no longer decode
    fn from_cache_bytes(bytes: &[u8]) -> Option<Self>;
}

impl CachePayload for Vec<u8> {
    fn to_cache_bytes(&self) -> AppResult<Vec<u8>> {
        Ok(self.clone())
    }

    fn from_cache_bytes(bytes: &[u8]) -> Option<Self> {
        Some(bytes.to_vec())
    }
}

macro_rules! json_cache_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CachePayload for $ty {
                fn to_cache_bytes(&self) -> AppResult<Vec<u8>> {
                    Ok(serde_json::to_vec(self)?)
                }

                fn from_cache_bytes(bytes: &[u8]) -> Option<Self> {
                    serde_json::from_slice(bytes).ok()
                }
            }
        )*
    };
}

json_cache_payload!(
    Vec<Program>,
    Option<ProgramDetails>,
    Option<ShowsCast>,
    HashMap<i64, u32>,
);

/// Remote reader that retries transient failures and writes through the cache
#[derive(Clone)]
pub struct RetryingFetcher {
    source: Arc<dyn HttpSource>,
    cache: Arc<CacheStore>,
    ttl: Duration,
}

impl RetryingFetcher {
    pub fn new(source: Arc<dyn HttpSource>, cache: Arc<CacheStore>, ttl: Duration) -> Self {
        Self { source, cache, ttl }
    }

    /// Fetch `request`, decoding the body with `loader`
    pub async fn fetch<T, L>(
        &self,
        request: &FetchRequest,
        policy: &RetryPolicy,
        transient: &TransientKinds,
        loader: L,
        default: T,
    ) -> FetchOutcome<T>
    where
        T: CachePayload,
        L: Fn(&[u8]) -> FetchResult<T>,
    {
        let key = request.cache_key();
        if let Some(bytes) = self.cache.get(key).await {
            match T::from_cache_bytes(&bytes) {
                Some(value) => {
                    debug!("Cache hit for {}", key);
                    return FetchOutcome::Success(value);
                }
                None => debug!("Ignoring undecodable cache entry for {}", key),
            }
        }

        let mut timeout = policy.timeout;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = match self.source.get(request, timeout).await {
                Ok(body) => loader(&body),
                Err(e) => Err(e),
            };

            let error = match result {
                Ok(value) => {
                    self.store(key, &value).await;
                    return FetchOutcome::Success(value);
                }
                Err(error) => error,
            };

            if !transient.contains(error.kind) {
                return FetchOutcome::Fatal(error);
            }

            timeout = policy.next_timeout(timeout);
            if attempt > policy.max_retries {
                error!(
                    "Failed to download URL {} after {} attempts: {}",
                    request.url, attempt, error
                );
                return FetchOutcome::Defaulted(default);
            }

            debug!(
                "Attempt {} for {} failed ({}), retrying with timeout {:?}",
                attempt, request.url, error.kind, timeout
            );
        }
    }

    async fn store<T: CachePayload>(&self, key: &str, value: &T) {
        let bytes = match value.to_cache_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode cache entry for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &bytes, self.ttl).await {
            warn!("Failed to cache response for {}: {}", key, e);
        }
    }
}
