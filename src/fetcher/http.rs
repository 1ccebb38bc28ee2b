use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::trace;

use crate::errors::{FetchError, FetchErrorKind, FetchResult};

/// One logical remote read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The identity under which responses are cached
    pub fn cache_key(&self) -> &str {
        &self.url
    }
}

/// Transport used by the retrying fetcher
#[async_trait]
pub trait HttpSource: Send + Sync {
    /// Perform a single GET, failing with a classified error
    async fn get(&self, request: &FetchRequest, timeout: Duration) -> FetchResult<Bytes>;
}

/// `HttpSource` backed by reqwest
#[derive(Clone)]
pub struct ReqwestSource {
    client: Client,
}

impl ReqwestSource {
    pub fn new() -> FetchResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::from_reqwest("client", &e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpSource for ReqwestSource {
    async fn get(&self, request: &FetchRequest, timeout: Duration) -> FetchResult<Bytes> {
        trace!("GET {} (timeout {:?})", request.url, timeout);

        let mut builder = self.client.get(&request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::Status(status.as_u16()),
                &request.url,
                status.canonical_reason().unwrap_or("Unknown"),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(&request.url, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder_keeps_headers_in_order() {
        let request = FetchRequest::new("https://example.com/a")
            .header("Referer", "https://google.com")
            .header("User-Agent", "test");

        assert_eq!(request.cache_key(), "https://example.com/a");
        assert_eq!(
            request.headers,
            vec![
                ("Referer".to_string(), "https://google.com".to_string()),
                ("User-Agent".to_string(), "test".to_string()),
            ]
        );
    }
}
