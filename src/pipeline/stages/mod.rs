//! Pipeline stages
//!
//! Every stage receives the full channel list and enriches it in place. A stage
//! only returns an error for fatal fetch failures; transient problems have
//! already been resolved to defaults by the fetcher.

use async_trait::async_trait;

use crate::config::EndpointsConfig;
use crate::errors::AppResult;
use crate::fetcher::{FetchRequest, RetryingFetcher};
use crate::models::Channel;
use crate::pipeline::limiter::ConcurrencyLimiter;

pub mod cast;
pub mod details;
pub mod images;
pub mod listing;
pub mod tags;

pub use cast::CastStage;
pub use details::DetailsStage;
pub use images::ImagesStage;
pub use listing::ListingStage;
pub use tags::TagsStage;

/// Stage names for consistent logging
pub mod stage_names {
    pub const LISTING: &str = "listing";
    pub const DETAILS: &str = "details";
    pub const CAST: &str = "cast";
    pub const IMAGES: &str = "images";
    pub const TAGS: &str = "tags";
}

/// Shared services handed to every stage
#[derive(Clone)]
pub struct StageContext {
    pub fetcher: RetryingFetcher,
    pub limiter: ConcurrencyLimiter,
    pub endpoints: EndpointsConfig,
    pub user_agent: String,
}

impl StageContext {
    pub fn new(
        fetcher: RetryingFetcher,
        limiter: ConcurrencyLimiter,
        endpoints: EndpointsConfig,
        user_agent: String,
    ) -> Self {
        Self {
            fetcher,
            limiter,
            endpoints,
            user_agent,
        }
    }

    /// JSON request carrying the browser user agent and the given referer
    pub fn json_request(&self, url: String, referer: &str) -> FetchRequest {
        FetchRequest::new(url)
            .header("Referer", referer)
            .header("User-Agent", self.user_agent.as_str())
    }
}

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Enrich `channels` in place and return the number of items produced
    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize>;
}
