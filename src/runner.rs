//! One full guide generation run
//!
//! Opens the cache, loads the channel list, runs the pipeline, builds and
//! writes the guide. The cache is expired and closed on every exit path,
//! including Ctrl-C, so a failed run still keeps what it downloaded.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::fetcher::{HttpSource, ReqwestSource, RetryingFetcher};
use crate::guide::GuideBuilder;
use crate::images::PosterProcessor;
use crate::models::Channel;
use crate::pipeline::{ConcurrencyLimiter, EpgPipeline, PipelineReport, StageContext};
use crate::xmltv::write_guide;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub channels: usize,
    pub programmes: usize,
    pub warnings: usize,
    pub output: PathBuf,
    pub archive: Option<PathBuf>,
    pub report: PipelineReport,
}

/// Read the channel list
pub async fn load_channels(path: &Path) -> AppResult<Vec<Channel>> {
    let contents = tokio::fs::read(path).await?;
    let channels: Vec<Channel> = serde_json::from_slice(&contents)?;
    info!("Loaded {} channels from {}", channels.len(), path.display());
    Ok(channels)
}

/// Resolves on Ctrl-C; never resolves when the handler cannot be installed
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Generate the guide at `output` using live HTTP
pub async fn run(config: &Config, output: &Path) -> AppResult<RunSummary> {
    let source = ReqwestSource::new()?;
    run_with_source(config, output, Arc::new(source)).await
}

/// Generate the guide at `output`, reading remote data through `source`
pub async fn run_with_source(
    config: &Config,
    output: &Path,
    source: Arc<dyn HttpSource>,
) -> AppResult<RunSummary> {
    config.validate()?;

    let cache = Arc::new(CacheStore::open(&config.cache.path, config.cache.size_limit).await?);
    let result = tokio::select! {
        result = generate(config, output, source, Arc::clone(&cache)) => result,
        _ = interrupted() => {
            warn!("Interrupted, saving cache before exit");
            Err(AppError::Interrupted)
        }
    };

    let purged = cache.expire().await;
    if purged > 0 {
        info!("Purged {} expired cache entries", purged);
    }
    match cache.close().await {
        Ok(()) => result,
        Err(e) if result.is_ok() => Err(e),
        Err(e) => {
            warn!("Failed to close cache after failed run: {}", e);
            result
        }
    }
}

async fn generate(
    config: &Config,
    output: &Path,
    source: Arc<dyn HttpSource>,
    cache: Arc<CacheStore>,
) -> AppResult<RunSummary> {
    let mut channels = load_channels(&config.input.channels_path).await?;

    let fetcher = RetryingFetcher::new(source, cache, config.cache.ttl);
    let context = StageContext::new(
        fetcher.clone(),
        ConcurrencyLimiter::new(config.fetch.parallel)?,
        config.endpoints.clone(),
        config.fetch.user_agent.clone(),
    );
    let posters = PosterProcessor::new(
        fetcher,
        config.posters_path(),
        &config.guide.base_url,
        config.images.size,
        config.images.quality,
    )
    .with_catalog_base(&config.endpoints.image_catalog_base);

    let report = EpgPipeline::standard(context, posters)
        .run(&mut channels)
        .await?;

    let document = GuideBuilder::from_config(config).build(&channels, Utc::now());
    let archive = write_guide(&document.tv, output, config.guide.create_archive).await?;

    Ok(RunSummary {
        channels: document.tv.channels.len(),
        programmes: document.tv.programmes.len(),
        warnings: document.warnings.len(),
        output: output.to_path_buf(),
        archive,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channels.json");
        std::fs::write(
            &path,
            r#"[{"id": "abc", "stream_id": "ABC", "name": "ABC", "language": "en", "tvguide_id": "ABC"}]"#,
        )
        .unwrap();

        let channels = load_channels(&path).await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].stream_id, "ABC");
    }

    #[tokio::test]
    async fn test_missing_channel_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_channels(&dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.cache.path = dir.path().join("cache");
        config.fetch.parallel = 0;

        let result = run(&config, &dir.path().join("guide.xml")).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
        assert!(!dir.path().join("cache").exists());
        assert!(!dir.path().join("guide.xml").exists());
    }
}
