//! Poster download, scaling and local storage
//!
//! Posters are fetched through the retrying fetcher with the image retry
//! policy. Scaling happens inside the fetch loader so the cache only ever holds
//! thumbnails. Once written under `{images}/posters`, the asset is rewritten to
//! point at the published copy below the base URL.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use std::io::{Cursor, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::defaults::DEFAULT_IMAGE_CATALOG_BASE;
use crate::errors::{AppResult, FetchError, FetchErrorKind, ImageError};
use crate::fetcher::{FetchOutcome, FetchRequest, RetryPolicy, RetryingFetcher, TransientKinds};
use crate::models::{ImageAsset, LOCAL_BUCKET};

/// Largest size with the same aspect ratio that fits in a `max` square
///
/// Images that already fit are left alone; scaled sides are rounded to the
/// nearest pixel and never drop below one pixel.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }
    let scale = f64::from(max) / f64::from(width.max(height));
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, max);
    (scaled(width), scaled(height))
}

/// Decode, shrink to fit `max` and re-encode in the original format
pub fn thumbnail(bytes: &[u8], max: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    let format = image::guess_format(bytes)?;
    let img = image::load_from_memory_with_format(bytes, format)?;

    let (width, height) = fit_within(img.width(), img.height(), max);
    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?
        }
        other => img.write_to(&mut out, other)?,
    }
    Ok(out.into_inner())
}

/// Provider bucket path as a path below the posters directory
///
/// Paths that would leave the directory are rejected.
pub fn poster_relative_path(bucket_path: &str) -> Option<&Path> {
    let relative = Path::new(bucket_path.trim_start_matches('/'));
    let inside = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    (inside && relative.file_name().is_some()).then_some(relative)
}

/// Saves program posters locally and repoints their assets
#[derive(Clone)]
pub struct PosterProcessor {
    fetcher: RetryingFetcher,
    posters_dir: PathBuf,
    base_url: String,
    catalog_base: String,
    max_size: u32,
    quality: u8,
}

struct LocalPoster {
    width: u32,
    height: u32,
    bucket_path: String,
}

impl PosterProcessor {
    pub fn new(
        fetcher: RetryingFetcher,
        posters_dir: PathBuf,
        base_url: &str,
        max_size: u32,
        quality: u8,
    ) -> Self {
        Self {
            fetcher,
            posters_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
            catalog_base: DEFAULT_IMAGE_CATALOG_BASE.to_string(),
            max_size,
            quality,
        }
    }

    /// Root that remote bucket paths are downloaded from
    pub fn with_catalog_base(mut self, catalog_base: &str) -> Self {
        self.catalog_base = catalog_base.to_string();
        self
    }

    pub fn posters_dir(&self) -> &Path {
        &self.posters_dir
    }

    /// Remove posters saved by previous runs
    pub async fn clear(&self) -> AppResult<()> {
        match tokio::fs::remove_dir_all(&self.posters_dir).await {
            Ok(()) => {
                debug!("Removed old posters in {}", self.posters_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Process every image of one program in order, returning how many were saved
    pub async fn process_all(&self, images: &mut [ImageAsset]) -> usize {
        let mut saved = 0;
        for image in images.iter_mut() {
            if self.process(image).await {
                saved += 1;
            }
        }
        saved
    }

    /// Save one poster locally; on failure the asset is left untouched
    pub async fn process(&self, image: &mut ImageAsset) -> bool {
        match self.localize(image).await {
            Ok(poster) => {
                image.width = poster.width;
                image.height = poster.height;
                image.bucket_path = poster.bucket_path;
                image.bucket_type = LOCAL_BUCKET.to_string();
                true
            }
            Err(e) => {
                warn!(
                    "Something went wrong while processing image {}: {}",
                    image.url(&self.catalog_base),
                    e
                );
                false
            }
        }
    }

    async fn localize(&self, image: &ImageAsset) -> Result<LocalPoster, ImageError> {
        let relative = poster_relative_path(&image.bucket_path).ok_or_else(|| {
            ImageError::UnsafePath {
                path: image.bucket_path.clone(),
            }
        })?;
        let url = image.url(&self.catalog_base);
        let request = FetchRequest::new(url.as_str());
        let (max, quality) = (self.max_size, self.quality);

        let outcome = self
            .fetcher
            .fetch(
                &request,
                &RetryPolicy::images(),
                &TransientKinds::raw(),
                |body| {
                    thumbnail(body, max, quality).map_err(|e| {
                        FetchError::new(FetchErrorKind::Processing, url.as_str(), e.to_string())
                    })
                },
                Vec::new(),
            )
            .await;

        let bytes = match outcome {
            FetchOutcome::Success(bytes) => bytes,
            FetchOutcome::Defaulted(_) => return Err(ImageError::Exhausted { url }),
            FetchOutcome::Fatal(e) => return Err(e.into()),
        };

        let path = self.posters_dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        let (width, height) = ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .into_dimensions()?;

        Ok(LocalPoster {
            width,
            height,
            bucket_path: format!(
                "{}/images/posters/{}",
                self.base_url,
                image.bucket_path.trim_start_matches('/')
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::errors::FetchResult;
    use crate::fetcher::HttpSource;
    use async_trait::async_trait;
    use bytes::Bytes;
    use image::{DynamicImage, RgbImage};
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[rstest]
    #[case((1920, 1080), 720, (720, 405))]
    #[case((1080, 1920), 720, (405, 720))]
    #[case((720, 720), 720, (720, 720))]
    #[case((300, 200), 720, (300, 200))]
    #[case((5000, 2), 720, (720, 1))]
    fn test_fit_within(#[case] size: (u32, u32), #[case] max: u32, #[case] expected: (u32, u32)) {
        assert_eq!(fit_within(size.0, size.1, max), expected);
    }

    #[rstest]
    #[case(ImageFormat::Png)]
    #[case(ImageFormat::Jpeg)]
    fn test_thumbnail_keeps_format_and_scales(#[case] format: ImageFormat) {
        let bytes = thumbnail(&encoded(1920, 1080, format), 720, 80).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), format);

        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (720, 405));
    }

    #[test]
    fn test_thumbnail_never_upscales() {
        let bytes = thumbnail(&encoded(100, 50, ImageFormat::Png), 720, 80).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (100, 50));
    }

    #[test]
    fn test_thumbnail_rejects_garbage() {
        assert!(thumbnail(b"definitely not an image", 720, 80).is_err());
    }

    struct StaticSource {
        body: Bytes,
        calls: AtomicUsize,
        urls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HttpSource for StaticSource {
        async fn get(&self, request: &FetchRequest, _timeout: Duration) -> FetchResult<Bytes> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(request.url.clone());
            Ok(self.body.clone())
        }
    }

    fn asset(bucket_path: &str) -> ImageAsset {
        ImageAsset {
            id: "1".to_string(),
            provider: "tvg".to_string(),
            image_type: None,
            bucket_type: "catalog".to_string(),
            bucket_path: bucket_path.to_string(),
            filename: "poster.png".to_string(),
            width: 1920,
            height: 1080,
        }
    }

    async fn processor(body: Vec<u8>, root: &Path) -> (PosterProcessor, Arc<StaticSource>) {
        let source = Arc::new(StaticSource {
            body: Bytes::from(body),
            calls: AtomicUsize::new(0),
            urls: std::sync::Mutex::new(Vec::new()),
        });
        let cache = Arc::new(CacheStore::open(root.join("cache"), 1 << 24).await.unwrap());
        let fetcher = RetryingFetcher::new(source.clone(), cache, Duration::from_secs(60));
        let processor = PosterProcessor::new(
            fetcher,
            root.join("images").join("posters"),
            "http://epg.local/",
            720,
            80,
        );
        (processor, source)
    }

    #[tokio::test]
    async fn test_process_saves_and_rewrites_asset() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _source) = processor(encoded(1920, 1080, ImageFormat::Png), dir.path()).await;

        let mut image = asset("/shows/1/poster.png");
        assert!(processor.process(&mut image).await);

        assert_eq!((image.width, image.height), (720, 405));
        assert_eq!(image.bucket_type, LOCAL_BUCKET);
        assert_eq!(
            image.bucket_path,
            "http://epg.local/images/posters/shows/1/poster.png"
        );
        assert_eq!(image.url("http://unused"), image.bucket_path);
        assert!(dir.path().join("images/posters/shows/1/poster.png").exists());
    }

    #[tokio::test]
    async fn test_undecodable_image_leaves_asset_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, source) = processor(b"<html>not found</html>".to_vec(), dir.path()).await;

        let mut image = asset("/shows/2/poster.jpg");
        let before = image.clone();
        assert!(!processor.process(&mut image).await);

        assert_eq!(image, before);
        // Processing failures are not retried
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("images/posters/shows/2/poster.jpg").exists());
    }

    #[rstest]
    #[case("/shows/1/poster.png", Some("shows/1/poster.png"))]
    #[case("shows/./poster.png", Some("shows/./poster.png"))]
    #[case("/../escape.png", None)]
    #[case("/shows/../../escape.png", None)]
    #[case("/", None)]
    fn test_poster_relative_path(#[case] bucket_path: &str, #[case] expected: Option<&str>) {
        assert_eq!(poster_relative_path(bucket_path), expected.map(Path::new));
    }

    #[tokio::test]
    async fn test_escaping_bucket_path_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, source) = processor(encoded(100, 50, ImageFormat::Png), dir.path()).await;

        let mut image = asset("/../../escape.png");
        let before = image.clone();
        assert!(!processor.process(&mut image).await);

        assert_eq!(image, before);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("escape.png").exists());
        assert!(!dir.path().join("images/escape.png").exists());
    }

    #[tokio::test]
    async fn test_remote_posters_use_catalog_base() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, source) = processor(encoded(100, 50, ImageFormat::Png), dir.path()).await;
        let processor = processor.with_catalog_base("http://mirror/catalog/");

        let mut image = asset("/shows/3/poster.png");
        assert!(processor.process(&mut image).await);
        assert_eq!(
            *source.urls.lock().unwrap(),
            vec!["http://mirror/catalog/shows/3/poster.png".to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_removes_old_posters() {
        let dir = tempfile::tempdir().unwrap();
        let (processor, _source) = processor(Vec::new(), dir.path()).await;

        processor.clear().await.unwrap();
        let stale = processor.posters_dir().join("old/poster.jpg");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"old").unwrap();

        processor.clear().await.unwrap();
        assert!(!processor.posters_dir().exists());
    }
}
