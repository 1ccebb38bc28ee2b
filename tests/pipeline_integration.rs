//! End-to-end guide generation against a scripted provider

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use epg_grabber::config::Config;
use epg_grabber::errors::{AppError, FetchError, FetchErrorKind, FetchResult};
use epg_grabber::fetcher::{FetchRequest, HttpSource};
use epg_grabber::run_with_source;

const POSTER_URL: &str = "https://www.tvguide.com/a/img/catalog/provider/1/poster.png";

/// Provider that answers every endpoint from canned payloads
struct ScriptedProvider {
    calls: Mutex<Vec<String>>,
    details_failure: Option<FetchErrorKind>,
}

impl ScriptedProvider {
    fn new(details_failure: Option<FetchErrorKind>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            details_failure,
        })
    }

    fn calls_to(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }

    fn poster() -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1920, 1080, image::Rgb([10, 20, 30])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        Bytes::from(out.into_inner())
    }
}

#[async_trait]
impl HttpSource for ScriptedProvider {
    async fn get(&self, request: &FetchRequest, _timeout: Duration) -> FetchResult<Bytes> {
        let url = request.url.as_str();
        self.calls.lock().unwrap().push(url.to_string());

        let body = if url.starts_with("http://mock/listing/ABC.json") {
            r#"{"items": {"2022-06-01": [
                {"id": 101, "name": "Detective Show", "start_timestamp": 1654070400, "end_timestamp": 1654074000},
                {"id": 102, "name": "Late News", "start_timestamp": 1654074000, "end_timestamp": 1654077600}
            ]}}"#
        } else if url.starts_with("http://mock/details/101/") {
            if let Some(kind) = self.details_failure {
                return Err(FetchError::new(kind, url, "scripted failure"));
            }
            r#"{"data": {"item": {
                "id": 101, "name": "Detective Show", "description": "A case & a clue",
                "tvRating": "tv-14", "seasonNumber": 2, "episodeNumber": 5, "mcoId": 555,
                "releaseYear": 2020, "duration": 3600,
                "genres": [{"id": 1, "name": "Drama", "genres": ["crime drama"]}],
                "images": [{"id": "p1", "provider": "tvg", "bucketType": "catalog",
                            "bucketPath": "/provider/1/poster.png", "filename": "poster.png",
                            "width": 1920, "height": 1080}]
            }}}"#
        } else if url.starts_with("http://mock/details/102/") {
            // Shape the provider sometimes returns for unknown programs
            r#"{"data": {}}"#
        } else if url.starts_with("http://mock/cast/555/") {
            r#"{"components": [{"meta": {"componentName": "tv-object-cast-and-crew"}, "data": {
                "id": "555",
                "items": [
                    {"id": 1, "name": "Jane Doe", "role": "Detective", "type": "Actor"},
                    {"id": 2, "name": "John Roe", "role": null, "type": "Director"}
                ]
            }}]}"#
        } else if url.starts_with("http://mock/tags/") {
            r#"{"data": {"items": [{"programSchedules": [
                {"programId": 101, "airingAttrib": 4},
                {"programId": 102, "airingAttrib": 1}
            ]}]}}"#
        } else if url == POSTER_URL {
            return Ok(Self::poster());
        } else {
            return Err(FetchError::new(FetchErrorKind::Status(404), url, "not found"));
        };

        Ok(Bytes::from_static(body.as_bytes()))
    }
}

fn config(root: &Path) -> Config {
    std::fs::write(
        root.join("channels.json"),
        r#"[
            {"id": "abc", "stream_id": "ABC", "name": "ABC East", "language": "en", "tvguide_id": "ABC"},
            {"id": "off", "stream_id": "OFF", "name": "Off Air", "language": "en", "tvguide_id": ""}
        ]"#,
    )
    .unwrap();

    let icons = root.join("icons");
    std::fs::create_dir_all(&icons).unwrap();
    std::fs::write(
        icons.join("channels-for-dark-bg.json"),
        r#"{"ABC": {"path": "channels/abc.png", "width": 200, "height": 100}}"#,
    )
    .unwrap();

    let mut config = Config::default();
    config.input.channels_path = root.join("channels.json");
    config.cache.path = root.join("cache");
    config.images.path = root.join("images");
    config.guide.icons_path = icons;
    config.guide.base_url = "http://epg.local".to_string();
    config.guide.create_archive = true;
    config.fetch.parallel = 2;
    config.endpoints.listing_base = "http://mock/listing".to_string();
    config.endpoints.details_base = "http://mock/details".to_string();
    config.endpoints.cast_base = "http://mock/cast".to_string();
    config.endpoints.tags_base = "http://mock/tags".to_string();
    config
}

#[tokio::test]
async fn test_full_run_writes_guide_and_archive() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let output = dir.path().join("out").join("guide.xml");
    let provider = ScriptedProvider::new(None);

    let summary = run_with_source(&config, &output, provider.clone())
        .await
        .unwrap();

    assert_eq!(summary.channels, 2);
    assert_eq!(summary.programmes, 2);
    assert_eq!(summary.report.items("details"), Some(1));
    assert_eq!(summary.report.items("images"), Some(1));

    let xml = std::fs::read_to_string(&output).unwrap();
    assert!(xml.contains("<channel id=\"ABC\">"));
    assert!(xml.contains("<icon src=\"http://epg.local/images/icons/channels/abc.png\" width=\"200\" height=\"100\" />"));
    assert!(xml.contains("<title lang=\"en\">Detective Show</title>"));
    assert!(xml.contains("<desc>A case &amp; a clue</desc>"));
    assert!(xml.contains("<actor role=\"Detective\">Jane Doe</actor>"));
    assert!(xml.contains("<director>John Roe</director>"));
    assert!(xml.contains("<category>Crime drama</category>"));
    assert!(xml.contains("<episode-num system=\"onscreen\">S02E05</episode-num>"));
    assert!(xml.contains("<episode-num system=\"xmltv_ns\">1.4.</episode-num>"));
    assert!(xml.contains("<rating system=\"VCHIP\">"));
    assert!(xml.contains(
        "<icon src=\"http://epg.local/images/posters/provider/1/poster.png\" width=\"720\" height=\"405\" />"
    ));
    assert!(xml.contains("<title>Late News</title>"));
    assert!(xml.contains("<new />"));
    assert!(xml.contains("<live />"));

    let poster = dir.path().join("images/posters/provider/1/poster.png");
    let saved = image::open(&poster).unwrap();
    assert_eq!((saved.width(), saved.height()), (720, 405));

    let archive = summary.archive.unwrap();
    let mut unpacked = String::new();
    GzDecoder::new(std::fs::File::open(archive).unwrap())
        .read_to_string(&mut unpacked)
        .unwrap();
    assert_eq!(unpacked, xml);

    // The channel without a listing id never hits the network
    assert_eq!(provider.calls_to("http://mock/listing/"), 1);
    // Validation errors are retried until the retry budget runs out
    assert_eq!(provider.calls_to("http://mock/details/102/"), 11);
}

#[tokio::test]
async fn test_second_run_reuses_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let output = dir.path().join("guide.xml");

    let first = ScriptedProvider::new(None);
    run_with_source(&config, &output, first.clone()).await.unwrap();
    assert_eq!(first.calls_to("http://mock/details/101/"), 1);

    let second = ScriptedProvider::new(None);
    run_with_source(&config, &output, second.clone()).await.unwrap();
    assert_eq!(second.calls_to("http://mock/details/101/"), 0);
    assert_eq!(second.calls_to("http://mock/cast/"), 0);
    assert_eq!(second.calls_to(POSTER_URL), 0);
    // Defaulted results are not cached
    assert_eq!(second.calls_to("http://mock/details/102/"), 11);

    let xml = std::fs::read_to_string(&output).unwrap();
    assert!(xml.contains("http://epg.local/images/posters/provider/1/poster.png"));
}

#[tokio::test]
async fn test_fatal_error_aborts_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let output = dir.path().join("guide.xml");
    let provider = ScriptedProvider::new(Some(FetchErrorKind::Other));

    let result = run_with_source(&config, &output, provider.clone()).await;

    match result {
        Err(AppError::Fetch(error)) => assert_eq!(error.kind, FetchErrorKind::Other),
        other => panic!("expected fatal fetch error, got {other:?}"),
    }
    assert!(!output.exists());
    // Cache was still closed and its index persisted
    assert!(dir.path().join("cache/index.json").exists());
    // Later stages never ran
    assert_eq!(provider.calls_to("http://mock/tags/"), 0);
}
