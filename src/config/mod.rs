use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::errors::{AppError, AppResult};

pub mod defaults;
pub mod duration_serde;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub guide: GuideConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Channel list (JSON array of channel descriptors)
    #[serde(default = "default_channels_path")]
    pub channels_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum number of requests in flight within a stage
    #[serde(default = "default_parallel")]
    pub parallel: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Byte budget of the on-disk cache
    #[serde(default = "default_cache_size_limit")]
    pub size_limit: u64,
    #[serde(default = "default_cache_ttl", with = "duration_serde::duration")]
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Root of generated files; posters land in `{path}/posters`
    #[serde(default = "default_images_path")]
    pub path: PathBuf,
    /// Largest allowed poster dimension in pixels
    #[serde(default = "default_images_size")]
    pub size: u32,
    #[serde(default = "default_images_quality")]
    pub quality: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconTheme {
    /// Icons adapted for dark backgrounds
    #[default]
    Dark,
    /// Icons adapted for light backgrounds
    Light,
}

impl IconTheme {
    /// Name of the channel icon manifest for this theme
    pub fn channel_manifest(&self) -> &'static str {
        match self {
            Self::Dark => "channels-for-dark-bg",
            Self::Light => "channels-for-light-bg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideConfig {
    /// Root URL for links to locally generated resources
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_icons_path")]
    pub icons_path: PathBuf,
    #[serde(default)]
    pub icon_theme: IconTheme,
    #[serde(default = "default_expand_genres")]
    pub expand_genres: bool,
    /// Some EPG consumers fail on rating icons, so they are opt-in
    #[serde(default = "default_add_tv_rating_icon")]
    pub add_tv_rating_icon: bool,
    /// Also write a gzip copy of the guide
    #[serde(default = "default_create_archive")]
    pub create_archive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_listing_base")]
    pub listing_base: String,
    #[serde(default = "default_listing_referer")]
    pub listing_referer: String,
    #[serde(default = "default_details_base")]
    pub details_base: String,
    #[serde(default = "default_cast_base")]
    pub cast_base: String,
    #[serde(default = "default_details_referer")]
    pub details_referer: String,
    #[serde(default = "default_tags_base")]
    pub tags_base: String,
    #[serde(default = "default_tags_referer")]
    pub tags_referer: String,
    #[serde(default = "default_tags_provider_id")]
    pub tags_provider_id: String,
    /// Root that provider-relative poster paths resolve against
    #[serde(default = "default_image_catalog_base")]
    pub image_catalog_base: String,
}

fn default_channels_path() -> PathBuf {
    PathBuf::from(DEFAULT_CHANNELS_PATH)
}

fn default_parallel() -> usize {
    DEFAULT_PARALLEL
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_cache_size_limit() -> u64 {
    DEFAULT_CACHE_SIZE_LIMIT
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

fn default_images_path() -> PathBuf {
    PathBuf::from(DEFAULT_IMAGES_PATH)
}

fn default_images_size() -> u32 {
    DEFAULT_IMAGES_SIZE
}

fn default_images_quality() -> u8 {
    DEFAULT_IMAGES_QUALITY
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_icons_path() -> PathBuf {
    PathBuf::from(DEFAULT_ICONS_PATH)
}

fn default_expand_genres() -> bool {
    DEFAULT_EXPAND_GENRES
}

fn default_add_tv_rating_icon() -> bool {
    DEFAULT_ADD_TV_RATING_ICON
}

fn default_create_archive() -> bool {
    DEFAULT_CREATE_ARCHIVE
}

fn default_listing_base() -> String {
    DEFAULT_LISTING_BASE.to_string()
}

fn default_listing_referer() -> String {
    DEFAULT_LISTING_REFERER.to_string()
}

fn default_details_base() -> String {
    DEFAULT_DETAILS_BASE.to_string()
}

fn default_cast_base() -> String {
    DEFAULT_CAST_BASE.to_string()
}

fn default_details_referer() -> String {
    DEFAULT_DETAILS_REFERER.to_string()
}

fn default_tags_base() -> String {
    DEFAULT_TAGS_BASE.to_string()
}

fn default_tags_referer() -> String {
    DEFAULT_TAGS_REFERER.to_string()
}

fn default_tags_provider_id() -> String {
    DEFAULT_TAGS_PROVIDER_ID.to_string()
}

fn default_image_catalog_base() -> String {
    DEFAULT_IMAGE_CATALOG_BASE.to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            channels_path: default_channels_path(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            size_limit: default_cache_size_limit(),
            ttl: default_cache_ttl(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            path: default_images_path(),
            size: default_images_size(),
            quality: default_images_quality(),
        }
    }
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            icons_path: default_icons_path(),
            icon_theme: IconTheme::default(),
            expand_genres: default_expand_genres(),
            add_tv_rating_icon: default_add_tv_rating_icon(),
            create_archive: default_create_archive(),
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            listing_base: default_listing_base(),
            listing_referer: default_listing_referer(),
            details_base: default_details_base(),
            cast_base: default_cast_base(),
            details_referer: default_details_referer(),
            tags_base: default_tags_base(),
            tags_referer: default_tags_referer(),
            tags_provider_id: default_tags_provider_id(),
            image_catalog_base: default_image_catalog_base(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load_from_file<P: AsRef<Path>>(config_file: P) -> AppResult<Self> {
        let config_file = config_file.as_ref();
        if config_file.exists() {
            let contents = std::fs::read_to_string(config_file)?;
            let config = toml::from_str(&contents).map_err(|e| {
                AppError::configuration(format!(
                    "Failed to parse {}: {e}",
                    config_file.display()
                ))
            })?;
            info!("Configuration loaded from: {}", config_file.display());
            Ok(config)
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                config_file.display()
            );
            Ok(Self::default())
        }
    }

    /// Reject option values the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.fetch.parallel == 0 {
            return Err(AppError::configuration("parallel must be a positive integer"));
        }
        if self.images.size == 0 {
            return Err(AppError::configuration(
                "images size must be a positive integer",
            ));
        }
        if self.images.quality == 0 {
            return Err(AppError::configuration(
                "images quality must be a positive integer",
            ));
        }
        if self.cache.size_limit == 0 {
            return Err(AppError::configuration("cache size limit must be positive"));
        }
        url::Url::parse(&self.guide.base_url).map_err(|e| {
            AppError::configuration(format!("Invalid base URL '{}': {e}", self.guide.base_url))
        })?;
        Ok(())
    }

    /// Directory that receives processed posters
    pub fn posters_path(&self) -> PathBuf {
        self.images.path.join("posters")
    }
}
