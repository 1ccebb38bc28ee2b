/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Input / output locations
pub const DEFAULT_CHANNELS_PATH: &str = "./channels.json";
pub const DEFAULT_CACHE_PATH: &str = "./cache";
pub const DEFAULT_IMAGES_PATH: &str = "./images";
pub const DEFAULT_ICONS_PATH: &str = "./images/icons";

// Cache defaults
pub const DEFAULT_CACHE_SIZE_LIMIT: u64 = 1 << 32; // 4 GiB
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

// Fetch defaults
pub const DEFAULT_PARALLEL: usize = 10;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/102.0.5005.63 Safari/537.36";

// Poster defaults
pub const DEFAULT_IMAGES_SIZE: u32 = 720;
pub const DEFAULT_IMAGES_QUALITY: u8 = 80;

// Guide defaults
pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/interlark/ustvgo-tvguide/master";
pub const DEFAULT_EXPAND_GENRES: bool = true;
pub const DEFAULT_ADD_TV_RATING_ICON: bool = false;
pub const DEFAULT_CREATE_ARCHIVE: bool = false;

// Remote endpoints
pub const DEFAULT_LISTING_BASE: &str = "https://ustvgo.tv/tvguide/JSON2";
pub const DEFAULT_LISTING_REFERER: &str = "https://ustvgo.tv/";
pub const DEFAULT_DETAILS_BASE: &str =
    "https://cmg-prod.apigee.net/v1/xapi/tvschedules/tvguide/programdetails";
pub const DEFAULT_CAST_BASE: &str =
    "https://cmg-prod.apigee.net/v1/xapi/composer/tvguide/pages/shows-cast";
pub const DEFAULT_DETAILS_REFERER: &str = "https://google.com";
pub const DEFAULT_TAGS_BASE: &str = "https://cmg-prod.apigee.net/v1/xapi/tvschedules/tvguide";
pub const DEFAULT_TAGS_REFERER: &str = "https://www.tvguide.com/";
pub const DEFAULT_TAGS_PROVIDER_ID: &str = "9100001138"; // Eastern Time Zone
pub const DEFAULT_IMAGE_CATALOG_BASE: &str = "https://www.tvguide.com/a/img/catalog";

// Guide document metadata
pub const GENERATOR_NAME: &str = env!("CARGO_PKG_NAME");
pub const GENERATOR_URL: &str = "https://github.com/interlark/ustvgo-tvguide";
