//! Mapping of program details into XMLTV programme elements

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::IconTheme;
use crate::config::defaults::DEFAULT_IMAGE_CATALOG_BASE;
use crate::errors::MappingWarning;
use crate::guide::icons::{IconCatalog, METASCORE_MANIFEST, TV_RATING_MANIFEST};
use crate::models::ProgramDetails;
use crate::xmltv::{EpisodeNum, Icon, Programme, Rating, StarRating, Text};

const VCHIP: [&str; 6] = ["TV-Y", "TV-Y7", "TV-G", "TV-PG", "TV-14", "TV-MA"];
const BBFC: [&str; 6] = ["12", "12A", "15", "18", "R18", "U"];
const MPA: [&str; 9] = [
    "G",
    "PG",
    "PG-13",
    "R",
    "NC-17",
    "NR",
    "NO RATING",
    "NOT RATED",
    "UR",
];
const GSRR: [&str; 5] = ["0+", "6+", "12+", "15+", "18+"];

pub const METASCORE_SYSTEM: &str = "Metascore";

/// Switches that change how details are mapped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuideOptions {
    /// One category per subgenre instead of one per genre
    pub expand_genres: bool,
    pub add_tv_rating_icon: bool,
    pub icon_theme: IconTheme,
    /// Root for posters that were not saved locally
    pub image_catalog_base: String,
}

impl Default for GuideOptions {
    fn default() -> Self {
        Self {
            expand_genres: true,
            add_tv_rating_icon: false,
            icon_theme: IconTheme::default(),
            image_catalog_base: DEFAULT_IMAGE_CATALOG_BASE.to_string(),
        }
    }
}

/// `%Y%m%d%H%M%S +0000` for an epoch timestamp in seconds
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y%m%d%H%M%S +0000")
        .to_string()
}

/// Date from air-date text such as `/Date(1654041600000)/`
///
/// The digits are epoch milliseconds; dropping the last three leaves seconds.
pub fn parse_air_date(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    let seconds = digits.get(..digits.len().checked_sub(3)?)?;
    let seconds: i64 = seconds.parse().ok()?;
    let date = DateTime::<Utc>::from_timestamp(seconds, 0)?;
    Some(date.format("%Y%m%d").to_string())
}

/// Air date if it parses, otherwise the release year padded with `0000`
pub fn programme_date(details: &ProgramDetails) -> Option<String> {
    details
        .episode_air_date
        .as_deref()
        .and_then(parse_air_date)
        .or_else(|| details.release_year.map(|year| format!("{year}0000")))
}

fn genre_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\w\s-]+&?\s?").expect("genre pattern is valid"))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Recase a lowercased subgenre: `action & adventure` becomes `Action & Adventure`
pub fn capitalize_genre(genre: &str) -> String {
    genre_word_pattern()
        .replace_all(genre, |caps: &regex::Captures| capitalize(&caps[0]))
        .into_owned()
}

/// Categories in genre id order
pub fn categories(details: &ProgramDetails, expand: bool) -> Vec<Text> {
    let mut genres: Vec<_> = details.genres.iter().collect();
    genres.sort_by_key(|genre| genre.id);

    if expand {
        genres
            .into_iter()
            .flat_map(|genre| genre.genres.iter())
            .map(|sub_genre| Text::new(capitalize_genre(sub_genre)))
            .collect()
    } else {
        genres
            .into_iter()
            .map(|genre| Text::new(genre.name.as_str()))
            .collect()
    }
}

/// `onscreen` and zero-based `xmltv_ns` episode numbers
///
/// A positional half is only written when its number is positive; the
/// positional form is left out when neither half survives.
pub fn episode_numbers(season: Option<i32>, episode: Option<i32>) -> Vec<EpisodeNum> {
    let onscreen = match (season, episode) {
        (Some(s), Some(e)) => format!("S{s:02}E{e:02}"),
        (Some(s), None) => format!("S{s:02}E--"),
        (None, Some(e)) => format!("S--E{e:02}"),
        (None, None) => return Vec::new(),
    };

    let half = |n: Option<i32>| n.filter(|n| *n > 0).map(|n| (n - 1).to_string());
    let (season_half, episode_half) = (half(season), half(episode));

    let mut numbers = vec![EpisodeNum {
        system: "onscreen",
        value: onscreen,
    }];
    if season_half.is_some() || episode_half.is_some() {
        numbers.push(EpisodeNum {
            system: "xmltv_ns",
            value: format!(
                "{}.{}.",
                season_half.unwrap_or_default(),
                episode_half.unwrap_or_default()
            ),
        });
    }
    numbers
}

/// Rating system an uppercased rating code belongs to
pub fn rating_system(rating: &str) -> Option<&'static str> {
    if VCHIP.contains(&rating) {
        Some("VCHIP")
    } else if BBFC.contains(&rating) {
        Some("BBFC")
    } else if MPA.contains(&rating) {
        Some("MPA")
    } else if GSRR.contains(&rating) {
        Some("GSRR")
    } else {
        None
    }
}

/// Maps program details to programmes, collecting non-fatal problems
pub struct ProgrammeMapper<'a> {
    pub options: &'a GuideOptions,
    pub icons: &'a IconCatalog,
}

impl ProgrammeMapper<'_> {
    pub fn map(
        &self,
        details: &ProgramDetails,
        lang: &str,
        warnings: &mut Vec<MappingWarning>,
    ) -> Programme {
        let mut programme = Programme::new(Text::with_lang(details.name.as_str(), lang));

        programme.desc = details
            .description
            .as_deref()
            .filter(|d| !d.is_empty())
            .map(Text::new);
        programme.date = programme_date(details);
        programme.categories = categories(details, self.options.expand_genres);
        programme.length = details.duration.filter(|d| *d > 0);
        programme.sub_titles = details
            .episode_title
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| Text::new(t.as_str()))
            .collect();
        programme.episode_nums = episode_numbers(details.season_number, details.episode_number);
        programme.icons = details
            .images
            .iter()
            .map(|image| {
                Icon::new(
                    image.url(&self.options.image_catalog_base),
                    image.width,
                    image.height,
                )
            })
            .collect();

        if let Some(rating) = details.tv_rating.as_deref().filter(|r| !r.is_empty()) {
            programme.ratings.push(self.rating(rating, warnings));
        }

        if let Some(summary) = details.metacritic_summary.as_ref().filter(|m| m.score > 0) {
            let mut star = StarRating {
                system: Some(METASCORE_SYSTEM.to_string()),
                value: format!("{}/100", summary.score),
                icons: Vec::new(),
            };
            match self.icons.icon(METASCORE_MANIFEST, &summary.score.to_string()) {
                Ok(icon) => star.icons.push(icon),
                Err(warning) => warnings.push(warning),
            }
            programme.star_ratings.push(star);
        }

        programme
    }

    fn rating(&self, rating: &str, warnings: &mut Vec<MappingWarning>) -> Rating {
        let system = rating_system(rating);
        if system.is_none() {
            warnings.push(MappingWarning::UnknownRatingSystem {
                rating: rating.to_string(),
            });
        }

        let mut icons = Vec::new();
        if self.options.add_tv_rating_icon {
            match self.icons.icon(TV_RATING_MANIFEST, rating) {
                Ok(icon) => icons.push(icon),
                Err(warning) => warnings.push(warning),
            }
        }

        Rating {
            system: system.map(str::to_string),
            value: rating.to_string(),
            icons,
        }
    }
}
