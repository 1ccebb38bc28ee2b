//! Program details and cast payloads of the guide provider

use serde::{Deserialize, Deserializer, Serialize};

/// Bucket type of posters that were saved locally
pub const LOCAL_BUCKET: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageType {
    pub type_id: i64,
    /// e.g. "showcard", "key art"
    pub type_name: String,
    #[serde(default)]
    pub provider_type_name: Option<String>,
}

/// Poster attached to a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub id: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub image_type: Option<ImageType>,
    pub bucket_type: String,
    /// Provider-relative path, or an absolute URL once saved locally
    pub bucket_path: String,
    #[serde(default)]
    pub filename: String,
    pub width: u32,
    pub height: u32,
}

impl ImageAsset {
    pub fn is_local(&self) -> bool {
        self.bucket_type == LOCAL_BUCKET
    }

    /// Location of the image; remote paths are resolved against `catalog_base`
    pub fn url(&self, catalog_base: &str) -> String {
        if self.is_local() {
            self.bucket_path.clone()
        } else {
            format!(
                "{}/{}",
                catalog_base.trim_end_matches('/'),
                self.bucket_path.trim_start_matches('/')
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
    /// Lowercased subgenre names
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetacriticSummary {
    #[serde(default)]
    pub url: Option<String>,
    pub score: i64,
    #[serde(default)]
    pub review_count: i64,
}

/// Extended program metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramDetails {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_sports_event: bool,
    #[serde(default)]
    pub rating: Option<String>,
    /// Always uppercased
    #[serde(default, deserialize_with = "uppercase_rating")]
    pub tv_rating: Option<String>,
    #[serde(default)]
    pub episode_title: Option<String>,
    #[serde(default)]
    pub release_year: Option<i32>,
    /// Text of the form `/Date(<epoch millis>)/`
    #[serde(default)]
    pub episode_air_date: Option<String>,
    #[serde(default)]
    pub episode_number: Option<i32>,
    #[serde(default)]
    pub season_number: Option<i32>,
    /// Cross-reference id for the cast page
    #[serde(default)]
    pub mco_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub images: Vec<ImageAsset>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    /// Seconds, without commercials
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub metacritic_summary: Option<MetacriticSummary>,
}

fn uppercase_rating<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.map(|v| v.to_uppercase()))
}

/// One person from the cast and crew page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastItem {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Free-form role type, compared case-insensitively
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowsCast {
    pub id: String,
    #[serde(default)]
    pub items: Vec<CastItem>,
}

impl ShowsCast {
    /// Cast of a page without a cast and crew section
    pub fn empty() -> Self {
        Self {
            id: "0".to_string(),
            items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_parsing_uppercases_rating() {
        let details: ProgramDetails = serde_json::from_str(
            r#"{
                "id": 42,
                "name": "Show",
                "tvRating": "tv-pg",
                "seasonNumber": 2,
                "episodeNumber": null,
                "mcoId": 900,
                "images": [{
                    "id": "1", "provider": "tvg", "bucketType": "catalog",
                    "bucketPath": "/a/b.jpg", "filename": "b.jpg", "width": 10, "height": 20
                }],
                "genres": [{"id": 3, "name": "Drama", "genres": ["crime drama"]}],
                "metacriticSummary": {"url": null, "score": 71, "reviewCount": 12}
            }"#,
        )
        .unwrap();

        assert_eq!(details.tv_rating.as_deref(), Some("TV-PG"));
        assert_eq!(details.season_number, Some(2));
        assert_eq!(details.episode_number, None);
        assert_eq!(details.mco_id, Some(900));
        assert_eq!(details.metacritic_summary.unwrap().score, 71);
    }

    #[test]
    fn test_image_url_for_remote_and_local() {
        let mut image = ImageAsset {
            id: "1".to_string(),
            provider: "tvg".to_string(),
            image_type: None,
            bucket_type: "catalog".to_string(),
            bucket_path: "/x/y.jpg".to_string(),
            filename: "y.jpg".to_string(),
            width: 1,
            height: 1,
        };
        assert_eq!(
            image.url("https://www.tvguide.com/a/img/catalog/"),
            "https://www.tvguide.com/a/img/catalog/x/y.jpg"
        );
        assert_eq!(image.url("http://mirror/img"), "http://mirror/img/x/y.jpg");

        image.bucket_type = LOCAL_BUCKET.to_string();
        image.bucket_path = "http://host/images/posters/x/y.jpg".to_string();
        assert_eq!(image.url("http://mirror/img"), "http://host/images/posters/x/y.jpg");
    }

    #[test]
    fn test_cast_parsing() {
        let cast: ShowsCast = serde_json::from_str(
            r#"{"id": "5", "items": [{"id": 1, "name": "A", "role": "Hero", "type": "Actor"}]}"#,
        )
        .unwrap();
        assert_eq!(cast.items[0].kind, "Actor");
        assert!(ShowsCast::empty().items.is_empty());
    }
}
