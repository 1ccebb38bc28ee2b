//! Records that flow through the pipeline
//!
//! Channels are loaded once from the channel list and then filled in place by
//! each pipeline stage: listings add programs, later stages attach details,
//! cast and tags to those programs.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

pub mod tvguide;

pub use tvguide::*;

/// A channel from the channel list, plus the programs collected for it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    /// Identifier used for the channel in the guide document
    pub stream_id: String,
    pub name: String,
    pub language: String,
    /// Listing provider id; channels without one have no listing
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub tvguide_id: Option<String>,
    #[serde(skip)]
    pub programs: Vec<Program>,
}

impl Channel {
    pub fn new(id: &str, stream_id: &str, name: &str, language: &str) -> Self {
        Self {
            id: id.to_string(),
            stream_id: stream_id.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            tvguide_id: None,
            programs: Vec::new(),
        }
    }
}

/// Program markers derived from the airing attributes of the schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramTag {
    New,
    Live,
}

/// An upcoming program from a channel listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub name: String,
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(skip)]
    pub tags: BTreeSet<ProgramTag>,
    /// Extended metadata; `None` when unavailable
    #[serde(skip)]
    pub details: Option<ProgramDetails>,
    /// Cast and crew; `Some` with no items when the page has no cast section
    #[serde(skip)]
    pub cast: Option<ShowsCast>,
}

impl Program {
    pub fn new(id: i64, name: &str, start_timestamp: i64, end_timestamp: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            start_timestamp,
            end_timestamp,
            image: None,
            description: None,
            day: None,
            start_time: None,
            end_time: None,
            tags: BTreeSet::new(),
            details: None,
            cast: None,
        }
    }

    pub fn has_tag(&self, tag: ProgramTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Accept ids written either as JSON strings or numbers
fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
