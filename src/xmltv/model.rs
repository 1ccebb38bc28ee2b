//! XMLTV document model
//!
//! Only the parts of the XMLTV schema the guide builder produces are modelled.
//! Field order in [`Programme`] follows the element order the writer emits.

use std::fmt;

/// Root `<tv>` element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tv {
    /// `%Y%m%d%H%M%S`
    pub date: String,
    pub generator_name: String,
    pub generator_url: String,
    /// Written as `xsi:noNamespaceSchemaLocation`
    pub schema_location: Option<String>,
    pub channels: Vec<TvChannel>,
    pub programmes: Vec<Programme>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TvChannel {
    pub id: String,
    pub display_name: String,
    pub icons: Vec<Icon>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub src: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Icon {
    pub fn new<S: Into<String>>(src: S, width: u32, height: u32) -> Self {
        Self {
            src: src.into(),
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Text with an optional language attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub value: String,
    pub lang: Option<String>,
}

impl Text {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            value: value.into(),
            lang: None,
        }
    }

    pub fn with_lang<S: Into<String>, L: Into<String>>(value: S, lang: L) -> Self {
        Self {
            value: value.into(),
            lang: Some(lang.into()),
        }
    }
}

/// Credit roles in the order XMLTV lists them inside `<credits>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CreditRole {
    Director,
    Actor,
    Writer,
    Adapter,
    Producer,
    Composer,
    Editor,
    Presenter,
    Commentator,
    Guest,
}

impl CreditRole {
    pub const ALL: [CreditRole; 10] = [
        Self::Director,
        Self::Actor,
        Self::Writer,
        Self::Adapter,
        Self::Producer,
        Self::Composer,
        Self::Editor,
        Self::Presenter,
        Self::Commentator,
        Self::Guest,
    ];

    /// Element name inside `<credits>`
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Writer => "writer",
            Self::Adapter => "adapter",
            Self::Producer => "producer",
            Self::Composer => "composer",
            Self::Editor => "editor",
            Self::Presenter => "presenter",
            Self::Commentator => "commentator",
            Self::Guest => "guest",
        }
    }

    /// Case-insensitive lookup of a free-form role type
    pub fn from_kind(kind: &str) -> Option<Self> {
        let kind = kind.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.tag().eq_ignore_ascii_case(kind))
    }
}

impl fmt::Display for CreditRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub role: CreditRole,
    pub name: String,
    /// Character played; only written for actors
    pub character: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeNum {
    /// `onscreen` or `xmltv_ns`
    pub system: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rating {
    pub system: Option<String>,
    pub value: String,
    pub icons: Vec<Icon>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarRating {
    pub system: Option<String>,
    pub value: String,
    pub icons: Vec<Icon>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Programme {
    /// `%Y%m%d%H%M%S +0000`
    pub start: String,
    pub stop: String,
    pub channel: String,
    pub titles: Vec<Text>,
    pub sub_titles: Vec<Text>,
    pub desc: Option<Text>,
    /// Grouped by role in [`CreditRole`] order
    pub credits: Vec<Credit>,
    /// `%Y%m%d`, or a year padded with `0000`
    pub date: Option<String>,
    pub categories: Vec<Text>,
    /// Seconds
    pub length: Option<i64>,
    pub icons: Vec<Icon>,
    pub episode_nums: Vec<EpisodeNum>,
    pub new: bool,
    pub ratings: Vec<Rating>,
    pub star_ratings: Vec<StarRating>,
    pub live: bool,
}

impl Programme {
    pub fn new(title: Text) -> Self {
        Self {
            titles: vec![title],
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_role_lookup_ignores_case() {
        assert_eq!(CreditRole::from_kind("Actor"), Some(CreditRole::Actor));
        assert_eq!(CreditRole::from_kind("DIRECTOR"), Some(CreditRole::Director));
        assert_eq!(CreditRole::from_kind("Host"), None);
        assert_eq!(CreditRole::from_kind(""), None);
    }

    #[test]
    fn test_credit_roles_are_in_document_order() {
        let mut sorted = CreditRole::ALL;
        sorted.sort();
        assert_eq!(sorted, CreditRole::ALL);
        assert_eq!(CreditRole::Guest.to_string(), "guest");
    }
}
