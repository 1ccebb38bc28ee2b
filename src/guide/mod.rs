//! Transformation of enriched channels into an XMLTV document
//!
//! The mapping is pure: the same channels, icon manifests and generation time
//! always give the same document. Problems that should not stop the run
//! (unknown rating codes, icons missing from a manifest) are logged and
//! returned alongside the document as [`MappingWarning`]s.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::Config;
use crate::config::defaults::{GENERATOR_NAME, GENERATOR_URL};
use crate::errors::MappingWarning;
use crate::models::{Channel, Program, ProgramTag};
use crate::xmltv::{Programme, Text, Tv, TvChannel};

pub mod credits;
pub mod icons;
pub mod programme;

pub use credits::CreditQuota;
pub use icons::{IconCatalog, IconInfo, IconManifest, METASCORE_MANIFEST, TV_RATING_MANIFEST};
pub use programme::{GuideOptions, ProgrammeMapper};

/// Guide document plus the warnings collected while building it
#[derive(Debug, Clone)]
pub struct GuideDocument {
    pub tv: Tv,
    pub warnings: Vec<MappingWarning>,
}

pub struct GuideBuilder {
    base_url: String,
    options: GuideOptions,
    icons: IconCatalog,
    quota: CreditQuota,
}

impl GuideBuilder {
    pub fn new(base_url: &str, options: GuideOptions, icons: IconCatalog) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            icons,
            quota: CreditQuota::default(),
        }
    }

    /// Builder with the manifests from the configured icons directory
    pub fn from_config(config: &Config) -> Self {
        let options = GuideOptions {
            expand_genres: config.guide.expand_genres,
            add_tv_rating_icon: config.guide.add_tv_rating_icon,
            icon_theme: config.guide.icon_theme,
            image_catalog_base: config.endpoints.image_catalog_base.clone(),
        };
        let config = &config.guide;
        let icons = IconCatalog::load(
            &config.icons_path,
            &config.base_url,
            &[
                config.icon_theme.channel_manifest(),
                TV_RATING_MANIFEST,
                METASCORE_MANIFEST,
            ],
        );
        Self::new(&config.base_url, options, icons)
    }

    pub fn with_quota(mut self, quota: CreditQuota) -> Self {
        self.quota = quota;
        self
    }

    pub fn build(&self, channels: &[Channel], generated_at: DateTime<Utc>) -> GuideDocument {
        let mut warnings = Vec::new();
        let mut tv = Tv {
            date: generated_at.format("%Y%m%d%H%M%S").to_string(),
            generator_name: GENERATOR_NAME.to_string(),
            generator_url: GENERATOR_URL.to_string(),
            schema_location: Some(format!("{}/resources/xmltv.xsd", self.base_url)),
            channels: Vec::with_capacity(channels.len()),
            programmes: Vec::new(),
        };

        let mapper = ProgrammeMapper {
            options: &self.options,
            icons: &self.icons,
        };
        let channel_manifest = self.options.icon_theme.channel_manifest();

        for channel in channels {
            let mut tv_channel = TvChannel {
                id: channel.stream_id.clone(),
                display_name: channel.name.clone(),
                icons: Vec::new(),
            };
            match self.icons.icon(channel_manifest, &channel.stream_id) {
                Ok(icon) => tv_channel.icons.push(icon),
                Err(warning) => warnings.push(warning),
            }
            tv.channels.push(tv_channel);

            for program in &channel.programs {
                tv.programmes
                    .push(self.programme(&mapper, channel, program, &mut warnings));
            }
        }

        for warning in &warnings {
            warn!("{}", warning);
        }
        debug!(
            "Built guide with {} channels, {} programmes and {} warnings",
            tv.channels.len(),
            tv.programmes.len(),
            warnings.len()
        );

        GuideDocument { tv, warnings }
    }

    fn programme(
        &self,
        mapper: &ProgrammeMapper<'_>,
        channel: &Channel,
        program: &Program,
        warnings: &mut Vec<MappingWarning>,
    ) -> Programme {
        let mut programme = match &program.details {
            Some(details) => mapper.map(details, &channel.language, warnings),
            None => Programme::new(Text::new(program.name.as_str())),
        };

        programme.channel = channel.stream_id.clone();
        programme.start = programme::format_timestamp(program.start_timestamp);
        programme.stop = programme::format_timestamp(program.end_timestamp);
        programme.new = program.has_tag(ProgramTag::New);
        programme.live = program.has_tag(ProgramTag::Live);
        if let Some(cast) = &program.cast {
            programme.credits = self.quota.allocate(&cast.items);
        }
        programme
    }
}
