use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::{PipelineStage, StageContext, stage_names};
use crate::errors::{AppResult, FetchError, FetchErrorKind, FetchResult};
use crate::fetcher::{RetryPolicy, TransientKinds};
use crate::models::{Channel, ProgramTag};

/// Airing attribute bit marking a live broadcast
pub const LIVE_BIT: u32 = 0b1;
/// Airing attribute bit marking a first-run episode
pub const NEW_BIT: u32 = 0b100;

/// Schedule window looked at for airing attributes, in minutes
const WINDOW_MINUTES: i64 = 12 * 60;
const WINDOW_LEAD_MINUTES: i64 = 30;

/// `new`/`live` markers from the provider schedule
pub struct TagsStage;

#[derive(Deserialize)]
struct ScheduleResponse {
    data: ScheduleData,
}

#[derive(Deserialize)]
struct ScheduleData {
    items: Vec<ScheduleItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleItem {
    #[serde(default)]
    program_schedules: Vec<ProgramSchedule>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramSchedule {
    #[serde(default)]
    program_id: Option<i64>,
    #[serde(default)]
    airing_attrib: Option<u32>,
}

/// Program id to airing attribute mask, skipping zero and missing entries
pub(crate) fn parse_schedule(url: &str, body: &[u8]) -> FetchResult<HashMap<i64, u32>> {
    let response: ScheduleResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::from_json(url, &e))?;

    Ok(response
        .data
        .items
        .into_iter()
        .flat_map(|item| item.program_schedules)
        .filter_map(|schedule| match (schedule.program_id, schedule.airing_attrib) {
            (Some(id), Some(mask)) if id != 0 && mask != 0 => Some((id, mask)),
            _ => None,
        })
        .collect())
}

/// Tags encoded in an airing attribute mask
pub fn tags_from_mask(mask: u32) -> BTreeSet<ProgramTag> {
    let mut tags = BTreeSet::new();
    if mask & NEW_BIT != 0 {
        tags.insert(ProgramTag::New);
    }
    if mask & LIVE_BIT != 0 {
        tags.insert(ProgramTag::Live);
    }
    tags
}

/// Apply tags to every program whose id appears in `masks`
pub fn apply_tags(channels: &mut [Channel], masks: &HashMap<i64, u32>) -> usize {
    let mut tagged = 0;
    for program in channels.iter_mut().flat_map(|c| c.programs.iter_mut()) {
        if let Some(mask) = masks.get(&program.id) {
            let tags = tags_from_mask(*mask);
            if !tags.is_empty() {
                tagged += 1;
                program.tags.extend(tags);
            }
        }
    }
    tagged
}

#[async_trait]
impl PipelineStage for TagsStage {
    fn name(&self) -> &'static str {
        stage_names::TAGS
    }

    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize> {
        let endpoints = &context.endpoints;
        let start = (Utc::now() - ChronoDuration::minutes(WINDOW_LEAD_MINUTES)).timestamp();
        let request = context.json_request(
            format!(
                "{}/{}/web?start={}&duration={}",
                endpoints.tags_base, endpoints.tags_provider_id, start, WINDOW_MINUTES
            ),
            &endpoints.tags_referer,
        );

        let masks = context
            .fetcher
            .fetch(
                &request,
                &RetryPolicy::metadata(),
                &TransientKinds::json().with(FetchErrorKind::Validation),
                |body| parse_schedule(&request.url, body),
                HashMap::new(),
            )
            .await
            .into_result()?;

        debug!("Schedule window has {} attributed programs", masks.len());
        Ok(apply_tags(channels, &masks))
    }
}
