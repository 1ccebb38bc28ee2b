use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use super::{PipelineStage, StageContext, stage_names};
use crate::errors::{AppError, AppResult, FetchError, FetchErrorKind, FetchResult};
use crate::fetcher::{RetryPolicy, TransientKinds};
use crate::models::{Channel, Program};

/// Upcoming programs per channel
pub struct ListingStage;

#[derive(Deserialize)]
struct ListingResponse {
    /// Day key to the programs airing that day, in provider order
    #[serde(default)]
    items: IndexMap<String, Vec<Program>>,
}

pub(crate) fn parse_listing(url: &str, body: &[u8]) -> FetchResult<Vec<Program>> {
    let response: ListingResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::from_json(url, &e))?;
    Ok(response.items.into_values().flatten().collect())
}

#[async_trait]
impl PipelineStage for ListingStage {
    fn name(&self) -> &'static str {
        stage_names::LISTING
    }

    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize> {
        let now = Utc::now().timestamp();
        let policy = RetryPolicy::metadata();
        let transient = TransientKinds::json().with(FetchErrorKind::Validation);
        let endpoints = &context.endpoints;

        let tasks = channels.iter().map(|channel| {
            let request = channel.tvguide_id.as_deref().map(|id| {
                context.json_request(
                    format!("{}/{}.json?_={}", endpoints.listing_base, id, now),
                    &endpoints.listing_referer,
                )
            });
            let (policy, transient) = (&policy, &transient);
            async move {
                let Some(request) = request else {
                    debug!("Channel {} has no listing id", channel.id);
                    return Ok(Vec::new());
                };
                context
                    .fetcher
                    .fetch(
                        &request,
                        policy,
                        transient,
                        |body| parse_listing(&request.url, body),
                        Vec::new(),
                    )
                    .await
                    .into_result()
                    .map_err(AppError::from)
            }
        });

        let listings = context.limiter.run_all(tasks).await?;
        let mut total = 0;
        for (channel, programs) in channels.iter_mut().zip(listings) {
            total += programs.len();
            channel.programs = programs;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_concatenates_days() {
        let body = br#"{
            "items": {
                "2022-06-01": [
                    {"id": 1, "name": "Morning", "start_timestamp": 100, "end_timestamp": 200}
                ],
                "2022-06-02": [
                    {"id": 2, "name": "Evening", "start_timestamp": 300, "end_timestamp": 400},
                    {"id": 3, "name": "Night", "start_timestamp": 400, "end_timestamp": 500}
                ]
            }
        }"#;

        let programs = parse_listing("http://listing", body).unwrap();
        let ids: Vec<i64> = programs.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_listing_keeps_provider_day_order() {
        let body = br#"{
            "items": {
                "Thursday": [
                    {"id": 10, "name": "Late", "start_timestamp": 100, "end_timestamp": 200}
                ],
                "Friday": [
                    {"id": 20, "name": "Later", "start_timestamp": 300, "end_timestamp": 400}
                ],
                "2022-06-01": [
                    {"id": 30, "name": "Latest", "start_timestamp": 500, "end_timestamp": 600}
                ]
            }
        }"#;

        let programs = parse_listing("http://listing", body).unwrap();
        let ids: Vec<i64> = programs.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_parse_listing_without_items_is_empty() {
        assert!(parse_listing("http://listing", b"{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_listing_error_kinds() {
        let malformed = parse_listing("http://listing", b"{not json").unwrap_err();
        assert_eq!(malformed.kind, FetchErrorKind::Decode);

        let wrong_shape =
            parse_listing("http://listing", br#"{"items": {"d": [{"id": "x"}]}}"#).unwrap_err();
        assert_eq!(wrong_shape.kind, FetchErrorKind::Validation);
    }
}
