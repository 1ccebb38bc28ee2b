use async_trait::async_trait;
use serde::Deserialize;

use super::{PipelineStage, StageContext, stage_names};
use crate::errors::{AppError, AppResult, FetchError, FetchErrorKind, FetchResult};
use crate::fetcher::{RetryPolicy, TransientKinds};
use crate::models::{Channel, ProgramDetails};

/// Extended metadata for every listed program
pub struct DetailsStage;

#[derive(Deserialize)]
struct DetailsResponse {
    data: DetailsData,
}

#[derive(Deserialize)]
struct DetailsData {
    item: ProgramDetails,
}

pub(crate) fn parse_details(url: &str, body: &[u8]) -> FetchResult<Option<ProgramDetails>> {
    let response: DetailsResponse =
        serde_json::from_slice(body).map_err(|e| FetchError::from_json(url, &e))?;
    Ok(Some(response.data.item))
}

#[async_trait]
impl PipelineStage for DetailsStage {
    fn name(&self) -> &'static str {
        stage_names::DETAILS
    }

    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize> {
        let policy = RetryPolicy::metadata();
        let transient = TransientKinds::json().with(FetchErrorKind::Validation);
        let endpoints = &context.endpoints;

        let program_ids: Vec<i64> = channels
            .iter()
            .flat_map(|channel| channel.programs.iter().map(|program| program.id))
            .collect();

        let tasks = program_ids.iter().map(|id| {
            let request = context.json_request(
                format!("{}/{}/web", endpoints.details_base, id),
                &endpoints.details_referer,
            );
            let (policy, transient) = (&policy, &transient);
            async move {
                context
                    .fetcher
                    .fetch(
                        &request,
                        policy,
                        transient,
                        |body| parse_details(&request.url, body),
                        None,
                    )
                    .await
                    .into_result()
                    .map_err(AppError::from)
            }
        });

        let details = context.limiter.run_all(tasks).await?;
        let mut found = 0;
        let programs = channels
            .iter_mut()
            .flat_map(|channel| channel.programs.iter_mut());
        for (program, details) in programs.zip(details) {
            found += usize::from(details.is_some());
            program.details = details;
        }
        Ok(found)
    }
}
