use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{PipelineStage, StageContext, stage_names};
use crate::errors::{AppError, AppResult, FetchError, FetchErrorKind, FetchResult};
use crate::fetcher::{RetryPolicy, TransientKinds};
use crate::models::{Channel, ShowsCast};

/// Component of the shows-cast page holding the cast and crew
pub const CAST_COMPONENT: &str = "tv-object-cast-and-crew";

/// Cast and crew for programs that have a cross-reference id
pub struct CastStage;

fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

pub(crate) fn parse_cast(url: &str, body: &[u8]) -> FetchResult<Option<ShowsCast>> {
    let page: Value = serde_json::from_slice(body).map_err(|e| FetchError::from_json(url, &e))?;

    let components = page
        .get("components")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for component in components {
        let name = component
            .get("meta")
            .and_then(|meta| meta.get("componentName"))
            .and_then(Value::as_str);
        if name != Some(CAST_COMPONENT) {
            continue;
        }
        match component.get("data") {
            Some(data) if !is_empty_data(data) => {
                let cast = ShowsCast::deserialize(data)
                    .map_err(|e| FetchError::from_json(url, &e))?;
                return Ok(Some(cast));
            }
            _ => {}
        }
    }

    Ok(Some(ShowsCast::empty()))
}

#[async_trait]
impl PipelineStage for CastStage {
    fn name(&self) -> &'static str {
        stage_names::CAST
    }

    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize> {
        let policy = RetryPolicy::metadata();
        let transient = TransientKinds::json().with(FetchErrorKind::Validation);
        let endpoints = &context.endpoints;

        let references: Vec<Option<i64>> = channels
            .iter()
            .flat_map(|channel| channel.programs.iter())
            .map(|program| program.details.as_ref().and_then(|details| details.mco_id))
            .collect();

        let tasks = references.iter().map(|mco_id| {
            let request = mco_id.map(|mco_id| {
                context.json_request(
                    format!("{}/{}/web?contentOnly=true", endpoints.cast_base, mco_id),
                    &endpoints.details_referer,
                )
            });
            let (policy, transient) = (&policy, &transient);
            async move {
                let Some(request) = request else {
                    return Ok(None);
                };
                context
                    .fetcher
                    .fetch(
                        &request,
                        policy,
                        transient,
                        |body| parse_cast(&request.url, body),
                        None,
                    )
                    .await
                    .into_result()
                    .map_err(AppError::from)
            }
        });

        let casts = context.limiter.run_all(tasks).await?;
        let mut found = 0;
        let programs = channels
            .iter_mut()
            .flat_map(|channel| channel.programs.iter_mut());
        for (program, cast) in programs.zip(casts) {
            if let Some(cast) = cast {
                found += 1;
                program.cast = Some(cast);
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cast_finds_component() {
        let body = br#"{
            "components": [
                {"meta": {"componentName": "tv-object-header"}, "data": {"id": "9"}},
                {"meta": {"componentName": "tv-object-cast-and-crew"}, "data": {
                    "id": "77",
                    "items": [
                        {"id": 1, "name": "Jane Doe", "role": "Detective", "type": "Actor"},
                        {"id": 2, "name": "John Roe", "role": null, "type": "Director"}
                    ]
                }}
            ]
        }"#;

        let cast = parse_cast("http://cast", body).unwrap().unwrap();
        assert_eq!(cast.id, "77");
        assert_eq!(cast.items.len(), 2);
        assert_eq!(cast.items[1].kind, "Director");
    }

    #[test]
    fn test_parse_cast_without_component_is_empty_cast() {
        let body = br#"{"components": [{"meta": {"componentName": "other"}, "data": {}}]}"#;
        assert_eq!(
            parse_cast("http://cast", body).unwrap(),
            Some(ShowsCast::empty())
        );

        let empty_data =
            br#"{"components": [{"meta": {"componentName": "tv-object-cast-and-crew"}, "data": {}}]}"#;
        assert_eq!(
            parse_cast("http://cast", empty_data).unwrap(),
            Some(ShowsCast::empty())
        );

        assert_eq!(parse_cast("http://cast", b"{}").unwrap(), Some(ShowsCast::empty()));
    }

    #[test]
    fn test_malformed_cast_data_is_validation_error() {
        let body = br#"{"components": [{"meta": {"componentName": "tv-object-cast-and-crew"}, "data": {"items": 5}}]}"#;
        let error = parse_cast("http://cast", body).unwrap_err();
        assert_eq!(error.kind, FetchErrorKind::Validation);
    }
}
