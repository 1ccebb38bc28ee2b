use async_trait::async_trait;
use tracing::warn;

use super::{PipelineStage, StageContext, stage_names};
use crate::errors::{AppError, AppResult};
use crate::images::PosterProcessor;
use crate::models::Channel;

/// Local poster copies for programs with details
pub struct ImagesStage {
    processor: PosterProcessor,
}

impl ImagesStage {
    pub fn new(processor: PosterProcessor) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl PipelineStage for ImagesStage {
    fn name(&self) -> &'static str {
        stage_names::IMAGES
    }

    async fn run(&self, context: &StageContext, channels: &mut [Channel]) -> AppResult<usize> {
        if let Err(e) = self.processor.clear().await {
            warn!(
                "Failed to remove old posters in {}: {}",
                self.processor.posters_dir().display(),
                e
            );
        }

        let processor = &self.processor;
        let tasks = channels
            .iter_mut()
            .flat_map(|channel| channel.programs.iter_mut())
            .filter_map(|program| program.details.as_mut())
            .map(|details| async move {
                Ok::<_, AppError>(processor.process_all(&mut details.images).await)
            });

        let saved = context.limiter.run_all(tasks).await?;
        Ok(saved.into_iter().sum())
    }
}
