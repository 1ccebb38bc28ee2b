use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::errors::AppResult;
use crate::images::PosterProcessor;
use crate::models::Channel;
use crate::pipeline::stages::{
    CastStage, DetailsStage, ImagesStage, ListingStage, PipelineStage, StageContext, TagsStage,
};

/// Outcome of one completed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: &'static str,
    pub items: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn items(&self, stage: &str) -> Option<usize> {
        self.stages.iter().find(|s| s.name == stage).map(|s| s.items)
    }
}

/// Runs stages strictly in order over a shared channel list
pub struct EpgPipeline {
    context: StageContext,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl EpgPipeline {
    pub fn new(context: StageContext) -> Self {
        Self {
            context,
            stages: Vec::new(),
        }
    }

    /// Listing, details, cast, images, tags
    pub fn standard(context: StageContext, posters: PosterProcessor) -> Self {
        Self::new(context)
            .with_stage(ListingStage)
            .with_stage(DetailsStage)
            .with_stage(CastStage)
            .with_stage(ImagesStage::new(posters))
            .with_stage(TagsStage)
    }

    pub fn with_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run every stage; a stage error stops the pipeline
    pub async fn run(&self, channels: &mut [Channel]) -> AppResult<PipelineReport> {
        let mut report = PipelineReport::default();
        let pipeline_start = Instant::now();
        info!(
            "Starting pipeline for {} channels with {} stages (parallel={})",
            channels.len(),
            self.stages.len(),
            self.context.limiter.limit()
        );

        for stage in &self.stages {
            let stage_start = Instant::now();
            info!("Starting {} stage", stage.name());

            let items = match stage.run(&self.context, channels).await {
                Ok(items) => items,
                Err(e) => {
                    error!("Stage {} failed: {}", stage.name(), e);
                    return Err(e);
                }
            };

            let elapsed = stage_start.elapsed();
            info!(
                "Completed {} stage: {} items in {:?}",
                stage.name(),
                items,
                elapsed
            );
            report.stages.push(StageReport {
                name: stage.name(),
                items,
                elapsed,
            });
        }

        info!("Pipeline completed in {:?}", pipeline_start.elapsed());
        Ok(report)
    }
}
