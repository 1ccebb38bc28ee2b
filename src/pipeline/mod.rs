//! Multi-stage acquisition pipeline
//!
//! - **Limiter**: bounded in-flight execution with ordered results
//! - **Stages**: listing, details, cast, images and tags enrichment
//! - **Orchestrator**: runs the stages in order over one channel list

pub mod limiter;
pub mod orchestrator;
pub mod stages;

pub use limiter::ConcurrencyLimiter;
pub use orchestrator::{EpgPipeline, PipelineReport, StageReport};
pub use stages::{PipelineStage, StageContext, stage_names};
