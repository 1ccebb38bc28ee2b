pub mod cache;
pub mod config;
pub mod errors;
pub mod fetcher;
pub mod guide;
pub mod images;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod xmltv;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use runner::{RunSummary, run, run_with_source};
