//! XMLTV document model and writer

pub mod model;
pub mod writer;

pub use model::*;
pub use writer::{archive_path, render, write_guide};
