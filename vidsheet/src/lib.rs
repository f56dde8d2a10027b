//! Contact sheets for videos: a grid of frames sampled at random times, each labeled with
//! the time it was taken at.

pub mod compositor;
pub mod config;
pub mod label;
pub mod pipeline;
pub mod sampler;
pub mod sink;
pub mod source;
pub mod video_handle;

pub use config::SheetConfig;
pub use pipeline::{ContactSheet, Pipeline, PipelineError};
