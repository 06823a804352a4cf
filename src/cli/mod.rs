/// Available pipelines
pub mod pipelines;

/// Encoder settings from the command line
pub mod encoder;

pub use encoder::{EncoderArgsError, EncoderOverrides};
pub use pipelines::{Pipeline, PipelineError};
