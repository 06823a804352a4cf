/// Batcher
pub mod batcher;

/// Training output adapted for metrics
pub mod output;

/// Taxonomic Classification Training
pub mod training;

/// Prediction and evaluation over labeled datasets
pub mod predict;

/// Taxonomic Classification Inference
pub mod inference;

pub use batcher::Batcher;
pub use inference::{infer, load_trained, top_labels};
pub use output::Output;
pub use predict::{predict, PredictConfig, Prediction};
pub use training::train;

/// The unique string token that identifies this pipeline's artifacts
pub static PIPELINE: &str = "taxonomic-classification";
