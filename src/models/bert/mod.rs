/// BERT for Taxonomic Classification Configuration
pub mod config;

/// BERT with chained per-rank classification heads
pub mod model;

/// Training routine
pub mod train;

pub use config::{Config, HeadConfig};
pub use model::{Model, ModelRecord};
