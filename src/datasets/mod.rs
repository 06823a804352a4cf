use async_trait::async_trait;

/// CSV-backed datasets of raw sequences and their taxids
pub mod sequences;

pub use sequences::{Item, LabeledItem, SequenceDataset};

/// A dataset which can be loaded
#[async_trait]
pub trait LoadableDataset<I>: burn::data::dataset::Dataset<I> {
    /// Load the named dataset's split (e.g. "train" or "test") from the data directory
    async fn load(data_dir: &str, name: &str, mode: &str) -> Result<Self, DatasetError>
    where
        Self: std::marker::Sized;
}

/// Dataset Error
#[derive(thiserror::Error, Debug)]
pub enum DatasetError {
    /// The split file does not exist
    #[error("no dataset split found at {0}")]
    Missing(String),

    /// Reading or parsing the CSV file failed
    #[error("unable to read dataset {path}: {source}")]
    Read {
        /// Path to the split file
        path: String,
        /// The underlying CSV error
        source: std::io::Error,
    },
}
