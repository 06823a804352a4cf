use std::path::Path;

use async_trait::async_trait;
use burn::data::dataset::{self, Dataset as _, InMemDataset};
use derive_new::new;
use log::info;
use serde::{Deserialize, Serialize};

use crate::taxonomy::{Lineage, Rank};

use super::{DatasetError, LoadableDataset};

/// A raw sequence and the taxid it was sampled from
#[derive(Clone, Debug, Serialize, Deserialize, new)]
pub struct Item {
    /// The raw nucleotide sequence
    pub sequence: String,

    /// NCBI taxonomy id of the source organism
    pub taxid: u32,
}

/// A raw sequence with one class label per rank
#[derive(Clone, Debug, PartialEq, new)]
pub struct LabeledItem {
    /// The raw nucleotide sequence
    pub sequence: String,

    /// Class names, in rank order
    pub labels: Vec<String>,
}

impl LabeledItem {
    /// Resolve an item's labels through a lineage
    pub fn from_item<L: Lineage + ?Sized>(item: Item, lineage: &L, ranks: &[Rank]) -> Self {
        let labels = lineage
            .ranks(item.taxid, ranks)
            .into_iter()
            .map(|taxon| taxon.name)
            .collect();

        Self {
            sequence: item.sequence,
            labels,
        }
    }
}

/// Struct for a dataset of sequences read from `sequence,taxid` CSV files
pub struct SequenceDataset {
    /// Underlying In-Memory dataset
    dataset: InMemDataset<Item>,
}

/// Implement the Dataset trait for the sequence dataset
impl dataset::Dataset<Item> for SequenceDataset {
    /// Returns a specific item from the dataset
    fn get(&self, index: usize) -> Option<Item> {
        self.dataset.get(index)
    }

    /// Returns the length of the dataset
    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl SequenceDataset {
    /// Wrap items that are already in memory
    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            dataset: InMemDataset::new(items),
        }
    }

    /// Resolve every item's labels through the lineage
    pub fn labeled<L: Lineage + ?Sized>(
        &self,
        lineage: &L,
        ranks: &[Rank],
    ) -> InMemDataset<LabeledItem> {
        InMemDataset::new(self.labeled_items(lineage, ranks))
    }

    /// Resolve every item's labels through the lineage, keeping them as a plain list
    pub fn labeled_items<L: Lineage + ?Sized>(
        &self,
        lineage: &L,
        ranks: &[Rank],
    ) -> Vec<LabeledItem> {
        self.dataset
            .iter()
            .map(|item| LabeledItem::from_item(item, lineage, ranks))
            .collect()
    }

    /// The taxids of every item, in order
    pub fn taxids(&self) -> Vec<u32> {
        self.dataset.iter().map(|item| item.taxid).collect()
    }
}

#[async_trait]
impl LoadableDataset<Item> for SequenceDataset {
    /// Constructs the dataset for a mode (either "train" or "test")
    async fn load(data_dir: &str, name: &str, mode: &str) -> Result<Self, DatasetError> {
        let path = format!("{}/datasets/{}/{}.csv", data_dir, name, mode);

        if !Path::new(&path).is_file() {
            return Err(DatasetError::Missing(path));
        }

        let reader = csv::ReaderBuilder::new();

        let dataset: InMemDataset<Item> = InMemDataset::from_csv(&path, &reader)
            .map_err(|source| DatasetError::Read {
                path: path.clone(),
                source,
            })?;

        info!("Loaded {} sequences from {}", dataset.len(), path);

        Ok(Self { dataset })
    }
}
