//! Adapt pretrained BERT to per-rank taxonomic classification

use std::{collections::BTreeMap, path::PathBuf};

use bert_burn::model::BertModelConfig;
use burn::{config::Config as _, nn::LinearConfig, tensor::backend::Backend};
use log::info;

use crate::{
    taxonomy::{Rank, UNKNOWN},
    tokens::EncoderConfig,
};

use super::Model;

/// Number of classes of a single-level head when nothing else is known
pub const DEFAULT_SINGLE_CLASSES: usize = 4;

/// Number of classes per head of a hierarchical model when nothing else is known
pub const DEFAULT_MULTI_TAX_CLASSES: [usize; 3] = [4, 30, 100];

/// A classification head for one taxonomic rank
#[derive(burn::config::Config, Debug)]
pub struct HeadConfig {
    /// The rank this head predicts
    pub rank: Rank,

    /// A map from class ids to class name labels
    pub id2label: BTreeMap<usize, String>,
}

impl HeadConfig {
    /// Build a head over the given labels, in order
    pub fn from_labels(rank: Rank, labels: &[String]) -> Self {
        let id2label = labels
            .iter()
            .enumerate()
            .map(|(i, s)| (i, s.trim().to_string()))
            .collect();

        Self::new(rank, id2label)
    }

    /// Build a head whose labels are just the class indexes
    pub fn anonymous(rank: Rank, n_classes: usize) -> Self {
        let labels: Vec<String> = (0..n_classes).map(|i| i.to_string()).collect();

        Self::from_labels(rank, &labels)
    }

    /// Total number of classes
    pub fn n_classes(&self) -> usize {
        self.id2label.len()
    }

    /// Class labels in id order
    pub fn labels(&self) -> Vec<String> {
        self.id2label.values().cloned().collect()
    }

    /// A reverse map from class name labels to class ids
    pub fn label2id(&self) -> BTreeMap<String, usize> {
        self.id2label
            .iter()
            .map(|(id, label)| (label.clone(), *id))
            .collect()
    }

    /// The class id that labels missing from this head fall back to
    pub fn unknown_id(&self) -> usize {
        self.label2id().get(UNKNOWN).copied().unwrap_or(0)
    }
}

/// The Model Configuration
#[derive(burn::config::Config)]
pub struct Config {
    /// The base BERT config
    pub model: BertModelConfig,

    /// Classification heads, from the most general rank to the most specific
    pub heads: Vec<HeadConfig>,

    /// How raw sequences are encoded for this model
    pub encoder: EncoderConfig,
}

impl Config {
    /// Combine a pretrained BERT config with classification heads, checking that they fit together
    pub fn new_with_heads(
        model: BertModelConfig,
        heads: Vec<HeadConfig>,
        encoder: EncoderConfig,
    ) -> anyhow::Result<Self> {
        if heads.is_empty() {
            return Err(anyhow!("At least one classification head is required"));
        }

        if let Some(head) = heads.iter().find(|head| head.n_classes() == 0) {
            return Err(anyhow!(
                "Classes are not defined for the {} head",
                head.rank
            ));
        }

        let vocab_size = encoder.init().tokens.len();
        if model.vocab_size < vocab_size {
            return Err(anyhow!(
                "The pretrained vocabulary holds {} tokens, but {}-mers over {:?} need {}",
                model.vocab_size,
                encoder.k,
                encoder.alphabet,
                vocab_size
            ));
        }

        let max_length = encoder.max_length();
        if model.max_position_embeddings < max_length {
            return Err(anyhow!(
                "Encoded sequences are {} tokens wide, but the model only embeds {} positions",
                max_length,
                model.max_position_embeddings
            ));
        }

        Ok(Config::new(model, heads, encoder))
    }

    /// The ranks predicted by each head, in order
    pub fn ranks(&self) -> Vec<Rank> {
        self.heads.iter().map(|head| head.rank).collect()
    }

    /// Initializes a Bert model with default weights and freshly initialized heads.
    ///
    /// The first head reads the pooled output alone. Every later head reads the pooled output
    /// concatenated with the class probabilities of the head before it.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let model = self.model.init(device);

        let mut heads = Vec::with_capacity(self.heads.len());
        let mut previous = 0;

        for head in &self.heads {
            let n_classes = head.n_classes();

            heads.push(LinearConfig::new(self.model.hidden_size + previous, n_classes).init(device));

            previous = n_classes;
        }

        Model { model, heads }
    }
}

/// Load a pretrained BERT config, enabling the pooling layer the heads are attached to
pub fn load_pretrained(config_file: PathBuf) -> anyhow::Result<BertModelConfig> {
    let mut bert_config = BertModelConfig::load(&config_file)
        .map_err(|e| anyhow!("Unable to load Hugging Face Config file: {}", e))?;

    // Enable the pooling layer for sequence classification
    bert_config.with_pooling_layer = Some(true);

    info!(
        "Loaded pretrained config from {}: {} layers, hidden size {}, vocabulary {}",
        config_file.display(),
        bert_config.num_hidden_layers,
        bert_config.hidden_size,
        bert_config.vocab_size
    );

    Ok(bert_config)
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// A BERT small enough to run in unit tests, with room for the 3-mer vocabulary
    pub(crate) fn tiny_bert() -> BertModelConfig {
        BertModelConfig::new(2, 1, 1e-12, 8, 16, 69, 32, 2, 0.0, "bert".to_string(), 0)
            .with_with_pooling_layer(Some(true))
    }

    pub(crate) fn tiny_encoder() -> EncoderConfig {
        EncoderConfig::new().with_seq_length(8).with_window(false)
    }

    #[test]
    fn test_head_labels() {
        let head = HeadConfig::from_labels(
            Rank::Superkingdom,
            &["Bacteria".to_string(), " Viruses ".to_string(), "unknown".to_string()],
        );

        assert_eq!(head.n_classes(), 3);
        assert_eq!(head.labels(), vec!["Bacteria", "Viruses", "unknown"]);
        assert_eq!(head.label2id()["Viruses"], 1);
        assert_eq!(head.unknown_id(), 2);
    }

    #[test]
    fn test_anonymous_head_falls_back_to_first_class() {
        let head = HeadConfig::anonymous(Rank::Family, DEFAULT_SINGLE_CLASSES);

        assert_eq!(head.labels(), vec!["0", "1", "2", "3"]);
        assert_eq!(head.unknown_id(), 0);
    }

    #[test]
    fn test_rejects_small_vocabulary() {
        let mut bert = tiny_bert();
        bert.vocab_size = 20;
        let heads = vec![HeadConfig::anonymous(Rank::Superkingdom, 4)];

        assert!(Config::new_with_heads(bert, heads, tiny_encoder()).is_err());
    }

    #[test]
    fn test_rejects_wide_encoding() {
        let encoder = tiny_encoder().with_seq_length(64);
        let heads = vec![HeadConfig::anonymous(Rank::Superkingdom, 4)];

        assert!(Config::new_with_heads(tiny_bert(), heads, encoder).is_err());
    }

    #[test]
    fn test_rejects_missing_heads() {
        assert!(Config::new_with_heads(tiny_bert(), Vec::new(), tiny_encoder()).is_err());
        assert!(Config::new_with_heads(
            tiny_bert(),
            vec![HeadConfig::anonymous(Rank::Family, 0)],
            tiny_encoder()
        )
        .is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let heads = DEFAULT_MULTI_TAX_CLASSES
            .iter()
            .zip([Rank::Superkingdom, Rank::Kingdom, Rank::Family])
            .map(|(n, rank)| HeadConfig::anonymous(rank, *n))
            .collect();
        let config =
            Config::new_with_heads(tiny_bert(), heads, tiny_encoder()).expect("valid config");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        config.save(&path).expect("config saves");

        let loaded = Config::load(&path).expect("config loads");

        assert_eq!(loaded.ranks(), vec![Rank::Superkingdom, Rank::Kingdom, Rank::Family]);
        assert_eq!(loaded.heads[2].n_classes(), 100);
        assert_eq!(loaded.encoder.seq_length, 8);
    }
}
