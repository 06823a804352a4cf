use burn::{
    config::Config as _,
    data::{
        dataloader::DataLoaderBuilder,
        dataset::{Dataset, InMemDataset},
    },
    lr_scheduler::noam::NoamLrSchedulerConfig,
    module::{AutodiffModule, Module},
    optim::AdamWConfig,
    record::{CompactRecorder, Recorder},
    tensor::backend::{AutodiffBackend, Backend},
    train::{
        metric::{AccuracyMetric, CudaMetric, LearningRateMetric, LossMetric},
        LearnerBuilder,
    },
    LearningRate,
};
use log::{info, warn};

use crate::{
    datasets::SequenceDataset,
    models::bert::{self, config::load_pretrained, HeadConfig, Model},
    taxonomy::{weights::ClassWeights, Lineage, Rank},
    tokens::EncoderConfig,
    utils::{
        files::read_file,
        hugging_face::{resolve_pretrained, resolve_vocab},
        renderer::Simple,
    },
};

use super::{predict, Batcher, PredictConfig, Prediction, PIPELINE};

/// Define configuration struct for the experiment
#[derive(burn::config::Config)]
pub struct Config {
    /// Batch size
    #[config(default = 32)]
    pub batch_size: usize,

    /// Number of epochs
    #[config(default = 4)]
    pub num_epochs: usize,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Initial learning rate
    #[config(default = 5e-5)]
    pub learning_rate: LearningRate,

    /// Learning rate warmup steps
    #[config(default = 0)]
    pub warmup_steps: usize,

    /// The location of the top-level data directory
    #[config(default = "\"data\".to_string()")]
    pub data_dir: String,

    /// Classes with fewer entries than this are collapsed into "unknown"
    #[config(default = 10_000)]
    pub unknown_thr: usize,

    /// Weight the loss of each class by its inverse frequency
    #[config(default = true)]
    pub weighted: bool,

    /// Seed for shuffling the training data
    #[config(default = 42)]
    pub seed: u64,

    /// How sequences are encoded
    #[config(default = "EncoderConfig::new()")]
    pub encoder: EncoderConfig,

    /// Pretrained model name or local checkpoint directory
    pub model_name: String,

    /// The Dataset to use
    pub dataset_name: String,

    /// The pipeline being trained (e.g., "single" or "multi-tax")
    pub pipeline: String,

    /// The ranks to predict, from the most general to the most specific
    pub ranks: Vec<Rank>,
}

impl Config {
    /// Where the trained model and its configuration are written
    pub fn artifact_dir(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.data_dir, PIPELINE, self.dataset_name, self.pipeline
        )
    }
}

/// Build one head per rank from the training classes, with the loss weights aligned to each
/// head's labels. Without `weighted`, every head is left unweighted.
pub fn heads_and_weights(
    class_weights: &ClassWeights,
    weighted: bool,
) -> (Vec<HeadConfig>, Vec<Option<Vec<f32>>>) {
    class_weights
        .ranks
        .iter()
        .map(|rank_weights| {
            let labels = rank_weights.labels();

            info!(
                "{}: {} classes over {} sequences",
                rank_weights.rank,
                labels.len(),
                class_weights.num_entries
            );

            let weights = weighted.then(|| rank_weights.weight_vector(&labels));

            (HeadConfig::from_labels(rank_weights.rank, &labels), weights)
        })
        .unzip()
}

/// Fail when the checkpoint ships a vocabulary whose token ids differ from the k-mer dictionary
pub async fn check_pretrained_vocab(
    model_name: &str,
    encoder: &EncoderConfig,
) -> anyhow::Result<()> {
    let Some(vocab_file) = resolve_vocab(model_name).await else {
        warn!(
            "{} ships no vocabulary, its token ids cannot be checked against the k-mer dictionary",
            model_name
        );

        return Ok(());
    };

    let vocab = read_file(&vocab_file).await?;

    encoder.init().tokens.check_vocab(&vocab).map_err(|e| {
        anyhow!(
            "{} does not match the {}-mer dictionary over {:?}: {}",
            vocab_file.display(),
            encoder.k,
            encoder.alphabet,
            e
        )
    })
}

/// Write the model config, training config, test metrics and model weights to the artifact dir
pub async fn save_artifacts<B: Backend>(
    artifact_dir: &str,
    model_config: &bert::Config,
    config: &Config,
    prediction: &Prediction,
    model: Model<B>,
) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(artifact_dir).await?;

    model_config
        .save(format!("{artifact_dir}/config.json"))
        .map_err(|e| anyhow!("Unable to save model config: {}", e))?;

    config
        .save(format!("{artifact_dir}/training.json"))
        .map_err(|e| anyhow!("Unable to save training config: {}", e))?;

    tokio::fs::write(
        format!("{artifact_dir}/metrics.json"),
        serde_json::to_string_pretty(&prediction.to_json())?,
    )
    .await?;

    CompactRecorder::new()
        .record(model.into_record(), format!("{artifact_dir}/model").into())
        .map_err(|e| anyhow!("Unable to save trained model: {}", e))?;

    info!("Saved the trained model to {}", artifact_dir);

    Ok(())
}

/// Define train function
pub async fn train<B, L>(
    devices: Vec<B::Device>,        // Device on which to perform computation (e.g., CPU or CUDA device)
    dataset_train: SequenceDataset, // Training dataset
    dataset_test: SequenceDataset,  // Testing dataset
    lineage: &L,                    // Resolves taxids to the names of their ranks
    config: Config,                 // Experiment configuration
    use_tui: bool,                  // Render metrics in the terminal UI
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    L: Lineage + ?Sized,
{
    let device = devices
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("At least one device is required"))?;

    let artifact_dir = config.artifact_dir();

    if config.ranks.is_empty() {
        return Err(anyhow!("At least one rank is required"));
    }

    let (config_file, model_file) = resolve_pretrained(&config.model_name).await?;

    check_pretrained_vocab(&config.model_name, &config.encoder).await?;

    let bert_config = load_pretrained(config_file)
        .map_err(|e| anyhow!("Unable to load pre-trained model config file: {}", e))?;

    // Label each sequence with the names of its ancestors at every rank
    let labeled_train = dataset_train.labeled(lineage, &config.ranks);
    let labeled_test = dataset_test.labeled_items(lineage, &config.ranks);

    let class_weights = ClassWeights::from_labels(
        labeled_train.iter().map(|item| item.labels),
        &config.ranks,
        config.unknown_thr,
    );

    let (heads, loss_weights) = heads_and_weights(&class_weights, config.weighted);

    let model_config = bert::Config::new_with_heads(bert_config, heads, config.encoder.clone())?;

    let model = Model::<B>::load_from_safetensors(&device, model_file, &model_config)?;

    // Initialize batchers for training and testing data
    let batcher_train = Batcher::<B>::new(
        &model_config,
        loss_weights.clone(),
        model_config.encoder.window,
        device.clone(),
    );
    let batcher_test =
        Batcher::<B::InnerBackend>::new(&model_config, loss_weights, false, device.clone());

    let workers = std::thread::available_parallelism()?;

    // Initialize data loaders for training and testing data
    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(workers.into())
        .build(labeled_train);

    let dataloader_test = DataLoaderBuilder::new(batcher_test.clone())
        .batch_size(config.batch_size * 2)
        .num_workers(workers.into())
        .build(InMemDataset::new(labeled_test.clone()));

    // Initialize optimizer
    let optimizer = AdamWConfig::new().with_epsilon(config.adam_epsilon).init();

    // Initialize learning rate scheduler
    let lr_scheduler = NoamLrSchedulerConfig::new(config.learning_rate)
        .with_warmup_steps(config.warmup_steps)
        .with_model_size(model_config.model.hidden_size)
        .init();

    tokio::fs::create_dir_all(&artifact_dir).await?;

    // Initialize learner
    let mut builder = LearnerBuilder::new(&artifact_dir)
        .metric_train(CudaMetric::new())
        .metric_valid(CudaMetric::new())
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .metric_train_numeric(LearningRateMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(devices)
        .num_epochs(config.num_epochs)
        .summary();

    if !use_tui {
        builder = builder.renderer(Simple::new());
    }

    let learner = builder.build(model, optimizer, lr_scheduler);

    // Train the model
    let model_trained = learner.fit(dataloader_train, dataloader_test);

    // Score the trained model on the test set
    let prediction = predict(
        &model_trained.valid(),
        &model_config.ranks(),
        batcher_test,
        InMemDataset::new(labeled_test),
        &PredictConfig::new().with_batch_size(config.batch_size * 2),
    );

    // Save the configuration and the trained model
    save_artifacts(&artifact_dir, &model_config, &config, &prediction, model_trained).await
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        models::bert::config::tests::{tiny_bert, tiny_encoder},
        pipelines::taxonomic_classification::load_trained,
        taxonomy::DEFAULT_RANKS,
        tokens::TokenDict,
        utils::hugging_face::{CONFIG_FILE, VOCAB_FILE, WEIGHTS_FILE},
    };

    type TestBackend = NdArray<f32>;

    fn labels(entries: &[[&str; 2]]) -> Vec<Vec<String>> {
        entries
            .iter()
            .map(|entry| entry.iter().map(|name| name.to_string()).collect())
            .collect()
    }

    /// A local checkpoint whose vocabulary lists the 3-mers over `alphabet` after the special tokens
    fn checkpoint_with_vocab(alphabet: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").expect("write config");
        std::fs::write(dir.path().join(WEIGHTS_FILE), []).expect("write weights");

        let dict = TokenDict::new(alphabet, 3);
        let vocab = ["[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]"]
            .into_iter()
            .chain((5..dict.len()).filter_map(|id| dict.token(id)))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(dir.path().join(VOCAB_FILE), vocab).expect("write vocab");

        dir
    }

    #[test]
    fn test_artifact_dir() {
        let config = Config::new(
            "checkpoints/kmer-bert-3".to_string(),
            "viral".to_string(),
            "multi-tax".to_string(),
            DEFAULT_RANKS.to_vec(),
        )
        .with_data_dir("/tmp/data".to_string());

        assert_eq!(
            config.artifact_dir(),
            "/tmp/data/taxonomic-classification/viral/multi-tax"
        );
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(
            "bert".to_string(),
            "viral".to_string(),
            "single".to_string(),
            vec![Rank::Superkingdom],
        );

        assert_eq!(config.batch_size, 32);
        assert_eq!(config.unknown_thr, 10_000);
        assert!(config.weighted);
        assert_eq!(config.encoder.k, 3);
    }

    #[test]
    fn test_heads_and_weights() {
        let entries = labels(&[
            ["Bacteria", "Enterobacteriaceae"],
            ["Bacteria", "Enterobacteriaceae"],
            ["Bacteria", "Pseudomonadaceae"],
            ["Viruses", "Retroviridae"],
        ]);
        let class_weights = ClassWeights::from_labels(
            &entries,
            &[Rank::Superkingdom, Rank::Family],
            2,
        );

        let (heads, weights) = heads_and_weights(&class_weights, true);

        assert_eq!(
            heads.iter().map(|head| head.rank).collect::<Vec<_>>(),
            vec![Rank::Superkingdom, Rank::Family]
        );
        assert_eq!(heads[0].labels(), vec!["Bacteria", "unknown"]);
        assert_eq!(heads[1].labels(), vec!["Enterobacteriaceae", "unknown"]);

        // Viruses is rare, so its single entry is counted as "unknown"
        let bacteria = (4.0_f64 / 3.0) as f32;
        assert_eq!(weights[0], Some(vec![bacteria, 4.0]));
        assert_eq!(weights[1], Some(vec![2.0, 2.0]));
    }

    #[test]
    fn test_unweighted_heads() {
        let entries = labels(&[["Bacteria", "A"], ["Viruses", "B"]]);
        let class_weights =
            ClassWeights::from_labels(&entries, &[Rank::Superkingdom, Rank::Family], 1);

        let (heads, weights) = heads_and_weights(&class_weights, false);

        assert_eq!(heads.len(), 2);
        assert_eq!(heads[1].labels(), vec!["A", "B", "unknown"]);
        assert_eq!(weights, vec![None, None]);
    }

    #[tokio::test]
    async fn test_vocab_in_dictionary_order_passes() {
        let dir = checkpoint_with_vocab("ACGT");
        let name = dir.path().to_string_lossy().to_string();

        let result = check_pretrained_vocab(&name, &EncoderConfig::new()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_vocab_in_another_order_fails() {
        let dir = checkpoint_with_vocab("ATCG");
        let name = dir.path().to_string_lossy().to_string();

        let result = check_pretrained_vocab(&name, &EncoderConfig::new()).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_checkpoint_without_vocab_is_accepted() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").expect("write config");
        std::fs::write(dir.path().join(WEIGHTS_FILE), []).expect("write weights");
        let name = dir.path().to_string_lossy().to_string();

        let result = check_pretrained_vocab(&name, &EncoderConfig::new()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_save_artifacts() {
        let device = Default::default();
        let dir = tempfile::tempdir().expect("temp dir");
        let artifact_dir = dir.path().join("viral/multi-tax").to_string_lossy().to_string();

        let heads = vec![
            HeadConfig::from_labels(
                Rank::Superkingdom,
                &["Bacteria".to_string(), "unknown".to_string()],
            ),
            HeadConfig::from_labels(
                Rank::Family,
                &["A".to_string(), "B".to_string(), "unknown".to_string()],
            ),
        ];
        let model_config =
            bert::Config::new_with_heads(tiny_bert(), heads, tiny_encoder()).expect("valid config");
        let config = Config::new(
            "checkpoints/kmer-bert-3".to_string(),
            "viral".to_string(),
            "multi-tax".to_string(),
            vec![Rank::Superkingdom, Rank::Family],
        );
        let prediction = Prediction {
            metrics: vec![0.5],
            metrics_names: vec!["test_accuracy".to_string()],
            data: None,
        };
        let model = model_config.init::<TestBackend>(&device);

        save_artifacts(&artifact_dir, &model_config, &config, &prediction, model)
            .await
            .expect("artifacts are saved");

        let training =
            Config::load(format!("{artifact_dir}/training.json")).expect("training config loads");
        assert_eq!(training.ranks, config.ranks);

        let metrics: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(format!("{artifact_dir}/metrics.json")).expect("metrics"),
        )
        .expect("metrics are JSON");
        assert_eq!(metrics, prediction.to_json());

        let (_, loaded) =
            load_trained::<TestBackend>(&device, &artifact_dir).expect("trained model loads");
        assert_eq!(loaded.ranks(), vec![Rank::Superkingdom, Rank::Family]);
        assert_eq!(loaded.heads[1].labels(), vec!["A", "B", "unknown"]);
    }
}
