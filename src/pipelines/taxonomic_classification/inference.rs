use bert_burn::data::BertInferenceBatch;
use burn::{
    config::Config as _,
    data::dataloader::batcher::Batcher as BatcherTrait,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::{backend::Backend, Tensor},
};
use log::info;

use crate::{
    metrics::argmax,
    models::bert::{Config, HeadConfig, Model},
};

use super::{batcher::Infer, predict::to_rows, Batcher};

/// Load a trained model and its configuration from an artifact directory
pub fn load_trained<B: Backend>(
    device: &B::Device,
    artifact_dir: &str,
) -> anyhow::Result<(Model<B>, Config)> {
    // Load experiment configuration
    let mut config = Config::load(format!("{artifact_dir}/config.json").as_str())
        .map_err(|e| anyhow!("Unable to load config file: {}", e))?;

    config.model.hidden_dropout_prob = 0.0;

    // Load trained model weights
    info!("Loading weights from {}", artifact_dir);

    let record = CompactRecorder::new()
        .load(format!("{artifact_dir}/model").into(), device)
        .map_err(|e| anyhow!("Unable to load trained model weights: {}", e))?;

    // Create model using loaded weights
    let model = config.init(device).load_record(record);

    Ok((model, config))
}

/// Define inference function
pub fn infer<B: Backend>(
    device: B::Device,    // Device on which to perform computation (e.g., CPU or CUDA device)
    artifact_dir: &str,   // Directory containing model and config files
    samples: Vec<String>, // Raw sequences for inference
) -> anyhow::Result<(Vec<Tensor<B, 2>>, Config)> {
    let (model, config) = load_trained::<B>(&device, artifact_dir)?;

    // Sequences are read from their start so predictions are reproducible
    let batcher = Batcher::<B>::new(&config, vec![None; config.heads.len()], false, device);

    info!("Running inference on {} sequences...", samples.len());

    let item: Infer<B> = batcher.batch(samples);

    let predictions = model.infer(BertInferenceBatch {
        tokens: item.tokens,
        mask_pad: item.mask_pad,
    });

    // Run inference on the given sequences, and return the config for reference
    Ok((predictions, config))
}

/// The most probable label of each head for every sample, with its probability
pub fn top_labels<B: Backend>(
    predictions: &[Tensor<B, 2>],
    heads: &[HeadConfig],
) -> Vec<Vec<(String, f32)>> {
    let per_head: Vec<Vec<(String, f32)>> = predictions
        .iter()
        .zip(heads)
        .map(|(probs, head)| {
            to_rows(probs.clone())
                .into_iter()
                .map(|row| match argmax(&row) {
                    Some(class) => (
                        head.id2label
                            .get(&class)
                            .cloned()
                            .unwrap_or_else(|| class.to_string()),
                        row[class],
                    ),
                    None => (String::new(), 0.0),
                })
                .collect()
        })
        .collect();

    let n_samples = per_head.first().map(Vec::len).unwrap_or(0);

    (0..n_samples)
        .map(|i| per_head.iter().map(|head| head[i].clone()).collect())
        .collect()
}
