use std::path::{Path, PathBuf};

use hf_hub::api::tokio::Api;
use log::{info, warn};

/// Config file name within a checkpoint
pub static CONFIG_FILE: &str = "config.json";

/// Weights file name within a checkpoint
pub static WEIGHTS_FILE: &str = "model.safetensors";

/// Vocabulary file name within a checkpoint
pub static VOCAB_FILE: &str = "vocab.txt";

/// Locate the config and weights of a pretrained checkpoint.
///
/// A path to a local directory holding `config.json` and `model.safetensors` is used as is,
/// anything else is treated as a Hugging Face Hub model id.
pub async fn resolve_pretrained(model_name: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    if let Some(files) = local_checkpoint(Path::new(model_name)) {
        info!("Using local checkpoint at {}", model_name);

        return Ok(files);
    }

    download_hf_model(model_name).await
}

/// Locate the vocabulary a pretrained checkpoint ships with, if any.
///
/// A local checkpoint directory is never looked up on the Hub.
pub async fn resolve_vocab(model_name: &str) -> Option<PathBuf> {
    let dir = Path::new(model_name);

    if local_checkpoint(dir).is_some() {
        let vocab = dir.join(VOCAB_FILE);

        return vocab.is_file().then_some(vocab);
    }

    let api = Api::new().ok()?;

    match api.model(model_name.to_string()).get(VOCAB_FILE).await {
        Ok(vocab) => Some(vocab),
        Err(e) => {
            warn!("No {} found for {}: {}", VOCAB_FILE, model_name, e);

            None
        }
    }
}

fn local_checkpoint(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let config_filepath = dir.join(CONFIG_FILE);
    let model_filepath = dir.join(WEIGHTS_FILE);

    (config_filepath.is_file() && model_filepath.is_file()).then_some((config_filepath, model_filepath))
}

/// Download model config and weights from Hugging Face Hub
/// If file exists in cache, it will not be downloaded again
// NOTE: Modified from the built-in function to work within an already-async context
pub async fn download_hf_model(model_name: &str) -> anyhow::Result<(PathBuf, PathBuf)> {
    let api = Api::new()?;
    let repo = api.model(model_name.to_string());

    info!("Fetching {} from Hugging Face Hub", model_name);

    let model_filepath = repo.get(WEIGHTS_FILE).await.map_err(|e| {
        anyhow!(
            "Failed to download: {} weights with name: {} from HuggingFace Hub: {}",
            model_name,
            WEIGHTS_FILE,
            e
        )
    })?;

    let config_filepath = repo.get(CONFIG_FILE).await.map_err(|e| {
        anyhow!(
            "Failed to download: {} config with name: {} from HuggingFace Hub: {}",
            model_name,
            CONFIG_FILE,
            e
        )
    })?;

    Ok((config_filepath, model_filepath))
}
