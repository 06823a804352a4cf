use bert_burn::data::BertInferenceBatch;
use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    tensor::{backend::Backend, Tensor},
};
use log::{info, warn};

use crate::{
    datasets::LabeledItem,
    metrics::{accuracy, categorical_crossentropy, roc_auc},
    models::bert::Model,
    taxonomy::Rank,
};

use super::Batcher;

/// Prediction settings
#[derive(burn::config::Config, Debug)]
pub struct PredictConfig {
    /// Batch size
    #[config(default = 32)]
    pub batch_size: usize,

    /// Report the ROC-AUC
    #[config(default = true)]
    pub roc_auc: bool,

    /// Report the categorical cross-entropy loss
    #[config(default = true)]
    pub loss: bool,

    /// Keep the collected targets and probabilities in the result
    #[config(default = false)]
    pub return_data: bool,
}

/// Targets and predicted probabilities collected for one head
#[derive(Debug, Clone, PartialEq)]
pub struct HeadData {
    /// The rank the head predicts
    pub rank: Rank,

    /// Target class ids
    pub targets: Vec<usize>,

    /// Class probabilities, one row per target
    pub probs: Vec<Vec<f32>>,
}

/// Metrics computed over a dataset
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    /// Metric values, aligned with `metrics_names`
    pub metrics: Vec<f64>,

    /// Metric names, prefixed by rank when the model has several heads
    pub metrics_names: Vec<String>,

    /// Collected targets and probabilities per head, when requested
    pub data: Option<Vec<HeadData>>,
}

impl Prediction {
    /// Look up a metric by name
    pub fn get(&self, name: &str) -> Option<f64> {
        self.metrics_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.metrics[i])
    }

    /// The metrics as a JSON object keyed by name
    pub fn to_json(&self) -> serde_json::Value {
        let metrics = self
            .metrics_names
            .iter()
            .cloned()
            .zip(self.metrics.iter().map(|value| serde_json::Value::from(*value)))
            .collect::<serde_json::Map<_, _>>();

        serde_json::Value::Object(metrics)
    }

    fn push(&mut self, name: String, value: f64) {
        self.metrics_names.push(name);
        self.metrics.push(value);
    }
}

/// Run the model over a labeled dataset and score each head's predictions
pub fn predict<B, D>(
    model: &Model<B>,
    ranks: &[Rank],
    batcher: Batcher<B>,
    dataset: D,
    config: &PredictConfig,
) -> Prediction
where
    B: Backend,
    D: Dataset<LabeledItem> + 'static,
{
    let dataloader = DataLoaderBuilder::new(batcher)
        .batch_size(config.batch_size)
        .build(dataset);

    let mut data: Vec<HeadData> = ranks
        .iter()
        .map(|rank| HeadData {
            rank: *rank,
            targets: Vec::new(),
            probs: Vec::new(),
        })
        .collect();

    for batch in dataloader.iter() {
        let probs = model.infer(BertInferenceBatch {
            tokens: batch.input.tokens,
            mask_pad: batch.input.mask_pad,
        });

        for ((head, probs), targets) in data.iter_mut().zip(probs).zip(batch.targets) {
            head.probs.extend(to_rows(probs));
            head.targets.extend(
                targets
                    .into_data()
                    .convert::<i64>()
                    .value
                    .into_iter()
                    .map(|id| id as usize),
            );
        }
    }

    let mut prediction = Prediction::default();
    let prefixed = ranks.len() > 1;

    for head in &data {
        // In case not everything was predicted
        let n = head.targets.len().min(head.probs.len());
        if n == 0 {
            continue;
        }

        let targets = &head.targets[..n];
        let probs = &head.probs[..n];
        let name = |metric: &str| {
            if prefixed {
                format!("{}_{}", head.rank, metric)
            } else {
                metric.to_string()
            }
        };

        prediction.push(name("test_accuracy"), accuracy(targets, probs));

        if config.loss {
            prediction.push(name("test_loss"), categorical_crossentropy(targets, probs));
        }

        if config.roc_auc {
            let n_classes = probs.first().map(Vec::len).unwrap_or(0);

            match roc_auc(targets, probs, n_classes) {
                Some(auc) => prediction.push(name("roc_auc"), auc),
                None => warn!(
                    "ROC-AUC is undefined for {}: no class has both positive and negative examples",
                    head.rank
                ),
            }
        }
    }

    for (name, value) in prediction.metrics_names.iter().zip(&prediction.metrics) {
        info!("{}: {:.4}", name, value);
    }

    if config.return_data {
        prediction.data = Some(data);
    }

    prediction
}

/// Split a [rows, classes] tensor into one vector per row
pub fn to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, n_classes] = tensor.dims();

    tensor
        .into_data()
        .convert::<f32>()
        .value
        .chunks(n_classes.max(1))
        .map(<[f32]>::to_vec)
        .collect()
}
