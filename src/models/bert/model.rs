use std::path::PathBuf;

use bert_burn::{
    data::BertInferenceBatch,
    model::{BertModel, BertModelOutput},
};
use burn::{
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Linear},
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
};
use derive_new::new;
use log::info;

use crate::pipelines::taxonomic_classification::Output;

use super::Config;

/// BERT for taxonomic classification, with one softmax head per rank
#[derive(Module, Debug, new)]
pub struct Model<B: Backend> {
    /// The base BERT model
    pub model: BertModel<B>,

    /// Linear layers for each rank, from the most general to the most specific
    pub heads: Vec<Linear<B>>,
}

/// Define model behavior
impl<B: Backend> Model<B> {
    /// Run the heads over the pooled output, returning the logits of each head.
    ///
    /// Each head after the first also sees the softmax of the previous head's logits.
    pub fn logits(&self, input: BertInferenceBatch<B>) -> Vec<Tensor<B, 2>> {
        let [batch_size, _seq_length] = input.tokens.dims();

        let BertModelOutput {
            pooled_output,
            hidden_states,
        } = self.model.forward(input);

        let pooled = pooled_output.unwrap_or(hidden_states);
        let [_, _, hidden_size] = pooled.dims();

        let pooled = pooled
            .slice([0..batch_size, 0..1])
            .reshape([batch_size, hidden_size]);

        let mut logits = Vec::with_capacity(self.heads.len());
        let mut previous: Option<Tensor<B, 2>> = None;

        for head in &self.heads {
            let input = match previous {
                Some(probs) => Tensor::cat(vec![pooled.clone(), probs], 1),
                None => pooled.clone(),
            };

            let output = head.forward(input);

            previous = Some(softmax(output.clone(), 1));
            logits.push(output);
        }

        logits
    }

    /// Defines forward pass for training.
    ///
    /// The loss is the sum of each head's cross-entropy, weighted per class where weights are
    /// given. Accuracy is reported against the most specific head.
    pub fn forward(
        &self,
        input: BertInferenceBatch<B>,
        targets: Vec<Tensor<B, 1, Int>>,
        class_weights: &[Option<Vec<f32>>],
    ) -> Output<B> {
        let device = input.tokens.device();

        let logits = self.logits(input);

        let mut loss = Tensor::zeros([1], &device);
        let mut last = None;

        for (i, (output, targets)) in logits.into_iter().zip(targets).enumerate() {
            let targets = targets.to_device(&device);

            let weights = class_weights.get(i).cloned().flatten();

            let head_loss = CrossEntropyLossConfig::new()
                .with_weights(weights)
                .init(&device)
                .forward(output.clone(), targets.clone());

            loss = loss + head_loss;
            last = Some((output, targets));
        }

        let (output, targets) = match last {
            Some(last) => last,
            None => (Tensor::zeros([0, 0], &device), Tensor::zeros([0], &device)),
        };

        Output {
            loss,
            output,
            targets,
        }
    }

    /// Defines forward pass for inference, returning the class probabilities of each head
    pub fn infer(&self, input: BertInferenceBatch<B>) -> Vec<Tensor<B, 2>> {
        self.logits(input)
            .into_iter()
            .map(|output| softmax(output, 1))
            .collect()
    }

    /// The probabilities of every head concatenated along the class dimension
    pub fn infer_concat(&self, input: BertInferenceBatch<B>) -> Tensor<B, 2> {
        Tensor::cat(self.infer(input), 1)
    }

    /// Load a model from a pretrained BERT checkpoint, with freshly initialized heads
    pub fn load_from_safetensors(
        device: &B::Device,
        model_file: PathBuf,
        config: &Config,
    ) -> anyhow::Result<Self> {
        if !model_file.is_file() {
            return Err(anyhow!(
                "Pretrained weights not found at {}",
                model_file.display()
            ));
        }

        info!("Loading pretrained weights from {}", model_file.display());

        let model = config.init(device);

        let record = ModelRecord {
            model: BertModel::from_safetensors(model_file, device, config.model.clone()),
            heads: model
                .heads
                .clone()
                .into_iter()
                .map(Module::into_record)
                .collect(),
        };

        Ok(model.load_record(record))
    }
}

#[cfg(test)]
mod tests {
    use burn::{
        backend::NdArray,
        nn::attention::generate_padding_mask,
        tensor::{Data, Shape},
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        models::bert::{
            config::tests::{tiny_bert, tiny_encoder},
            HeadConfig,
        },
        taxonomy::Rank,
    };

    type TestBackend = NdArray<f32>;

    fn multi_tax_config() -> Config {
        let heads = vec![
            HeadConfig::anonymous(Rank::Superkingdom, 2),
            HeadConfig::anonymous(Rank::Kingdom, 3),
            HeadConfig::anonymous(Rank::Family, 4),
        ];

        Config::new_with_heads(tiny_bert(), heads, tiny_encoder()).expect("valid config")
    }

    fn batch(device: &<TestBackend as Backend>::Device) -> BertInferenceBatch<TestBackend> {
        let tokens = vec![vec![2, 5, 6, 7, 0, 0, 0, 0], vec![2, 8, 9, 10, 11, 12, 0, 0]];
        let padding = generate_padding_mask(0, tokens, Some(8), device);

        BertInferenceBatch {
            tokens: padding.tensor,
            mask_pad: padding.mask,
        }
    }

    #[test]
    fn test_heads_chain_previous_probabilities() {
        let device = Default::default();
        let model = multi_tax_config().init::<TestBackend>(&device);

        let inputs: Vec<usize> = model
            .heads
            .iter()
            .map(|head| head.weight.val().dims()[0])
            .collect();

        assert_eq!(inputs, vec![8, 8 + 2, 8 + 3]);
    }

    #[test]
    fn test_infer_returns_probabilities_per_head() {
        let device = Default::default();
        let model = multi_tax_config().init::<TestBackend>(&device);

        let probs = model.infer(batch(&device));

        let dims: Vec<[usize; 2]> = probs.iter().map(|p| p.dims()).collect();
        assert_eq!(dims, vec![[2, 2], [2, 3], [2, 4]]);

        for head in probs {
            let sums = head.sum_dim(1).into_data().convert::<f32>().value;
            assert!(sums.iter().all(|sum| (sum - 1.0).abs() < 1e-4));
        }
    }

    #[test]
    fn test_infer_concat() {
        let device = Default::default();
        let model = multi_tax_config().init::<TestBackend>(&device);

        let output = model.infer_concat(batch(&device));

        assert_eq!(output.dims(), [2, 9]);
    }

    #[test]
    fn test_forward_reports_most_specific_head() {
        let device = Default::default();
        let model = multi_tax_config().init::<TestBackend>(&device);

        let targets = [vec![0, 1], vec![2, 0], vec![3, 1]]
            .into_iter()
            .map(|ids: Vec<i64>| {
                Tensor::<TestBackend, 1, Int>::from_data(
                    Data::new(ids, Shape::new([2])).convert(),
                    &device,
                )
            })
            .collect();
        let weights = vec![Some(vec![1.0, 2.0]), None, None];

        let output = model.forward(batch(&device), targets, &weights);

        assert_eq!(output.output.dims(), [2, 4]);
        assert_eq!(output.targets.into_data().convert::<i64>().value, vec![3, 1]);

        let loss = output.loss.into_data().convert::<f32>().value;
        assert!(loss[0].is_finite() && loss[0] > 0.0);
    }

    #[test]
    fn test_missing_weights_file() {
        let device = Default::default();

        let result = Model::<TestBackend>::load_from_safetensors(
            &device,
            PathBuf::from("/nonexistent/model.safetensors"),
            &multi_tax_config(),
        );

        assert!(result.is_err());
    }
}
