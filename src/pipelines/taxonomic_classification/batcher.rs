use std::collections::BTreeMap;

use burn::{
    data::dataloader,
    nn::attention::generate_padding_mask,
    tensor::{backend::Backend, Bool, Data, ElementConversion, Int, Shape, Tensor},
};
use derive_new::new;

use crate::{
    datasets::LabeledItem,
    models::bert::Config,
    tokens::{split_batch, Encoder},
};

/// An inference batch for taxonomic classification
#[derive(Debug, Clone, new)]
pub struct Infer<B: Backend> {
    /// Token ids as 2D tensor: [batch_size, max_length]
    pub tokens: Tensor<B, 2, Int>,

    /// Segment ids as 2D tensor: [batch_size, max_length]. All zero, bert-burn assigns a single
    /// token type internally
    pub segments: Tensor<B, 2, Int>,

    /// Padding mask for the tokens containing booleans for padding locations
    pub mask_pad: Tensor<B, 2, Bool>,
}

/// A training batch for taxonomic classification
#[derive(Clone, Debug, new)]
pub struct Train<B: Backend> {
    /// Bert Model input
    pub input: Infer<B>,

    /// Class ids for the batch, one tensor per head
    pub targets: Vec<Tensor<B, 1, Int>>,

    /// Per-class loss weights, one entry per head
    pub class_weights: Vec<Option<Vec<f32>>>,
}

/// Struct for batching raw sequences
#[derive(Clone)]
pub struct Batcher<B: Backend> {
    /// Encoder for converting raw sequences to token IDs
    pub encoder: Encoder,

    /// A mapping from class name labels to class ids, one per head
    pub label2id: Vec<BTreeMap<String, usize>>,

    /// The class id unresolvable labels fall back to, one per head
    pub unknown_ids: Vec<usize>,

    /// Per-class loss weights, one entry per head
    pub class_weights: Vec<Option<Vec<f32>>>,

    /// Device on which to perform computation (e.g., CPU or CUDA device)
    pub device: B::Device,
}

impl<B: Backend> Batcher<B> {
    /// Creates a new batcher.
    ///
    /// `window` overrides the configured encoder, so training can sample random windows and
    /// lengths while validation and inference read every sequence from its start at the full
    /// `seq_length`.
    pub fn new(
        config: &Config,
        class_weights: Vec<Option<Vec<f32>>>,
        window: bool,
        device: B::Device,
    ) -> Self {
        let mut encoder = config.encoder.clone().with_window(window);
        if !window {
            encoder.seq_len_like = None;
        }
        let encoder = encoder.init();

        Self {
            encoder,
            label2id: config.heads.iter().map(|head| head.label2id()).collect(),
            unknown_ids: config.heads.iter().map(|head| head.unknown_id()).collect(),
            class_weights,
            device,
        }
    }

    fn tensor(&self, ids: Vec<usize>, shape: [usize; 2]) -> Tensor<B, 2, Int> {
        Tensor::from_data(
            Data::new(
                ids.into_iter().map(|e| (e as i64).elem()).collect(),
                Shape::new(shape),
            ),
            &self.device,
        )
    }
}

/// Implement Batcher trait for Batcher struct for inference
impl<B: Backend> dataloader::batcher::Batcher<String, Infer<B>> for Batcher<B> {
    /// Collects a vector of raw sequences into a inference batch
    fn batch(&self, items: Vec<String>) -> Infer<B> {
        let batch_size = items.len();
        let max_length = self.encoder.config.max_length();
        let mut rng = rand::thread_rng();

        let encoded = items
            .iter()
            .map(|seq| self.encoder.encode(seq, &mut rng))
            .collect();

        let (token_ids_list, segment_ids_list) = split_batch(encoded);

        let padding = generate_padding_mask(
            self.encoder.tokens.pad_id(),
            token_ids_list,
            Some(max_length),
            &self.device,
        );

        let segments = self.tensor(
            segment_ids_list.into_iter().flatten().collect(),
            [batch_size, max_length],
        );

        // Create and return inference batch
        Infer {
            tokens: padding.tensor,
            segments,
            mask_pad: padding.mask,
        }
    }
}

/// Implement Batcher trait for Batcher struct for training
impl<B: Backend> dataloader::batcher::Batcher<LabeledItem, Train<B>> for Batcher<B> {
    /// Collects a vector of labeled sequences into a training batch
    fn batch(&self, items: Vec<LabeledItem>) -> Train<B> {
        let batch_size = items.len();

        let mut class_ids_list = vec![Vec::with_capacity(batch_size); self.label2id.len()];

        for item in &items {
            for (head, class_ids) in class_ids_list.iter_mut().enumerate() {
                let class_id = item
                    .labels
                    .get(head)
                    .and_then(|label| self.label2id[head].get(label))
                    .copied()
                    .unwrap_or(self.unknown_ids[head]);

                class_ids.push(class_id);
            }
        }

        let sequences: Vec<String> = items.into_iter().map(|item| item.sequence).collect();
        let input: Infer<B> = self.batch(sequences);

        let targets = class_ids_list
            .into_iter()
            .map(|class_ids| {
                Tensor::from_data(
                    Data::new(
                        class_ids.into_iter().map(|e| (e as i64).elem()).collect(),
                        Shape::new([batch_size]),
                    ),
                    &self.device,
                )
            })
            .collect();

        // Create and return training batch
        Train {
            input,
            targets,
            class_weights: self.class_weights.clone(),
        }
    }
}
