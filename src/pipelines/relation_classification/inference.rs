use std::path::Path;

use burn::{
    data::dataloader::batcher::Batcher as _,
    tensor::backend::Backend,
};

use crate::{datasets::tlink::Item, utils::tensors::tensor_to_ids};

use super::{
    batcher::{Batcher, Infer},
    checkpoint::{self, Checkpoint},
    features::convert_examples_to_features,
};

/// The predicted relation for one sentence
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// The input sentence
    pub text: String,

    /// The predicted label
    pub label: String,

    /// The probability of the predicted label
    pub score: f32,
}

/// Load a trained checkpoint and predict the relation in each marked sentence
pub fn infer<B: Backend>(
    device: B::Device,     // Device on which to perform computation (e.g., CPU or CUDA device)
    model_dir: &Path,      // Directory containing model and config files
    samples: Vec<String>,  // Marked sentences for inference
) -> anyhow::Result<Vec<Prediction>> {
    let max_seq_len = checkpoint::training_args(model_dir)?.max_seq_len;

    log::info!("Loading weights...");
    let checkpoint = checkpoint::load::<B>(model_dir, &device)?;

    predict(&checkpoint, samples, max_seq_len, device)
}

/// Predict with an already loaded checkpoint
pub fn predict<B: Backend>(
    checkpoint: &Checkpoint<B>,
    samples: Vec<String>,
    max_seq_len: usize,
    device: B::Device,
) -> anyhow::Result<Vec<Prediction>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<Item> = samples
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let words = text.split_whitespace().map(str::to_string).collect();
            Item::new(format!("predict-{}", i), words, text, 0)
        })
        .collect();

    let features = convert_examples_to_features(&items, max_seq_len, &checkpoint.tokenizer)?;

    log::info!("Running inference...");
    let batch: Infer<B> = Batcher::<B>::new(device).batch(features);
    let probabilities = checkpoint.model.infer(batch);

    let class_ids = tensor_to_ids(probabilities.clone().argmax(1));
    let scores = probabilities
        .max_dim(1)
        .into_data()
        .convert::<f32>()
        .value;

    let predictions = items
        .into_iter()
        .zip(class_ids.into_iter().zip(scores))
        .map(|(item, (class_id, score))| Prediction {
            text: item.text,
            label: checkpoint
                .config
                .id2label
                .get(&class_id)
                .cloned()
                .unwrap_or_default(),
            score,
        })
        .collect();

    Ok(predictions)
}
