use std::{collections::HashMap, path::Path};

use bert_burn::{
    loader::{
        load_embeddings_from_safetensors, load_encoder_from_safetensors,
        load_pooler_from_safetensors,
    },
    model::BertModelRecord,
};
use burn::tensor::backend::Backend;
use candle_core::{safetensors, Device, Tensor};

/// The word embedding table inside the `embeddings.` prefix
const WORD_EMBEDDINGS: &str = "embeddings.word_embeddings.weight";

/// Standard deviation used for the embedding rows of added tokens
const INITIALIZER_RANGE: f64 = 0.02;

/// Load pretrained BERT weights, growing the word embeddings to `vocab_size` rows
pub fn from_safetensors<B: Backend>(
    file_path: &Path,
    device: &B::Device,
    model_type: &str,
    vocab_size: usize,
) -> anyhow::Result<BertModelRecord<B>> {
    let weights = safetensors::load(file_path, &Device::Cpu)
        .map_err(|e| anyhow!("Error loading weights from {}: {}", file_path.display(), e))?;

    // Weights are stored in a HashMap<String, Tensor>
    // For each layer, it will either be prefixed with "encoder.layer.", "embeddings." or "pooler."
    let mut encoder_layers: HashMap<String, Tensor> = HashMap::new();
    let mut embeddings_layers: HashMap<String, Tensor> = HashMap::new();
    let mut pooler_layers: HashMap<String, Tensor> = HashMap::new();

    let prefix = format!("{}.", model_type);

    for (key, value) in weights.into_iter() {
        // Remove the model name prefix to load keys consistently across variants
        let key_without_prefix = key.replace(&prefix, "");

        if key_without_prefix.starts_with("encoder.layer.") {
            encoder_layers.insert(key_without_prefix, value);
        } else if key_without_prefix.starts_with("embeddings.") {
            embeddings_layers.insert(key_without_prefix, value);
        } else if key_without_prefix.starts_with("pooler.") {
            pooler_layers.insert(key_without_prefix, value);
        }
    }

    let word_embeddings = embeddings_layers
        .remove(WORD_EMBEDDINGS)
        .ok_or_else(|| anyhow!("{} is missing {}", file_path.display(), WORD_EMBEDDINGS))?;

    embeddings_layers.insert(
        WORD_EMBEDDINGS.to_string(),
        resize_rows(word_embeddings, vocab_size)?,
    );

    if pooler_layers.is_empty() {
        return Err(anyhow!(
            "{} has no pooler weights, which the [CLS] representation needs",
            file_path.display()
        ));
    }

    let embeddings_record = load_embeddings_from_safetensors(embeddings_layers, device);
    let encoder_record = load_encoder_from_safetensors(encoder_layers, device);
    let pooler_record = load_pooler_from_safetensors(pooler_layers, device);

    Ok(BertModelRecord {
        embeddings: embeddings_record,
        encoder: encoder_record,
        pooler: Some(pooler_record),
    })
}

/// Append normally distributed rows so the embedding table holds `rows` entries
pub fn resize_rows(weight: Tensor, rows: usize) -> anyhow::Result<Tensor> {
    let (current, hidden_size) = weight.dims2()?;

    if rows <= current {
        return Ok(weight);
    }

    log::info!("Resizing token embeddings from {} to {}", current, rows);

    let dtype = weight.dtype();
    let extra = Tensor::randn(0f64, INITIALIZER_RANGE, (rows - current, hidden_size), weight.device())?
        .to_dtype(dtype)?;

    Ok(Tensor::cat(&[&weight, &extra], 0)?)
}

#[cfg(test)]
mod tests {
    use candle_core::DType;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_resize_rows_appends() -> anyhow::Result<()> {
        let weight = Tensor::ones((3, 4), DType::F32, &Device::Cpu)?;

        let resized = resize_rows(weight, 5)?;

        assert_eq!(resized.dims(), &[5, 4]);
        let rows = resized.to_vec2::<f32>()?;
        assert_eq!(rows[2], vec![1.0; 4]);

        Ok(())
    }

    #[test]
    fn test_resize_rows_never_shrinks() -> anyhow::Result<()> {
        let weight = Tensor::zeros((6, 2), DType::F32, &Device::Cpu)?;

        assert_eq!(resize_rows(weight, 4)?.dims(), &[6, 2]);

        Ok(())
    }
}
