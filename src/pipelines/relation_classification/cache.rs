use std::path::PathBuf;

use tokenizers::Tokenizer;

use crate::{
    datasets::{
        tlink::{Dataset, Labels},
        Mode,
    },
    utils::{classes::balanced_weights, hugging_face::short_model_name},
};

use super::{config::Training, features::convert_examples_to_features, Feature};

/// The cache file for a split, such as `data/cached_tlink-re_bert-base_128_train`
pub fn cached_features_file(config: &Training, mode: Mode) -> PathBuf {
    let file_name = format!(
        "cached_{}_{}_{}_{}",
        config.task,
        short_model_name(&config.model_name_or_path),
        config.max_seq_len,
        mode
    );

    PathBuf::from(&config.data_dir).join(file_name)
}

/// Load features for a split from the cache, or build them from the data file and cache them
pub async fn load_and_cache_examples(
    config: &Training,
    tokenizer: &Tokenizer,
    labels: &Labels,
    mode: Mode,
) -> anyhow::Result<Vec<Feature>> {
    let cached_file = cached_features_file(config, mode);

    if config.use_cache && tokio::fs::try_exists(&cached_file).await? {
        log::info!("Loading features from cached file {}", cached_file.display());

        let bytes = tokio::fs::read(&cached_file).await?;
        let features = serde_json::from_slice(&bytes).map_err(|e| {
            anyhow!(
                "Unable to read cached features {}: {}",
                cached_file.display(),
                e
            )
        })?;

        return Ok(features);
    }

    log::info!("Creating features from dataset file at {}", config.data_dir);

    let examples = Dataset::load(config.data_file(mode), mode, labels)
        .await?
        .into_items();

    let features = convert_examples_to_features(&examples, config.max_seq_len, tokenizer)?;

    log::info!("Saving features into cached file {}", cached_file.display());
    tokio::fs::write(&cached_file, serde_json::to_vec(&features)?).await?;

    Ok(features)
}

/// Balanced class weights for the loss, computed from the training features
pub fn class_weights(features: &[Feature], labels: &Labels) -> Vec<f32> {
    let label_ids: Vec<usize> = features.iter().map(|f| f.label_id).collect();

    balanced_weights(&label_ids, labels.len())
}

#[cfg(test)]
mod tests {
    use burn::config::Config as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pipelines::relation_classification::tokenizer::tests::test_tokenizer;

    fn config(data_dir: &std::path::Path) -> Training {
        Training::new()
            .with_data_dir(data_dir.display().to_string())
            .with_model_name_or_path("klue/bert-base/".to_string())
            .with_max_seq_len(16)
    }

    #[test]
    fn test_cached_features_file() {
        let config = Training::new().with_model_name_or_path("klue/bert-base".to_string());

        assert_eq!(
            cached_features_file(&config, Mode::Dev),
            PathBuf::from("data/cached_tlink-re_bert-base_128_dev")
        );
    }

    #[tokio::test]
    async fn test_features_are_cached() -> anyhow::Result<()> {
        let data_dir = std::env::temp_dir().join("burn-tlink-cache-test");
        tokio::fs::create_dir_all(&data_dir).await?;
        tokio::fs::write(
            data_dir.join("train.tsv"),
            "[B1] 어제 [E1] 회의가 [B2] 열렸다 [E2]\tBEFORE\n[B2] a [E2] [B1] b [E1]\tAFTER\n",
        )
        .await?;

        let config = config(&data_dir);
        let labels = Labels::new(vec!["AFTER".into(), "BEFORE".into()]);
        let tokenizer = test_tokenizer();

        let features = load_and_cache_examples(&config, &tokenizer, &labels, Mode::Train).await?;
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].label_id, 1);

        let cached_file = cached_features_file(&config, Mode::Train);
        assert!(cached_file.exists());

        // The cache wins over the data file while use_cache is set
        tokio::fs::write(data_dir.join("train.tsv"), "").await?;
        let cached = load_and_cache_examples(&config, &tokenizer, &labels, Mode::Train).await?;
        assert_eq!(cached, features);

        let rebuilt = load_and_cache_examples(
            &config.clone().with_use_cache(false),
            &tokenizer,
            &labels,
            Mode::Train,
        )
        .await?;
        assert!(rebuilt.is_empty());

        tokio::fs::remove_dir_all(data_dir).await?;

        Ok(())
    }

    #[test]
    fn test_class_weights() {
        let labels = Labels::new(vec!["AFTER".into(), "BEFORE".into()]);
        let feature = |label_id| Feature {
            input_ids: vec![],
            attention_mask: vec![],
            token_type_ids: vec![],
            entity_starts: [0, 0],
            label_id,
        };

        let weights = class_weights(&[feature(0), feature(0), feature(1), feature(1)], &labels);

        // AFTER, BEFORE and the UNK bucket
        assert_eq!(weights, vec![4.0 / 6.0, 4.0 / 6.0, 1.0]);
    }
}
