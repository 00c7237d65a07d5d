use std::path::{Path, PathBuf};

use hf_hub::api::tokio;

/// Paths to the files that make up a pretrained model
#[derive(Clone, Debug)]
pub struct ModelFiles {
    /// The Hugging Face `config.json`
    pub config: PathBuf,

    /// The `model.safetensors` weights
    pub weights: PathBuf,

    /// The `tokenizer.json` definition
    pub tokenizer: PathBuf,
}

/// Resolve the files for a pretrained model, either from a local directory or from the Hub
///
/// Hub downloads are cached, so files are only fetched once.
// NOTE: Uses the async API to work within an already-async context
pub async fn resolve_model_files(model_name_or_path: &str) -> anyhow::Result<ModelFiles> {
    let local = Path::new(model_name_or_path);
    if local.is_dir() {
        return local_model_files(local);
    }

    let api = tokio::Api::new().map_err(|e| anyhow!("Unable to reach the Hugging Face Hub: {e}"))?;
    let repo = api.model(model_name_or_path.to_string());

    let mut fetched = Vec::with_capacity(3);
    for file in ["config.json", "model.safetensors", "tokenizer.json"] {
        let path = repo.get(file).await.map_err(|e| {
            anyhow!("Failed to download: {model_name_or_path} file {file} from HuggingFace Hub: {e}")
        })?;

        fetched.push(path);
    }

    let [config, weights, tokenizer]: [PathBuf; 3] = fetched
        .try_into()
        .map_err(|_| anyhow!("Incomplete download for {model_name_or_path}"))?;

    Ok(ModelFiles {
        config,
        weights,
        tokenizer,
    })
}

fn local_model_files(dir: &Path) -> anyhow::Result<ModelFiles> {
    let files = ModelFiles {
        config: dir.join("config.json"),
        weights: dir.join("model.safetensors"),
        tokenizer: dir.join("tokenizer.json"),
    };

    for path in [&files.config, &files.weights, &files.tokenizer] {
        if !path.is_file() {
            return Err(anyhow!("Missing pretrained model file: {}", path.display()));
        }
    }

    Ok(files)
}

/// The short model name used in cache file names (e.g., "bert-base" for "klue/bert-base/")
pub fn short_model_name(model_name_or_path: &str) -> &str {
    model_name_or_path
        .split('/')
        .filter(|part| !part.is_empty())
        .last()
        .unwrap_or(model_name_or_path)
}
