use std::path::{Path, PathBuf};

use burn::{
    config::Config as _,
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::backend::Backend,
};
use tokenizers::Tokenizer;

use crate::models::bert::relation_classification::{Config, Model};

use super::config::Training;

/// Model weights, saved by the recorder with its own extension
pub const MODEL_FILE: &str = "model";
/// Model configuration
pub const CONFIG_FILE: &str = "config.json";
/// Tokenizer definition with the entity markers
pub const TOKENIZER_FILE: &str = "tokenizer.json";
/// Training arguments the checkpoint was produced with
pub const TRAINING_ARGS_FILE: &str = "training_args.json";

/// Checkpoint Error
#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    /// The checkpoint directory does not exist
    #[error("model doesn't exist at {0}, train first")]
    Missing(String),

    /// The directory exists but could not be loaded
    #[error("some model files might be missing in {dir}: {reason}")]
    Incomplete {
        /// The checkpoint directory
        dir: String,
        /// Description of the failure
        reason: String,
    },
}

/// A model loaded back from a checkpoint directory
pub struct Checkpoint<B: Backend> {
    /// The model configuration
    pub config: Config,

    /// The trained model
    pub model: Model<B>,

    /// The tokenizer, entity markers included
    pub tokenizer: Tokenizer,
}

/// Save the model, its configuration, the tokenizer and the training arguments, overwriting
pub fn save<B: Backend>(
    model_dir: &Path,
    model: &Model<B>,
    config: &Config,
    tokenizer: &Tokenizer,
    training: &Training,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(model_dir)?;

    CompactRecorder::new()
        .record(model.clone().into_record(), model_dir.join(MODEL_FILE))
        .map_err(|e| anyhow!("Unable to save model weights: {}", e))?;

    config.save(model_dir.join(CONFIG_FILE))?;
    training.save(model_dir.join(TRAINING_ARGS_FILE))?;

    tokenizer
        .save(model_dir.join(TOKENIZER_FILE), false)
        .map_err(|e| anyhow!("Unable to save tokenizer: {}", e))?;

    log::info!("Saving model checkpoint to {}", model_dir.display());

    Ok(())
}

/// Load a checkpoint written by [save]
pub fn load<B: Backend>(
    model_dir: &Path,
    device: &B::Device,
) -> Result<Checkpoint<B>, CheckpointError> {
    if !model_dir.is_dir() {
        return Err(CheckpointError::Missing(model_dir.display().to_string()));
    }

    let incomplete = |reason: String| CheckpointError::Incomplete {
        dir: model_dir.display().to_string(),
        reason,
    };

    let config = Config::load(model_dir.join(CONFIG_FILE)).map_err(|e| incomplete(e.to_string()))?;

    let tokenizer = Tokenizer::from_file(model_dir.join(TOKENIZER_FILE))
        .map_err(|e| incomplete(e.to_string()))?;

    let record = CompactRecorder::new()
        .load(model_dir.join(MODEL_FILE), device)
        .map_err(|e| incomplete(e.to_string()))?;

    let model = config.init::<B>(device).load_record(record);

    log::info!("***** Model Loaded *****");

    Ok(Checkpoint {
        config,
        model,
        tokenizer,
    })
}

/// Training arguments stored next to a checkpoint
pub fn training_args(model_dir: &Path) -> Result<Training, CheckpointError> {
    let path: PathBuf = model_dir.join(TRAINING_ARGS_FILE);

    Training::load(&path).map_err(|e| CheckpointError::Incomplete {
        dir: model_dir.display().to_string(),
        reason: e.to_string(),
    })
}
