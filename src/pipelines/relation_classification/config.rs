use std::path::PathBuf;

use burn::LearningRate;

use crate::datasets::Mode;

/// Define configuration struct for the experiment
#[derive(burn::config::Config)]
pub struct Training {
    /// The task name, used in cache file names
    #[config(default = "\"tlink-re\".to_string()")]
    pub task: String,

    /// Model name on the Hub or a local directory (e.g., "klue/bert-base")
    #[config(default = "\"klue/bert-base\".to_string()")]
    pub model_name_or_path: String,

    /// The directory holding the data files and the feature caches
    #[config(default = "\"data\".to_string()")]
    pub data_dir: String,

    /// Training file name inside `data_dir`
    #[config(default = "\"train.tsv\".to_string()")]
    pub train_file: String,

    /// Development file name inside `data_dir`
    #[config(default = "\"dev.tsv\".to_string()")]
    pub val_file: String,

    /// Test file name inside `data_dir`
    #[config(default = "\"test.tsv\".to_string()")]
    pub test_file: String,

    /// Label file name inside `data_dir`, one label per line
    #[config(default = "\"labels.txt\".to_string()")]
    pub label_file: String,

    /// Where checkpoints are written
    #[config(default = "\"model\".to_string()")]
    pub model_dir: String,

    /// Where prediction files are written
    #[config(default = "\"preds\".to_string()")]
    pub pred_dir: String,

    /// Maximum sequence length, special tokens included
    #[config(default = 128)]
    pub max_seq_len: usize,

    /// Training batch size
    #[config(default = 32)]
    pub train_batch_size: usize,

    /// Evaluation batch size
    #[config(default = 64)]
    pub eval_batch_size: usize,

    /// Number of epochs
    #[config(default = 5)]
    pub num_train_epochs: usize,

    /// Total number of optimizer steps; overrides `num_train_epochs` when above 0
    #[config(default = 0)]
    pub max_steps: usize,

    /// Batches accumulated before each optimizer step
    #[config(default = 1)]
    pub gradient_accumulation_steps: usize,

    /// Initial learning rate
    #[config(default = 5e-5)]
    pub learning_rate: LearningRate,

    /// AdamW weight decay
    #[config(default = 0.0)]
    pub weight_decay: f32,

    /// Adam epsilon
    #[config(default = 1e-8)]
    pub adam_epsilon: f32,

    /// Gradient norm clipping threshold
    #[config(default = 1.0)]
    pub max_grad_norm: f32,

    /// Linear warmup steps
    #[config(default = 0)]
    pub warmup_steps: usize,

    /// Dropout rate
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,

    /// Evaluate on the dev split every N optimizer steps (0 disables)
    #[config(default = 200)]
    pub logging_steps: usize,

    /// Save a checkpoint every N optimizer steps (0 saves once after training)
    #[config(default = 200)]
    pub save_steps: usize,

    /// Dev evaluations with a rising loss tolerated before stopping (0 disables)
    #[config(default = 3)]
    pub patience: usize,

    /// Shuffle seed
    #[config(default = 42)]
    pub seed: u64,

    /// Reuse cached features when present
    #[config(default = true)]
    pub use_cache: bool,

    /// Weight the loss with balanced class weights from the training split
    #[config(default = false)]
    pub compute_class_weight: bool,

    /// Write per-example predictions on each evaluation
    #[config(default = false)]
    pub write_pred: bool,

    /// Train on the CPU even if CUDA is available
    #[config(default = false)]
    pub no_cuda: bool,
}

impl Training {
    /// The data file for a split
    pub fn data_file(&self, mode: Mode) -> PathBuf {
        let file = match mode {
            Mode::Train => &self.train_file,
            Mode::Dev => &self.val_file,
            Mode::Test => &self.test_file,
        };

        PathBuf::from(&self.data_dir).join(file)
    }

    /// The label file
    pub fn label_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.label_file)
    }
}

#[cfg(test)]
mod tests {
    use burn::config::Config as _;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_data_files() {
        let config = Training::new().with_data_dir("corpus".to_string());

        assert_eq!(config.data_file(Mode::Train), PathBuf::from("corpus/train.tsv"));
        assert_eq!(config.data_file(Mode::Dev), PathBuf::from("corpus/dev.tsv"));
        assert_eq!(config.data_file(Mode::Test), PathBuf::from("corpus/test.tsv"));
        assert_eq!(config.label_path(), PathBuf::from("corpus/labels.txt"));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("burn-tlink-training-args.json");
        let config = Training::new().with_patience(5).with_write_pred(true);

        config.save(&path).unwrap();
        let loaded = Training::load(&path).unwrap();

        assert_eq!(loaded.patience, 5);
        assert!(loaded.write_pred);
        assert_eq!(loaded.max_seq_len, 128);

        std::fs::remove_file(path).unwrap();
    }
}
