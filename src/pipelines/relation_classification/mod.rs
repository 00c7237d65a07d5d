/// Training configuration
pub mod config;

/// Tokenizer setup and entity markers
pub mod tokenizer;

/// Example to feature conversion
pub mod features;

/// Feature caching
pub mod cache;

/// Batcher
pub mod batcher;

/// Learning rate schedule
pub mod schedule;

/// Global gradient norm clipping
pub mod clipping;

/// Early stopping on the dev loss
pub mod early_stopping;

/// Classification metrics
pub mod metrics;

/// Saving and loading trained models
pub mod checkpoint;

/// Training and evaluation
pub mod trainer;

/// Inference
pub mod inference;

pub use batcher::Batcher;
pub use config::Training;
pub use features::Feature;
pub use inference::infer;
pub use trainer::{Datasets, Trainer};
