/// The model configuration
pub mod config;

/// Pretrained weight loading
pub mod loader;

/// BERT for Relation Classification
pub mod model;

pub use config::Config;
pub use model::{Model, ModelRecord};
