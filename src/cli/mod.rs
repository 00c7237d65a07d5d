/// Available pipelines
pub mod pipelines;

/// Available models
pub mod models;
