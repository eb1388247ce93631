//! Error types for spectrogram model training

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid training config: {0}")]
    InvalidConfig(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(String),

    #[error("Checkpoint directory does not exist: {0:?}")]
    MissingCheckpointDir(PathBuf),

    #[error("Optimizer step called without gradients; call backward first")]
    MissingGradients,
}

impl From<serde_json::Error> for TrainError {
    fn from(e: serde_json::Error) -> Self {
        TrainError::Serialization(e.to_string())
    }
}
