//! # Training Configuration
//!
//! JSON-serializable settings for the training run and the bundled model.
//!
//! ```rust,ignore
//! use melnet_train::config::TrainingConfig;
//!
//! let config = TrainingConfig::from_file("train.json")?;
//! config.validate()?;
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrainError;
use crate::TrainResult;

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of passes over the dataset
    pub num_epochs: usize,
    /// Examples per batch
    pub batch_size: usize,
    /// Steps between checkpoints and image summaries
    pub log_interval: usize,
    /// Optimizer learning rate
    pub learning_rate: f64,
    /// Directory receiving checkpoints (must already exist)
    pub checkpoint_dir: PathBuf,
    /// Checkpoint file name prefix
    pub checkpoint_prefix: String,
    /// Root directory for Tensorboard runs
    pub log_dir: PathBuf,
    /// Shuffle examples at the start of every epoch
    pub shuffle: bool,
    /// Model hyperparameters
    pub model: ModelConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 10,
            batch_size: 1,
            log_interval: 50,
            learning_rate: 1e-3,
            checkpoint_dir: PathBuf::from("checkpoints"),
            checkpoint_prefix: "melnet".to_string(),
            log_dir: PathBuf::from("runs"),
            shuffle: false,
            model: ModelConfig::default(),
        }
    }
}

impl TrainingConfig {
    /// Load a config from a JSON file; missing fields take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> TrainResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> TrainResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn validate(&self) -> TrainResult<()> {
        if self.batch_size == 0 {
            return Err(TrainError::InvalidConfig("batch_size must be > 0".into()));
        }
        if self.log_interval == 0 {
            return Err(TrainError::InvalidConfig("log_interval must be > 0".into()));
        }
        if self.checkpoint_prefix.is_empty() {
            return Err(TrainError::InvalidConfig(
                "checkpoint_prefix must not be empty".into(),
            ));
        }
        self.model.validate()
    }
}

/// Hyperparameters of [`crate::model::AttentionMelModel`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of text symbols
    pub vocab_size: usize,
    /// Mel bins per frame
    pub n_mels: usize,
    /// Width of the text encoder and decoder query
    pub hidden_dim: usize,
    /// Dropout applied to the attention context while training
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: crate::text::vocab_size(),
            n_mels: 80,
            hidden_dim: 128,
            dropout: 0.1,
        }
    }
}

impl ModelConfig {
    /// Small config for tests
    pub fn tiny() -> Self {
        Self {
            vocab_size: crate::text::vocab_size(),
            n_mels: 8,
            hidden_dim: 16,
            dropout: 0.0,
        }
    }

    pub fn validate(&self) -> TrainResult<()> {
        if self.vocab_size == 0 || self.n_mels == 0 || self.hidden_dim == 0 {
            return Err(TrainError::InvalidConfig(
                "vocab_size, n_mels and hidden_dim must be > 0".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(TrainError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }
}
