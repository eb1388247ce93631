//! # MelNet Training
//!
//! Training loop for sequence-to-sequence text-to-spectrogram models with
//! attention and a stop-token predictor.
//!
//! ## Features
//! - Composite loss: spectrogram MSE plus stop-token BCE
//! - Step-keyed safetensors checkpoints
//! - Tensorboard scalars and attention/spectrogram images
//! - Pluggable model, optimizer, data and summary backends via traits
//! - candle tensors on CPU, CUDA or Metal
//!
//! ## Architecture
//!
//! ```text
//! BatchSource ──► SpeechBatch ──► SpeechModel::forward ──► composite_loss
//!                                                             │
//!                        ModelOptimizer: zero_grad → backward → step
//!                                                             │
//!               SummarySink (every step) · checkpoint + images (every log_interval)
//! ```

pub mod checkpoint;
pub mod config;
pub mod dataset;
pub mod error;
pub mod loss;
pub mod model;
pub mod optim;
pub mod summary;
pub mod text;
pub mod trainer;
pub mod visualize;

pub use checkpoint::{checkpoint_path, list_checkpoints, save_checkpoint};
pub use config::{ModelConfig, TrainingConfig};
pub use dataset::{collate, BatchSource, DataLoader, SpeechBatch, SpeechDataset, SpeechExample};
pub use error::TrainError;
pub use loss::{composite_loss, spectrogram_loss, stop_targets, stop_token_loss, LossBreakdown};
pub use model::{AttentionMelModel, ModelOutput, SpeechModel};
pub use optim::{CandleOptimizer, ModelOptimizer};
pub use summary::{NullSink, SummarySink, TensorboardSink};
pub use text::{sequence_to_text, text_to_sequence};
pub use trainer::train;
pub use visualize::{show_attention, show_spectrogram, RenderedImage};

/// Result type for training operations
pub type TrainResult<T> = Result<T, TrainError>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
