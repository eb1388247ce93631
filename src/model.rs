//! # Spectrogram Model
//!
//! The [`SpeechModel`] trait is everything the training loop needs from a
//! text-to-spectrogram network. [`AttentionMelModel`] is a compact
//! implementation used by the CLI and the tests:
//!
//! ```text
//! text ids ──► Embedding ──► Linear+tanh ──► keys [B, Tt, H]
//!                                               │
//! targets (shifted by one frame) ──► Prenet ──► queries [B, T, H]
//!                                               │
//!                          softmax(q·kᵀ/√H) ──► attention [B, T, Tt]
//!                                               │
//!                   [queries ‖ context] ──► mel head  ──► spectrogram [T, B, M]
//!                                       └─► stop head ──► stop logits [B, T]
//! ```

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{embedding, linear, Embedding, Linear, Module, VarBuilder, VarMap};
use std::path::Path;

use crate::config::ModelConfig;
use crate::error::TrainError;
use crate::TrainResult;

/// Result of one forward pass
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// Predicted spectrogram `[frames, batch, n_mels]`
    pub spectrogram: Tensor,
    /// Stop-token logits `[batch, frames]`
    pub stop_logits: Tensor,
    /// Alignment weights `[batch, frames, text_len]`
    pub attention: Tensor,
}

/// A trainable text-to-spectrogram network
pub trait SpeechModel {
    /// Device inputs must be placed on
    fn device(&self) -> &Device;

    /// Toggle training-only behaviour such as dropout
    fn set_training(&mut self, training: bool);

    /// Teacher-forced forward pass
    ///
    /// `text` is `[batch, text_len]` token ids, `targets` is
    /// `[frames, batch, n_mels]`.
    fn forward(&self, text: &Tensor, targets: &Tensor) -> TrainResult<ModelOutput>;

    /// Write a full parameter snapshot
    fn save(&self, path: &Path) -> TrainResult<()>;
}

/// Single-layer attention model over mel frames
pub struct AttentionMelModel {
    config: ModelConfig,
    embedding: Embedding,
    encoder: Linear,
    prenet: Linear,
    mel_head: Linear,
    stop_head: Linear,
    varmap: VarMap,
    device: Device,
    training: bool,
}

impl AttentionMelModel {
    /// Create a freshly initialised model
    pub fn new(config: ModelConfig, device: &Device) -> TrainResult<Self> {
        config.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let hidden = config.hidden_dim;

        let embedding = embedding(config.vocab_size, hidden, vb.pp("embedding"))?;
        let encoder = linear(hidden, hidden, vb.pp("encoder"))?;
        let prenet = linear(config.n_mels, hidden, vb.pp("prenet"))?;
        let mel_head = linear(2 * hidden, config.n_mels, vb.pp("mel_head"))?;
        let stop_head = linear(2 * hidden, 1, vb.pp("stop_head"))?;

        Ok(Self {
            config,
            embedding,
            encoder,
            prenet,
            mel_head,
            stop_head,
            varmap,
            device: device.clone(),
            training: false,
        })
    }

    /// Parameters, for building an optimizer
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Decoder inputs: a zero "go" frame followed by all but the last target
    fn shifted_targets(&self, targets: &Tensor) -> TrainResult<Tensor> {
        let (frames, batch, n_mels) = targets.dims3()?;
        let go = Tensor::zeros((1, batch, n_mels), targets.dtype(), &self.device)?;
        let previous = if frames > 1 {
            Tensor::cat(&[&go, &targets.narrow(0, 0, frames - 1)?], 0)?
        } else {
            go
        };
        Ok(previous.transpose(0, 1)?.contiguous()?)
    }
}

impl SpeechModel for AttentionMelModel {
    fn device(&self) -> &Device {
        &self.device
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&self, text: &Tensor, targets: &Tensor) -> TrainResult<ModelOutput> {
        let (batch, _text_len) = text.dims2()?;
        let (_frames, target_batch, n_mels) = targets.dims3()?;
        if target_batch != batch || n_mels != self.config.n_mels {
            return Err(TrainError::InvalidBatch(format!(
                "targets {:?} incompatible with batch {} and {} mel bins",
                targets.dims(),
                batch,
                self.config.n_mels
            )));
        }

        let keys = self
            .encoder
            .forward(&self.embedding.forward(text)?)?
            .tanh()?;

        let previous = self.shifted_targets(targets)?;
        let queries = self.prenet.forward(&previous)?.relu()?;

        let scale = (self.config.hidden_dim as f64).sqrt();
        let scores = (queries.matmul(&keys.transpose(1, 2)?.contiguous()?)? / scale)?;
        let attention = candle_nn::ops::softmax(&scores, D::Minus1)?;

        let mut context = attention.matmul(&keys)?;
        if self.training && self.config.dropout > 0.0 {
            context = candle_nn::ops::dropout(&context, self.config.dropout)?;
        }

        let features = Tensor::cat(&[&queries, &context], 2)?;
        let spectrogram = self
            .mel_head
            .forward(&features)?
            .transpose(0, 1)?
            .contiguous()?;
        let stop_logits = self.stop_head.forward(&features)?.squeeze(2)?;

        Ok(ModelOutput {
            spectrogram,
            stop_logits,
            attention,
        })
    }

    fn save(&self, path: &Path) -> TrainResult<()> {
        self.varmap.save(path)?;
        Ok(())
    }
}
