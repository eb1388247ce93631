//! # Training Loop
//!
//! Epoch/batch iteration for a [`SpeechModel`]:
//! - Teacher-forced forward pass and composite loss
//! - One optimizer update per batch
//! - `loss` scalar every step
//! - Checkpoint plus attention/output/target images every `log_interval` steps
//!
//! ## Usage
//!
//! ```rust,ignore
//! use melnet_train::{train, AttentionMelModel, CandleOptimizer, TensorboardSink};
//!
//! let mut model = AttentionMelModel::new(config.model.clone(), &device)?;
//! let mut optimizer = CandleOptimizer::adamw(model.varmap().all_vars(), config.learning_rate)?;
//! let mut sink = TensorboardSink::new(&config.log_dir)?;
//! train(&mut model, &mut optimizer, &dataset, &mut sink, &config)?;
//! ```

use candle_core::{Device, Tensor};
use indicatif::{ProgressBar, ProgressStyle};

use crate::checkpoint::{checkpoint_path, save_checkpoint};
use crate::config::TrainingConfig;
use crate::dataset::{BatchSource, SpeechBatch};
use crate::loss::{composite_loss, stop_targets, LossBreakdown};
use crate::model::{ModelOutput, SpeechModel};
use crate::optim::ModelOptimizer;
use crate::summary::SummarySink;
use crate::text::sequence_to_text;
use crate::visualize::{show_attention, show_spectrogram};
use crate::TrainResult;

pub const TAG_LOSS: &str = "loss";
pub const TAG_ATTENTION: &str = "attention";
pub const TAG_OUTPUT: &str = "output";
pub const TAG_TARGET: &str = "target";

const PROGRESS_TEMPLATE: &str = "  {bar:40.green/black} {pos}/{len} [{elapsed}<{eta}] {msg}";

/// Train `model` on `dataset` for `config.num_epochs` epochs
///
/// The global step starts at 0 and is never reset between epochs. Any
/// error from a collaborator aborts the run.
pub fn train<M, O, D, S>(
    model: &mut M,
    optimizer: &mut O,
    dataset: &D,
    sink: &mut S,
    config: &TrainingConfig,
) -> TrainResult<()>
where
    M: SpeechModel + ?Sized,
    O: ModelOptimizer + ?Sized,
    D: BatchSource + ?Sized,
    S: SummarySink + ?Sized,
{
    config.validate()?;
    model.set_training(true);

    let num_batches = dataset.num_batches(config.batch_size);
    log::info!("Starting training...");
    log::info!("  Epochs: {}", config.num_epochs);
    log::info!("  Batch size: {}", config.batch_size);
    log::info!("  Batches per epoch: {}", num_batches);

    let mut step = 0usize;
    for epoch in 0..config.num_epochs {
        log::info!("Epoch {}/{}", epoch + 1, config.num_epochs);

        let pb = ProgressBar::new(num_batches as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            pb.set_style(style);
        }

        let mut epoch_loss = 0.0f64;
        let mut epoch_batches = 0usize;

        for batch in dataset.batches(config.batch_size, model.device()) {
            let batch = batch?;
            let loss_value = train_step(model, optimizer, sink, config, &batch, step)?;

            epoch_loss += loss_value as f64;
            epoch_batches += 1;

            pb.set_message(format!("loss: {:.4}", loss_value));
            pb.inc(1);

            step += 1;
        }

        pb.finish_and_clear();
        log::info!(
            "Epoch {} complete | Avg Loss: {:.4} | {} batches",
            epoch + 1,
            epoch_loss / epoch_batches.max(1) as f64,
            epoch_batches
        );
    }

    sink.flush()?;
    log::info!("Training complete after {} steps", step);
    Ok(())
}

/// One optimizer update; returns the batch loss
fn train_step<M, O, S>(
    model: &mut M,
    optimizer: &mut O,
    sink: &mut S,
    config: &TrainingConfig,
    batch: &SpeechBatch,
    step: usize,
) -> TrainResult<f32>
where
    M: SpeechModel + ?Sized,
    O: ModelOptimizer + ?Sized,
    S: SummarySink + ?Sized,
{
    let device = model.device().clone();
    let text = batch.text.to_device(&device)?;
    let targets = supervision_targets(&batch.audio, &device)?;

    let (frames, _, _) = targets.dims3()?;
    let stops = stop_targets(&batch.audio_lengths, frames, &device)?;

    let output = model.forward(&text, &targets)?;
    let loss: LossBreakdown = composite_loss(&output, &targets, &stops)?;

    optimizer.zero_grad()?;
    optimizer.backward(&loss.total)?;
    optimizer.step()?;

    let loss_value = loss.total_value()?;
    sink.add_scalar(TAG_LOSS, loss_value, step)?;

    if step % config.log_interval == 0 {
        let path = checkpoint_path(&config.checkpoint_dir, &config.checkpoint_prefix, step);
        save_checkpoint(&*model, &path)?;
        log_first_sample(sink, &text, &output, &targets, step)?;
    }

    Ok(loss_value)
}

/// Audio moved to `device` with no gradient flowing back into it
fn supervision_targets(audio: &Tensor, device: &Device) -> TrainResult<Tensor> {
    Ok(audio.to_device(device)?.detach())
}

/// `[frames, batch, n_mels]` -> `[n_mels, frames]` for the first sample
fn first_spectrogram(spectrogram: &Tensor) -> TrainResult<Tensor> {
    Ok(spectrogram.narrow(1, 0, 1)?.squeeze(1)?.t()?)
}

/// Record attention, predicted and target images for sample 0
fn log_first_sample<S: SummarySink + ?Sized>(
    sink: &mut S,
    text: &Tensor,
    output: &ModelOutput,
    targets: &Tensor,
    step: usize,
) -> TrainResult<()> {
    let caption = sequence_to_text(&text.get(0)?.to_vec1::<u32>()?);

    let attention_plot = show_attention(&output.attention.get(0)?)?;
    let output_plot = show_spectrogram(&first_spectrogram(&output.spectrogram)?, &caption)?;
    let target_plot = show_spectrogram(&first_spectrogram(targets)?, &caption)?;

    sink.add_image(TAG_ATTENTION, &attention_plot, step)?;
    sink.add_image(TAG_OUTPUT, &output_plot, step)?;
    sink.add_image(TAG_TARGET, &target_plot, step)?;
    Ok(())
}
