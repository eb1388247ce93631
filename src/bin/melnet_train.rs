//! # MelNet Training CLI
//!
//! ## Usage
//!
//! ```bash
//! # Train on a manifest of (text, mel .npy) pairs
//! melnet_train --manifest data/train.jsonl --epochs 10 --batch-size 16
//!
//! # Settings from a JSON file, with CLI overrides
//! melnet_train --config train.json --manifest data/train.jsonl --log-interval 100
//!
//! # Smoke test on random data
//! melnet_train --synthetic 64 --epochs 2
//! ```
//!
//! The checkpoint directory must exist before training starts.

use candle_core::Device;
use clap::Parser;
use std::path::PathBuf;

use melnet_train::{
    train, AttentionMelModel, CandleOptimizer, SpeechDataset, TensorboardSink, TrainingConfig,
};

/// Train a text-to-spectrogram model
#[derive(Parser, Debug)]
#[command(name = "melnet_train")]
#[command(about = "Train an attention text-to-spectrogram model")]
#[command(version)]
struct Args {
    /// JSON training config; CLI flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON Lines manifest of {"text", "mel"} entries
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Train on N random utterances instead of a manifest
    #[arg(long)]
    synthetic: Option<usize>,

    /// Number of training epochs
    #[arg(short, long)]
    epochs: Option<usize>,

    /// Batch size
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Steps between checkpoints and image summaries
    #[arg(long)]
    log_interval: Option<usize>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Checkpoint directory (must exist)
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Tensorboard log directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Shuffle examples every epoch
    #[arg(long)]
    shuffle: bool,
}

impl Args {
    fn training_config(&self) -> Result<TrainingConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_file(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(epochs) = self.epochs {
            config.num_epochs = epochs;
        }
        if let Some(bs) = self.batch_size {
            config.batch_size = bs;
        }
        if let Some(interval) = self.log_interval {
            config.log_interval = interval;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(dir) = &self.checkpoint_dir {
            config.checkpoint_dir = dir.clone();
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = dir.clone();
        }
        if self.shuffle {
            config.shuffle = true;
        }
        config.validate()?;
        Ok(config)
    }
}

fn select_device() -> Device {
    if cfg!(feature = "cuda") {
        match Device::cuda_if_available(0) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("CUDA not available ({}), using CPU", e);
                Device::Cpu
            }
        }
    } else if cfg!(feature = "metal") {
        Device::new_metal(0).unwrap_or(Device::Cpu)
    } else {
        Device::Cpu
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.training_config()?;
    let device = select_device();
    log::info!("Device: {:?}", device);

    let dataset = match (&args.manifest, args.synthetic) {
        (Some(path), _) => SpeechDataset::from_manifest(path, config.model.n_mels)?,
        (None, Some(n)) => {
            log::info!("Using {} synthetic utterances", n);
            SpeechDataset::synthetic(n, config.model.n_mels, 40, 120)
        }
        (None, None) => return Err("either --manifest or --synthetic is required".into()),
    }
    .with_shuffle(config.shuffle);

    if dataset.is_empty() {
        return Err("dataset is empty".into());
    }

    let mut model = AttentionMelModel::new(config.model.clone(), &device)?;
    let mut optimizer = CandleOptimizer::adamw(model.varmap().all_vars(), config.learning_rate)?;
    let mut sink = TensorboardSink::new(&config.log_dir)?;

    train(&mut model, &mut optimizer, &dataset, &mut sink, &config)?;
    Ok(())
}
