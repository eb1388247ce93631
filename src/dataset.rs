//! # Speech Dataset Loading
//!
//! Pairs of token sequences and mel spectrograms, batched and padded for the
//! training loop.
//!
//! Data can come from:
//! - A JSON Lines manifest, one `{"text": "...", "mel": "clip.npy"}` per line,
//!   where each `.npy` file holds a `[frames, n_mels]` array
//! - Synthetic random examples for smoke tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use melnet_train::dataset::{BatchSource, SpeechDataset};
//!
//! let dataset = SpeechDataset::from_manifest("data/train.jsonl", 80)?;
//! for batch in dataset.batches(16, &device) {
//!     let batch = batch?;
//!     // batch.text:  [batch, max_text_len]
//!     // batch.audio: [max_frames, batch, n_mels]
//! }
//! ```

use candle_core::{DType, Device, Tensor};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::TrainError;
use crate::text::{self, EOS_ID, PAD_ID};
use crate::TrainResult;

/// A single utterance
#[derive(Debug, Clone)]
pub struct SpeechExample {
    /// Token ids of the transcript
    pub tokens: Vec<u32>,
    /// Mel frames, `[frames][n_mels]`
    pub mel: Vec<Vec<f32>>,
}

impl SpeechExample {
    pub fn num_frames(&self) -> usize {
        self.mel.len()
    }
}

/// A padded batch ready for the model
#[derive(Debug)]
pub struct SpeechBatch {
    /// Token ids `[batch, max_text_len]`, padded with [`PAD_ID`]
    pub text: Tensor,
    /// Target spectrograms `[max_frames, batch, n_mels]`, zero padded
    pub audio: Tensor,
    /// Unpadded transcript lengths
    pub text_lengths: Vec<usize>,
    /// Unpadded frame counts
    pub audio_lengths: Vec<usize>,
}

impl SpeechBatch {
    pub fn batch_size(&self) -> usize {
        self.audio_lengths.len()
    }
}

/// Anything the training loop can draw fixed-size batches from
pub trait BatchSource {
    /// Number of batches one pass yields
    fn num_batches(&self, batch_size: usize) -> usize;

    /// Fresh iterator over one pass of the data
    fn batches<'a>(
        &'a self,
        batch_size: usize,
        device: &Device,
    ) -> Box<dyn Iterator<Item = TrainResult<SpeechBatch>> + 'a>;
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    text: String,
    mel: String,
}

/// In-memory dataset of utterances
#[derive(Debug, Clone)]
pub struct SpeechDataset {
    examples: Vec<SpeechExample>,
    n_mels: usize,
    shuffle: bool,
}

impl SpeechDataset {
    /// Create an empty dataset
    pub fn new(n_mels: usize) -> Self {
        Self {
            examples: Vec::new(),
            n_mels,
            shuffle: false,
        }
    }

    /// Add an utterance after checking its shape
    pub fn push(&mut self, example: SpeechExample) -> TrainResult<()> {
        if example.tokens.is_empty() {
            return Err(TrainError::InvalidBatch("example has no tokens".into()));
        }
        if example.mel.is_empty() {
            return Err(TrainError::InvalidBatch("example has no mel frames".into()));
        }
        if let Some(frame) = example.mel.iter().find(|f| f.len() != self.n_mels) {
            return Err(TrainError::InvalidBatch(format!(
                "mel frame has {} bins, expected {}",
                frame.len(),
                self.n_mels
            )));
        }
        self.examples.push(example);
        Ok(())
    }

    /// Load a JSON Lines manifest
    ///
    /// Mel paths are resolved relative to the manifest's directory.
    pub fn from_manifest(path: impl AsRef<Path>, n_mels: usize) -> TrainResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        let mut dataset = Self::new(n_mels);
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ManifestEntry = serde_json::from_str(line).map_err(|e| {
                TrainError::Serialization(format!("{}:{}: {}", path.display(), line_no + 1, e))
            })?;

            let mel = Tensor::read_npy(base.join(&entry.mel))?
                .to_dtype(DType::F32)?
                .to_vec2::<f32>()?;
            dataset.push(SpeechExample {
                tokens: text::text_to_sequence(&entry.text),
                mel,
            })?;
        }

        log::info!(
            "Loaded {} utterances from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    /// Random utterances for smoke tests
    pub fn synthetic(
        num_examples: usize,
        n_mels: usize,
        max_text_len: usize,
        max_frames: usize,
    ) -> Self {
        let mut rng = thread_rng();
        let vocab = text::vocab_size() as u32;

        let examples = (0..num_examples)
            .map(|_| {
                let text_len = rng.gen_range(1..=max_text_len.max(1));
                let mut tokens: Vec<u32> = (0..text_len)
                    .map(|_| rng.gen_range(EOS_ID + 1..vocab))
                    .collect();
                tokens.push(EOS_ID);

                let frames = rng.gen_range(1..=max_frames.max(1));
                let mel: Vec<Vec<f32>> = (0..frames)
                    .map(|_| {
                        (0..n_mels)
                            .map(|_| rng.gen_range(-1.0f32..1.0))
                            .collect::<Vec<f32>>()
                    })
                    .collect();
                SpeechExample { tokens, mel }
            })
            .collect();

        Self {
            examples,
            n_mels,
            shuffle: false,
        }
    }

    /// Shuffle example order at the start of every pass
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&SpeechExample> {
        self.examples.get(idx)
    }
}

impl BatchSource for SpeechDataset {
    fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size.max(1))
    }

    fn batches<'a>(
        &'a self,
        batch_size: usize,
        device: &Device,
    ) -> Box<dyn Iterator<Item = TrainResult<SpeechBatch>> + 'a> {
        Box::new(DataLoader::new(self, batch_size, self.shuffle, device.clone()))
    }
}

/// Pad and stack utterances into a [`SpeechBatch`]
///
/// Text is padded with [`PAD_ID`] and laid out `[batch, max_text_len]`;
/// audio is zero padded and laid out time-major, `[max_frames, batch, n_mels]`.
pub fn collate(
    examples: &[&SpeechExample],
    n_mels: usize,
    device: &Device,
) -> TrainResult<SpeechBatch> {
    if examples.is_empty() {
        return Err(TrainError::InvalidBatch("cannot collate an empty batch".into()));
    }
    let batch_size = examples.len();
    let text_lengths: Vec<usize> = examples.iter().map(|e| e.tokens.len()).collect();
    let audio_lengths: Vec<usize> = examples.iter().map(|e| e.num_frames()).collect();
    let max_text = text_lengths.iter().copied().max().unwrap_or(0);
    let max_frames = audio_lengths.iter().copied().max().unwrap_or(0);

    let mut text_data = vec![PAD_ID; batch_size * max_text];
    for (b, example) in examples.iter().enumerate() {
        let offset = b * max_text;
        text_data[offset..offset + example.tokens.len()].copy_from_slice(&example.tokens);
    }

    let mut audio_data = vec![0f32; max_frames * batch_size * n_mels];
    for (b, example) in examples.iter().enumerate() {
        for (t, frame) in example.mel.iter().enumerate() {
            if frame.len() != n_mels {
                return Err(TrainError::InvalidBatch(format!(
                    "mel frame has {} bins, expected {}",
                    frame.len(),
                    n_mels
                )));
            }
            let offset = (t * batch_size + b) * n_mels;
            audio_data[offset..offset + n_mels].copy_from_slice(frame);
        }
    }

    let text = Tensor::from_vec(text_data, (batch_size, max_text), device)?;
    let audio = Tensor::from_vec(audio_data, (max_frames, batch_size, n_mels), device)?;

    Ok(SpeechBatch {
        text,
        audio,
        text_lengths,
        audio_lengths,
    })
}

/// Iterates a [`SpeechDataset`] in fixed-size batches
///
/// The final batch is short when the dataset size is not a multiple of the
/// batch size.
pub struct DataLoader<'a> {
    dataset: &'a SpeechDataset,
    batch_size: usize,
    indices: Vec<usize>,
    position: usize,
    device: Device,
}

impl<'a> DataLoader<'a> {
    pub fn new(dataset: &'a SpeechDataset, batch_size: usize, shuffle: bool, device: Device) -> Self {
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            indices.shuffle(&mut thread_rng());
        }
        Self {
            dataset,
            batch_size: batch_size.max(1),
            indices,
            position: 0,
            device,
        }
    }

    /// Get the next batch
    pub fn next_batch(&mut self) -> Option<TrainResult<SpeechBatch>> {
        if self.position >= self.indices.len() {
            return None;
        }

        let end = (self.position + self.batch_size).min(self.indices.len());
        let examples: Vec<&SpeechExample> = self.indices[self.position..end]
            .iter()
            .map(|&i| &self.dataset.examples[i])
            .collect();
        self.position = end;

        Some(collate(&examples, self.dataset.n_mels, &self.device))
    }
}

impl Iterator for DataLoader<'_> {
    type Item = TrainResult<SpeechBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
