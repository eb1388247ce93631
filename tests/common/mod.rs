//! Recording collaborators for driving the training loop in tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use candle_core::{DType, Device, Tensor};
use melnet_train::{
    ModelOptimizer, ModelOutput, RenderedImage, SpeechDataset, SpeechExample, SpeechModel,
    SummarySink, TrainResult,
};

/// Ordered record of every collaborator call
pub type EventLog = Rc<RefCell<Vec<String>>>;

pub fn event_log() -> EventLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Predicts zeros everywhere; snapshots are small marker files
pub struct MockModel {
    pub device: Device,
    pub training: bool,
    pub events: EventLog,
}

impl MockModel {
    pub fn new(events: EventLog) -> Self {
        Self {
            device: Device::Cpu,
            training: false,
            events,
        }
    }
}

impl SpeechModel for MockModel {
    fn device(&self) -> &Device {
        &self.device
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.events.borrow_mut().push(format!("train_mode:{}", training));
    }

    fn forward(&self, text: &Tensor, targets: &Tensor) -> TrainResult<ModelOutput> {
        self.events.borrow_mut().push("forward".into());
        let (batch, text_len) = text.dims2()?;
        let (frames, _, _) = targets.dims3()?;
        Ok(ModelOutput {
            spectrogram: targets.zeros_like()?,
            stop_logits: Tensor::zeros((batch, frames), DType::F32, &self.device)?,
            attention: Tensor::zeros((batch, frames, text_len), DType::F32, &self.device)?,
        })
    }

    fn save(&self, path: &Path) -> TrainResult<()> {
        self.events
            .borrow_mut()
            .push(format!("save:{}", path.display()));
        fs::write(path, b"mock")?;
        Ok(())
    }
}

pub struct MockOptimizer {
    pub events: EventLog,
}

impl ModelOptimizer for MockOptimizer {
    fn zero_grad(&mut self) -> TrainResult<()> {
        self.events.borrow_mut().push("zero_grad".into());
        Ok(())
    }

    fn backward(&mut self, _loss: &Tensor) -> TrainResult<()> {
        self.events.borrow_mut().push("backward".into());
        Ok(())
    }

    fn step(&mut self) -> TrainResult<()> {
        self.events.borrow_mut().push("step".into());
        Ok(())
    }
}

/// Keeps every scalar and image it receives
#[derive(Default)]
pub struct RecordingSink {
    pub scalars: Vec<(String, f32, usize)>,
    pub images: Vec<(String, usize, RenderedImage)>,
    pub flushes: usize,
}

impl RecordingSink {
    pub fn scalar_steps(&self) -> Vec<usize> {
        self.scalars.iter().map(|(_, _, s)| *s).collect()
    }

    pub fn image_steps(&self, tag: &str) -> Vec<usize> {
        self.images
            .iter()
            .filter(|(t, _, _)| t == tag)
            .map(|(_, s, _)| *s)
            .collect()
    }
}

impl SummarySink for RecordingSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: usize) -> TrainResult<()> {
        self.scalars.push((tag.to_string(), value, step));
        Ok(())
    }

    fn add_image(&mut self, tag: &str, image: &RenderedImage, step: usize) -> TrainResult<()> {
        self.images.push((tag.to_string(), step, image.clone()));
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// `count` identical utterances with every mel value set to `value`
pub fn constant_dataset(count: usize, n_mels: usize, frames: usize, value: f32) -> SpeechDataset {
    let mut dataset = SpeechDataset::new(n_mels);
    for _ in 0..count {
        dataset
            .push(SpeechExample {
                tokens: melnet_train::text_to_sequence("Hello"),
                mel: vec![vec![value; n_mels]; frames],
            })
            .unwrap();
    }
    dataset
}
