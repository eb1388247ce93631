//! # Training Summaries
//!
//! Tensorboard-compatible scalar and image logging.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use melnet_train::summary::{SummarySink, TensorboardSink};
//!
//! let mut sink = TensorboardSink::new("./runs")?;
//! sink.add_scalar("loss", 1.5, 100)?;
//! sink.add_image("attention", &image, 100)?;
//! sink.flush()?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tensorboard_rs::summary_writer::SummaryWriter;

use crate::visualize::RenderedImage;
use crate::TrainResult;

/// Destination for step-keyed scalars and images
pub trait SummarySink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: usize) -> TrainResult<()>;

    fn add_image(&mut self, tag: &str, image: &RenderedImage, step: usize) -> TrainResult<()>;

    fn flush(&mut self) -> TrainResult<()> {
        Ok(())
    }
}

/// Writes Tensorboard event files
pub struct TensorboardSink {
    writer: SummaryWriter,
    /// Directory of this run
    log_dir: PathBuf,
}

impl TensorboardSink {
    /// Create a sink writing to a timestamped subdirectory of `log_dir`
    pub fn new(log_dir: impl AsRef<Path>) -> TrainResult<Self> {
        let log_dir = log_dir.as_ref();

        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let run_dir = log_dir.join(format!("run_{}", timestamp));
        fs::create_dir_all(&run_dir)?;

        let writer = SummaryWriter::new(&run_dir);

        log::info!("Tensorboard logs: {:?}", run_dir);
        log::info!("View with: tensorboard --logdir {:?}", log_dir);

        Ok(Self {
            writer,
            log_dir: run_dir,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl SummarySink for TensorboardSink {
    fn add_scalar(&mut self, tag: &str, value: f32, step: usize) -> TrainResult<()> {
        self.writer.add_scalar(tag, value, step);
        Ok(())
    }

    fn add_image(&mut self, tag: &str, image: &RenderedImage, step: usize) -> TrainResult<()> {
        if image.width == 0 || image.height == 0 {
            log::warn!("Skipping empty image '{}' at step {}", tag, step);
            return Ok(());
        }
        // tensorboard-rs takes interleaved RGB bytes with dims [3, width, height]
        self.writer
            .add_image(tag, &image.pixels, &[3, image.width, image.height], step);
        if let Some(caption) = &image.caption {
            log::debug!("{} @ {}: {}", tag, step, caption);
        }
        Ok(())
    }

    fn flush(&mut self) -> TrainResult<()> {
        self.writer.flush();
        Ok(())
    }
}

impl Drop for TensorboardSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Discards every summary
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SummarySink for NullSink {
    fn add_scalar(&mut self, _tag: &str, _value: f32, _step: usize) -> TrainResult<()> {
        Ok(())
    }

    fn add_image(&mut self, _tag: &str, _image: &RenderedImage, _step: usize) -> TrainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn image() -> RenderedImage {
        RenderedImage {
            width: 2,
            height: 2,
            pixels: vec![128; 12],
            caption: Some("test".into()),
        }
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = NullSink;
        sink.add_scalar("loss", 1.0, 0).unwrap();
        sink.add_image("attention", &image(), 0).unwrap();
        sink.flush().unwrap();
    }

    /// Drops the sink so its writer thread finishes, then returns the event file
    fn event_file(log_dir: &Path, record: impl FnOnce(&mut TensorboardSink)) -> PathBuf {
        let mut sink = TensorboardSink::new(log_dir).unwrap();
        assert!(sink.log_dir().starts_with(log_dir));
        record(&mut sink);
        let run_dir = sink.log_dir().to_path_buf();
        drop(sink);

        let events: Vec<PathBuf> = fs::read_dir(&run_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("events.out.tfevents"))
            })
            .collect();
        assert_eq!(events.len(), 1, "event files in {:?}: {:?}", run_dir, events);
        events.into_iter().next().unwrap()
    }

    #[test]
    fn test_tensorboard_sink_writes_events() {
        let empty_dir = TempDir::new().unwrap();
        let header_only = event_file(empty_dir.path(), |_| {});

        let dir = TempDir::new().unwrap();
        let recorded = event_file(dir.path(), |sink| {
            sink.add_scalar("loss", 0.5, 0).unwrap();
            sink.add_image("attention", &image(), 0).unwrap();
            sink.flush().unwrap();
        });

        let header_len = fs::metadata(&header_only).unwrap().len();
        let recorded_len = fs::metadata(&recorded).unwrap().len();
        assert!(
            recorded_len > header_len,
            "{} bytes with records, {} without",
            recorded_len,
            header_len
        );
    }
}
