//! # Model Checkpointing
//!
//! Step-keyed parameter snapshots written during training.
//!
//! ## File Layout
//!
//! ```text
//! checkpoints/
//! ├── melnet_0.safetensors
//! ├── melnet_50.safetensors
//! └── melnet_100.safetensors
//! ```
//!
//! Files are never rotated or pruned. The directory must exist before
//! training starts.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrainError;
use crate::model::SpeechModel;
use crate::TrainResult;

pub const CHECKPOINT_EXTENSION: &str = "safetensors";

/// Path of the snapshot for `step`
pub fn checkpoint_path(dir: impl AsRef<Path>, prefix: &str, step: usize) -> PathBuf {
    dir.as_ref()
        .join(format!("{}_{}.{}", prefix, step, CHECKPOINT_EXTENSION))
}

/// Write a full parameter snapshot of `model` to `path`
///
/// The parent directory is not created.
pub fn save_checkpoint<M: SpeechModel + ?Sized>(model: &M, path: impl AsRef<Path>) -> TrainResult<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(TrainError::MissingCheckpointDir(dir.to_path_buf()));
    }

    model.save(path)?;
    log::info!("Saved checkpoint to {:?}", path);
    Ok(())
}

/// Step parsed from a checkpoint file name, if it matches `prefix`
fn parse_step(file_name: &str, prefix: &str) -> Option<usize> {
    file_name
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(CHECKPOINT_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

/// List checkpoints in `dir` as `(step, path)`, lowest step first
pub fn list_checkpoints(dir: impl AsRef<Path>, prefix: &str) -> TrainResult<Vec<(usize, PathBuf)>> {
    let dir = dir.as_ref();
    let mut checkpoints = Vec::new();

    if !dir.exists() {
        return Ok(checkpoints);
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let step = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| parse_step(n, prefix));
        if let Some(step) = step {
            checkpoints.push((step, path));
        }
    }

    checkpoints.sort_by_key(|(step, _)| *step);
    Ok(checkpoints)
}
