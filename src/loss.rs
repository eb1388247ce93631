//! # Training Losses
//!
//! Composite objective: frame-wise mean squared error on the spectrogram plus
//! binary cross-entropy on the stop-token logits, summed without weights.

use candle_core::{DType, Device, Tensor};

use crate::error::TrainError;
use crate::model::ModelOutput;
use crate::TrainResult;

/// Build the stop-token targets for a batch
///
/// Row `i` of the `[batch, max_len]` result is 1 at `audio_lengths[i] - 1`
/// and 0 everywhere else.
pub fn stop_targets(audio_lengths: &[usize], max_len: usize, device: &Device) -> TrainResult<Tensor> {
    let batch_size = audio_lengths.len();
    let mut data = vec![0f32; batch_size * max_len];
    for (i, &len) in audio_lengths.iter().enumerate() {
        if len == 0 || len > max_len {
            return Err(TrainError::InvalidBatch(format!(
                "audio length {} of sample {} outside 1..={}",
                len, i, max_len
            )));
        }
        data[i * max_len + len - 1] = 1.0;
    }
    Ok(Tensor::from_vec(data, (batch_size, max_len), device)?)
}

/// Mean squared error between predicted and target spectrograms
pub fn spectrogram_loss(predicted: &Tensor, target: &Tensor) -> TrainResult<Tensor> {
    if predicted.dims() != target.dims() {
        return Err(TrainError::InvalidBatch(format!(
            "predicted spectrogram {:?} does not match target {:?}",
            predicted.dims(),
            target.dims()
        )));
    }
    Ok(candle_nn::loss::mse(predicted, target)?)
}

/// Binary cross-entropy on raw logits
///
/// Uses `max(x, 0) - x * z + ln(1 + exp(-|x|))` so large logits do not
/// overflow.
pub fn stop_token_loss(logits: &Tensor, targets: &Tensor) -> TrainResult<Tensor> {
    if logits.dims() != targets.dims() {
        return Err(TrainError::InvalidBatch(format!(
            "stop logits {:?} do not match stop targets {:?}",
            logits.dims(),
            targets.dims()
        )));
    }
    let targets = targets.to_dtype(logits.dtype())?;
    let positive = logits.relu()?;
    let cross = (logits * &targets)?;
    let softplus = (logits.abs()?.neg()?.exp()? + 1.0)?.log()?;
    let loss = ((positive - cross)? + softplus)?.mean_all()?;
    Ok(loss)
}

/// Per-batch loss terms
#[derive(Debug, Clone)]
pub struct LossBreakdown {
    pub spectrogram: Tensor,
    pub stop: Tensor,
    /// `spectrogram + stop`; the tensor backpropagated through
    pub total: Tensor,
}

impl LossBreakdown {
    /// Scalar value of the total loss
    pub fn total_value(&self) -> TrainResult<f32> {
        Ok(self.total.to_dtype(DType::F32)?.to_scalar::<f32>()?)
    }
}

/// Combine both loss terms for one forward pass
pub fn composite_loss(
    output: &ModelOutput,
    targets: &Tensor,
    stop_targets: &Tensor,
) -> TrainResult<LossBreakdown> {
    let spectrogram = spectrogram_loss(&output.spectrogram, targets)?;
    let stop = stop_token_loss(&output.stop_logits, stop_targets)?;
    let total = (&spectrogram + &stop)?;
    Ok(LossBreakdown {
        spectrogram,
        stop,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(t: &Tensor) -> f32 {
        t.to_scalar::<f32>().unwrap()
    }

    #[test]
    fn test_stop_targets_mark_last_frame() {
        let targets = stop_targets(&[3, 5], 5, &Device::Cpu).unwrap();
        assert_eq!(
            targets.to_vec2::<f32>().unwrap(),
            vec![vec![0.0, 0.0, 1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn test_stop_targets_single_one_per_row() {
        let lengths = [1, 4, 7, 2];
        let rows = stop_targets(&lengths, 7, &Device::Cpu)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        for (row, &len) in rows.iter().zip(lengths.iter()) {
            assert_eq!(row.iter().sum::<f32>(), 1.0);
            assert_eq!(row[len - 1], 1.0);
        }
    }

    #[test]
    fn test_stop_targets_reject_bad_lengths() {
        assert!(stop_targets(&[0], 4, &Device::Cpu).is_err());
        assert!(stop_targets(&[5], 4, &Device::Cpu).is_err());
    }

    #[test]
    fn test_spectrogram_loss_is_mse() {
        let device = Device::Cpu;
        let pred = Tensor::new(&[[1.0f32, 2.0], [3.0, 4.0]], &device).unwrap();
        let target = Tensor::new(&[[1.0f32, 0.0], [3.0, 0.0]], &device).unwrap();
        let loss = spectrogram_loss(&pred, &target).unwrap();
        assert!((scalar(&loss) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_stop_loss_matches_reference() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[0.0f32, 2.0, -3.0]], &device).unwrap();
        let targets = Tensor::new(&[[1.0f32, 0.0, 1.0]], &device).unwrap();

        let sigmoid = |x: f32| 1.0 / (1.0 + (-x).exp());
        let expected = [(0.0f32, 1.0f32), (2.0, 0.0), (-3.0, 1.0)]
            .iter()
            .map(|&(x, z)| -(z * sigmoid(x).ln() + (1.0 - z) * (1.0 - sigmoid(x)).ln()))
            .sum::<f32>()
            / 3.0;

        let loss = stop_token_loss(&logits, &targets).unwrap();
        assert!((scalar(&loss) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_stop_loss_stable_for_large_logits() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[200.0f32, -200.0]], &device).unwrap();
        let targets = Tensor::new(&[[1.0f32, 0.0]], &device).unwrap();
        let loss = scalar(&stop_token_loss(&logits, &targets).unwrap());
        assert!(loss.is_finite());
        assert!(loss < 1e-6);
    }

    #[test]
    fn test_composite_is_unweighted_sum() {
        let device = Device::Cpu;
        let targets = Tensor::randn(0f32, 1.0, (5, 2, 3), &device).unwrap();
        let output = ModelOutput {
            spectrogram: Tensor::randn(0f32, 1.0, (5, 2, 3), &device).unwrap(),
            stop_logits: Tensor::randn(0f32, 1.0, (2, 5), &device).unwrap(),
            attention: Tensor::zeros((2, 5, 4), DType::F32, &device).unwrap(),
        };
        let stops = stop_targets(&[3, 5], 5, &device).unwrap();

        let breakdown = composite_loss(&output, &targets, &stops).unwrap();
        let spec = scalar(&spectrogram_loss(&output.spectrogram, &targets).unwrap());
        let stop = scalar(&stop_token_loss(&output.stop_logits, &stops).unwrap());

        assert!((breakdown.total_value().unwrap() - (spec + stop)).abs() < 1e-5);
        assert!((scalar(&breakdown.spectrogram) - spec).abs() < 1e-6);
        assert!((scalar(&breakdown.stop) - stop).abs() < 1e-6);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let device = Device::Cpu;
        let a = Tensor::zeros((2, 3), DType::F32, &device).unwrap();
        let b = Tensor::zeros((3, 2), DType::F32, &device).unwrap();
        assert!(spectrogram_loss(&a, &b).is_err());
        assert!(stop_token_loss(&a, &b).is_err());
    }
}
