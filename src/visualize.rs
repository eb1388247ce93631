//! # Heatmap Rendering
//!
//! Turns attention maps and spectrograms into RGB images for the summary log.

use candle_core::{DType, Device, Tensor};

use crate::TrainResult;

/// An RGB image, row-major with interleaved channels
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: usize,
    pub height: usize,
    /// `height * width * 3` bytes
    pub pixels: Vec<u8>,
    /// Text shown alongside the image, if any
    pub caption: Option<String>,
}

impl RenderedImage {
    /// RGB value at column `x`, row `y` (row 0 is the top)
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]]
    }
}

// Anchor points of the viridis colour map, dark to bright
const VIRIDIS: [[f32; 3]; 5] = [
    [68.0, 1.0, 84.0],
    [59.0, 82.0, 139.0],
    [33.0, 145.0, 140.0],
    [94.0, 201.0, 98.0],
    [253.0, 231.0, 37.0],
];

fn colormap(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let lo = (v.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = v - lo as f32;
    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let value = VIRIDIS[lo][c] + (VIRIDIS[lo + 1][c] - VIRIDIS[lo][c]) * frac;
        *out = value.round() as u8;
    }
    rgb
}

/// Render `rows` (top row first) through the colour map after min-max scaling
fn heatmap(rows: &[Vec<f32>], caption: Option<String>) -> RenderedImage {
    let height = rows.len();
    let width = rows.first().map_or(0, |r| r.len());

    let (min, max) = rows
        .iter()
        .flatten()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;

    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in rows {
        for &v in row {
            let scaled = if range > f32::EPSILON { (v - min) / range } else { 0.0 };
            pixels.extend_from_slice(&colormap(scaled));
        }
    }

    RenderedImage {
        width,
        height,
        pixels,
        caption,
    }
}

fn to_rows(tensor: &Tensor) -> TrainResult<Vec<Vec<f32>>> {
    Ok(tensor
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .to_vec2::<f32>()?)
}

/// Render one sample's alignment, `[frames, text_len]`
///
/// Decoder steps run left to right, text positions bottom to top.
pub fn show_attention(attention: &Tensor) -> TrainResult<RenderedImage> {
    let weights = to_rows(attention)?;
    let frames = weights.len();
    let text_len = weights.first().map_or(0, |r| r.len());

    let rows: Vec<Vec<f32>> = (0..text_len)
        .rev()
        .map(|pos| (0..frames).map(|t| weights[t][pos]).collect())
        .collect();
    Ok(heatmap(&rows, None))
}

/// Render one spectrogram, `[n_mels, frames]`, low bins at the bottom
pub fn show_spectrogram(spectrogram: &Tensor, caption: &str) -> TrainResult<RenderedImage> {
    let mut rows = to_rows(spectrogram)?;
    rows.reverse();
    Ok(heatmap(&rows, Some(caption.to_string())))
}
