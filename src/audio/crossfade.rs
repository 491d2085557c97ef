//! Raised-cosine cross-fade window used to mask track switches and loop wraps.

use std::f64::consts::PI;

/// Precomputed fade-out coefficients, one per interleaved sample slot.
///
/// `coefficients[i * channels + c]` holds `0.5 + 0.5 * cos(pi * i / frames)` for
/// every channel `c`, so the curve starts at 1.0 and approaches (but never
/// reaches) 0.0 at the last frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeWindow {
    coefficients: Vec<f32>,
    frames: usize,
    channels: usize,
}

impl CrossfadeWindow {
    pub fn generate(frames: usize, channels: usize) -> Self {
        let channels = channels.max(1);
        let mut coefficients = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let weight = (0.5 + 0.5 * (PI * i as f64 / frames as f64).cos()) as f32;
            coefficients.extend(std::iter::repeat(weight).take(channels));
        }
        Self {
            coefficients,
            frames,
            channels,
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    #[cfg(test)]
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Blends `input` into `output` over the window: `out = w * out + (1 - w) * in`.
    ///
    /// Only the overlapping prefix of the three slices is touched. Slots of
    /// `output` past the window are left as they are.
    pub fn blend(&self, output: &mut [f32], input: &[f32]) {
        for ((out, sample), weight) in output
            .iter_mut()
            .zip(input.iter())
            .zip(self.coefficients.iter())
        {
            *out = weight * *out + (1.0 - weight) * sample;
        }
    }

    /// Fades `output` over to `input` and continues with `input` after the window.
    ///
    /// Slots with no counterpart in `input` (source ran out) fade to silence.
    /// The window is truncated when `output` is shorter than it.
    pub fn crossfade_into(&self, output: &mut [f32], input: &[f32]) {
        let window = self.coefficients.len().min(output.len());
        let covered = input.len().min(output.len());
        self.blend(&mut output[..covered], &input[..covered]);
        if covered > window {
            output[window..covered].copy_from_slice(&input[window..covered]);
        }
        for (slot, out) in output.iter_mut().enumerate().skip(covered) {
            *out = self.coefficients.get(slot).map_or(0.0, |weight| weight * *out);
        }
    }
}
