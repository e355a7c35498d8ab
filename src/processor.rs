/*
 *  processor.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Band mapping, smoothing and peak tracking over raw magnitudes
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};
use crate::constants::{DEFAULT_PEAK_DECAY, DEFAULT_SENSITIVITY, DEFAULT_SMOOTHING, MAGNITUDE_MAX};

/// How band indices are spread over the raw bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyMapping {
    /// Equal share of bins per band.
    Linear,
    /// Power-law (i/N)^2 spacing, more bands in the low end.
    #[default]
    Logarithmic,
}

/// Per-tick parameters, resolved by the renderer from config + active preset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessParams {
    pub mapping: FrequencyMapping,
    pub sensitivity: f32,
    /// EMA weight of the previous value, in [0, 1).
    pub smoothing: f32,
    pub peak_decay: f32,
}

impl Default for ProcessParams {
    fn default() -> Self {
        Self {
            mapping: FrequencyMapping::Logarithmic,
            sensitivity: DEFAULT_SENSITIVITY,
            smoothing: DEFAULT_SMOOTHING,
            peak_decay: DEFAULT_PEAK_DECAY,
        }
    }
}

/// Fixed-length run of band values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct BandBuffer {
    values: Vec<f32>,
}

impl BandBuffer {
    pub fn new(len: usize) -> Self {
        Self { values: vec![0.0; len] }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn as_slice(&self) -> &[f32] { &self.values }
    pub fn as_ptr(&self) -> *const f32 { self.values.as_ptr() }

    #[inline]
    pub fn get(&self, i: usize) -> f32 {
        self.values.get(i).copied().unwrap_or(0.0)
    }

    fn fill(&mut self, v: f32) { self.values.fill(v); }

    /// Heap bytes held by the buffer.
    pub fn bytes(&self) -> usize {
        self.values.capacity() * std::mem::size_of::<f32>()
    }
}

/// Raw index range `[start, end)` feeding band `i` of `n` over `len` bins.
///
/// An empty range is widened to one bin so neighbouring bands may share an
/// index when there are more bands than bins.
pub fn band_range(i: usize, n: usize, len: usize, mapping: FrequencyMapping) -> (usize, usize) {
    if n == 0 || len == 0 {
        return (0, 0);
    }
    let edge = |k: usize| -> usize {
        let t = k as f64 / n as f64;
        let scaled = match mapping {
            FrequencyMapping::Linear => t,
            FrequencyMapping::Logarithmic => t * t,
        };
        ((scaled * len as f64).floor() as usize).min(len)
    };
    let start = edge(i).min(len - 1);
    let mut end = edge(i + 1);
    if end <= start {
        end = (start + 1).min(len);
    }
    (start, end)
}

/// Turns raw magnitudes into smoothed band amplitudes plus decaying peaks.
///
/// Both buffers are owned and reused every call; they only reallocate when
/// `resize` is handed a different band count.
#[derive(Debug, Clone)]
pub struct SpectrumProcessor {
    smoothed: BandBuffer,
    peaks: BandBuffer,
}

impl SpectrumProcessor {
    pub fn new(bands: usize) -> Self {
        Self {
            smoothed: BandBuffer::new(bands),
            peaks: BandBuffer::new(bands),
        }
    }

    pub fn band_count(&self) -> usize { self.smoothed.len() }
    pub fn smoothed(&self) -> &BandBuffer { &self.smoothed }
    pub fn peaks(&self) -> &BandBuffer { &self.peaks }

    /// Reallocate for a new band count. Returns true if anything changed.
    pub fn resize(&mut self, bands: usize) -> bool {
        if bands == self.band_count() {
            return false;
        }
        log::debug!("band buffers {} -> {}", self.band_count(), bands);
        self.smoothed = BandBuffer::new(bands);
        self.peaks = BandBuffer::new(bands);
        true
    }

    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
        self.peaks.fill(0.0);
    }

    /// Drop the buffers entirely (renderer disposal).
    pub fn release(&mut self) {
        self.smoothed = BandBuffer::new(0);
        self.peaks = BandBuffer::new(0);
    }

    pub fn bytes(&self) -> usize {
        self.smoothed.bytes() + self.peaks.bytes()
    }

    /// Fold one raw sample into the band buffers.
    pub fn process(&mut self, raw: &[u8], params: &ProcessParams) {
        let n = self.band_count();
        let alpha = params.smoothing.clamp(0.0, 0.999);
        let decay = params.peak_decay.clamp(0.0, 1.0);

        for i in 0..n {
            let target = if raw.is_empty() {
                0.0
            } else {
                let (a, b) = band_range(i, n, raw.len(), params.mapping);
                let sum: u32 = raw[a..b].iter().map(|&v| v as u32).sum();
                let avg = sum as f32 / (b - a) as f32;
                (avg / MAGNITUDE_MAX * params.sensitivity).clamp(0.0, 1.0)
            };

            let prev = self.smoothed.values[i];
            let value = (prev * alpha + target * (1.0 - alpha)).clamp(0.0, 1.0);
            self.smoothed.values[i] = value;

            let peak = self.peaks.values[i];
            self.peaks.values[i] = if value > peak {
                value
            } else {
                // a decay that undershoots the live value is pulled back up
                (peak * decay).max(value)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(smoothing: f32) -> ProcessParams {
        ProcessParams { smoothing, ..ProcessParams::default() }
    }

    #[test]
    fn test_log_band_ranges_64_bins_8_bands() {
        assert_eq!(band_range(0, 8, 64, FrequencyMapping::Logarithmic), (0, 1));
        assert_eq!(band_range(7, 8, 64, FrequencyMapping::Logarithmic), (49, 64));
        // contiguous cover of the whole input
        let mut next = 0;
        for i in 0..8 {
            let (a, b) = band_range(i, 8, 64, FrequencyMapping::Logarithmic);
            assert_eq!(a, next);
            assert!(b > a);
            next = b;
        }
        assert_eq!(next, 64);
    }

    #[test]
    fn test_linear_band_ranges() {
        assert_eq!(band_range(0, 4, 64, FrequencyMapping::Linear), (0, 16));
        assert_eq!(band_range(3, 4, 64, FrequencyMapping::Linear), (48, 64));
    }

    #[test]
    fn test_more_bands_than_bins_share_indices() {
        let (a0, b0) = band_range(0, 16, 4, FrequencyMapping::Linear);
        let (a1, b1) = band_range(1, 16, 4, FrequencyMapping::Linear);
        assert_eq!((a0, b0), (0, 1));
        assert_eq!((a1, b1), (0, 1));
        let (a, b) = band_range(15, 16, 4, FrequencyMapping::Linear);
        assert!(a < 4 && b <= 4 && b > a);
    }

    #[test]
    fn test_full_scale_input_yields_unity() {
        let mut p = SpectrumProcessor::new(8);
        p.process(&[255u8; 64], &flat(0.0));
        for &v in p.smoothed().as_slice() {
            assert!((v - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_empty_sample_zeroes_bands() {
        let mut p = SpectrumProcessor::new(8);
        p.process(&[200u8; 32], &flat(0.0));
        p.process(&[], &flat(0.0));
        assert!(p.smoothed().as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_buffers_reused_without_reallocation() {
        let mut p = SpectrumProcessor::new(16);
        let s = p.smoothed().as_ptr();
        let k = p.peaks().as_ptr();
        for i in 0..50u8 {
            p.process(&[i.wrapping_mul(5); 128], &ProcessParams::default());
        }
        assert_eq!(s, p.smoothed().as_ptr());
        assert_eq!(k, p.peaks().as_ptr());

        assert!(!p.resize(16));
        assert_eq!(s, p.smoothed().as_ptr());
        assert!(p.resize(32));
        assert_eq!(p.smoothed().len(), 32);
        assert_eq!(p.peaks().len(), 32);
    }

    #[test]
    fn test_deterministic_over_repeated_runs() {
        let frames: Vec<Vec<u8>> = (0..20u32)
            .map(|t| (0..64u32).map(|i| ((i * 7 + t * 13) % 256) as u8).collect())
            .collect();
        let run = || {
            let mut p = SpectrumProcessor::new(12);
            for f in &frames {
                p.process(f, &ProcessParams::default());
            }
            (p.smoothed().clone(), p.peaks().clone())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_peak_never_below_smoothed() {
        let mut p = SpectrumProcessor::new(10);
        let params = ProcessParams { smoothing: 0.3, peak_decay: 0.5, ..ProcessParams::default() };
        for t in 0..200u32 {
            let frame: Vec<u8> = (0..40u32).map(|i| (((i + 3) * (t + 1) * 37) % 256) as u8).collect();
            p.process(&frame, &params);
            for i in 0..p.band_count() {
                assert!(p.peaks().get(i) >= p.smoothed().get(i));
            }
        }
    }

    #[test]
    fn test_silence_decays_peaks_geometrically() {
        let mut p = SpectrumProcessor::new(4);
        let params = ProcessParams { smoothing: 0.0, peak_decay: 0.95, ..ProcessParams::default() };
        p.process(&[255u8; 16], &params);
        let start: Vec<f32> = p.peaks().as_slice().to_vec();

        let mut last = start.clone();
        for tick in 1..=10 {
            p.process(&[0u8; 16], &params);
            for i in 0..4 {
                let v = p.peaks().get(i);
                assert!(v <= last[i]);
                let expected = start[i] * 0.95f32.powi(tick);
                assert!((v - expected).abs() < 1e-5, "band {i} tick {tick}: {v} vs {expected}");
                last[i] = v;
            }
        }
    }

    #[test]
    fn test_sensitivity_scales_and_clamps() {
        let mut p = SpectrumProcessor::new(1);
        let params = ProcessParams { sensitivity: 0.5, smoothing: 0.0, ..ProcessParams::default() };
        p.process(&[255u8; 8], &params);
        assert!((p.smoothed().get(0) - 0.5).abs() < 1e-6);

        let params = ProcessParams { sensitivity: 4.0, smoothing: 0.0, ..ProcessParams::default() };
        p.process(&[128u8; 8], &params);
        assert_eq!(p.smoothed().get(0), 1.0);
    }

    #[test]
    fn test_smoothing_blends_previous_value() {
        let mut p = SpectrumProcessor::new(1);
        let params = flat(0.5);
        p.process(&[255u8; 4], &params);
        assert!((p.smoothed().get(0) - 0.5).abs() < 1e-6);
        p.process(&[255u8; 4], &params);
        assert!((p.smoothed().get(0) - 0.75).abs() < 1e-6);
    }
}
