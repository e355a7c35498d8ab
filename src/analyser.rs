/*
 *  analyser.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Windowed FFT analyser: PCM in, per-bin byte magnitudes out
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

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::constants::{
    ANALYSER_MAX_DB, ANALYSER_MIN_DB, ANALYSER_SMOOTHING, FFT_MAX, FFT_MIN,
};

const EPS: f32 = 1e-12;

/// Magnitude in dBFS to a display byte over the analyser's dB window.
#[inline]
pub fn db_to_byte(db: f32, min_db: f32, max_db: f32) -> u8 {
    let x = ((db - min_db) / (max_db - min_db)).clamp(0.0, 1.0);
    (x * 255.0).floor() as u8
}

pub struct FftAnalyser {
    nfft: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    a_scale: f32,       // 2 / win_sum, full-scale sine -> 1.0
    buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>, // linear magnitude per bin
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl std::fmt::Debug for FftAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftAnalyser")
            .field("nfft", &self.nfft)
            .field("smoothing", &self.smoothing)
            .finish()
    }
}

impl FftAnalyser {
    /// `fft_size` is rounded up to a power of two within the supported range.
    pub fn new(fft_size: usize) -> Self {
        let nfft = fft_size.clamp(FFT_MIN, FFT_MAX).next_power_of_two();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(nfft);

        // Hann
        let window = (0..nfft)
            .map(|i| 0.5f32 * (1.0 - (2.0 * std::f32::consts::PI * (i as f32) / (nfft as f32)).cos()))
            .collect::<Vec<_>>();
        let win_sum: f32 = window.iter().copied().sum();

        let buf = vec![Complex::new(0.0, 0.0); nfft];
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            nfft,
            fft,
            window,
            a_scale: 2.0 / win_sum,
            buf,
            scratch,
            smoothed: vec![0.0; nfft / 2],
            smoothing: ANALYSER_SMOOTHING,
            min_db: ANALYSER_MIN_DB,
            max_db: ANALYSER_MAX_DB,
        }
    }

    pub fn fft_size(&self) -> usize { self.nfft }
    pub fn bin_count(&self) -> usize { self.nfft / 2 }

    pub fn set_smoothing(&mut self, smoothing: f32) {
        self.smoothing = smoothing.clamp(0.0, 0.99);
    }

    pub fn set_db_range(&mut self, min_db: f32, max_db: f32) {
        if max_db > min_db {
            self.min_db = min_db;
            self.max_db = max_db;
        }
    }

    /// Analyse the most recent `fft_size` samples of `pcm` (zero padded if
    /// shorter) and fold them into the smoothed spectrum.
    pub fn analyse(&mut self, pcm: &[f32]) {
        let need = self.nfft.min(pcm.len());
        let start = pcm.len() - need;

        for i in 0..need {
            self.buf[i] = Complex::new(pcm[start + i] * self.window[i], 0.0);
        }
        for c in &mut self.buf[need..] {
            *c = Complex::new(0.0, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buf, &mut self.scratch);

        let k = self.smoothing;
        for (bin, s) in self.smoothed.iter_mut().enumerate() {
            let mag = self.buf[bin].norm() * self.a_scale;
            *s = *s * k + mag * (1.0 - k);
        }
    }

    /// Byte magnitudes per bin; fills `min(out.len(), bin_count)` entries.
    pub fn byte_magnitudes(&self, out: &mut [u8]) {
        for (o, m) in out.iter_mut().zip(&self.smoothed) {
            let db = 20.0 * m.max(EPS).log10();
            *o = db_to_byte(db, self.min_db, self.max_db);
        }
    }

    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}
