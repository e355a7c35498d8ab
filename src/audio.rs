/*
 *  audio.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Audio capture sources: anything that can hand over one frame of
 *  frequency magnitudes per tick
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

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analyser::FftAnalyser;
use crate::constants::{DEFAULT_FFT_SIZE, DEFAULT_SAMPLE_RATE};

/// Source of one frequency-magnitude frame per tick.
pub trait AudioSource {
    /// Number of magnitude bins produced per frame.
    fn bin_count(&self) -> usize;

    /// Write the latest magnitudes (0..=255) into `out`, which the caller
    /// sizes to `bin_count()`.
    fn frequency_magnitudes(&mut self, out: &mut [u8]);
}

/// Shared handle for pushing bytes into a `StaticSource` after it has been
/// handed to the renderer.
#[derive(Debug, Clone)]
pub struct SourceHandle(Rc<RefCell<Vec<u8>>>);

impl SourceHandle {
    /// Replace the magnitudes; the bin count follows the new length.
    pub fn set(&self, bytes: &[u8]) {
        let mut v = self.0.borrow_mut();
        v.clear();
        v.extend_from_slice(bytes);
    }

    pub fn fill(&self, value: u8) {
        self.0.borrow_mut().fill(value);
    }
}

/// Returns whatever bytes were last set, unchanged, every tick.
#[derive(Debug, Clone)]
pub struct StaticSource {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl StaticSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes: Rc::new(RefCell::new(bytes)) }
    }

    pub fn handle(&self) -> SourceHandle {
        SourceHandle(Rc::clone(&self.bytes))
    }
}

impl AudioSource for StaticSource {
    fn bin_count(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn frequency_magnitudes(&mut self, out: &mut [u8]) {
        let src = self.bytes.borrow();
        let n = out.len().min(src.len());
        out[..n].copy_from_slice(&src[..n]);
        out[n..].fill(0);
    }
}

/// Partial used by the synthetic source.
#[derive(Debug, Clone, Copy)]
struct Tone {
    freq_hz: f32,
    amp: f32,
    /// slow amplitude wobble, Hz
    lfo_hz: f32,
}

/// Seeded tone + noise generator run through the FFT analyser. Deterministic
/// for a given seed, so demo runs and tests are repeatable.
#[derive(Debug)]
pub struct SyntheticSource {
    rng: StdRng,
    analyser: FftAnalyser,
    tones: Vec<Tone>,
    noise: f32,
    sample_rate: u32,
    pcm: Vec<f32>,
    /// running sample position, keeps phase continuous across frames
    pos: u64,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self::with_fft_size(seed, DEFAULT_FFT_SIZE)
    }

    pub fn with_fft_size(seed: u64, fft_size: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tones = (0..5)
            .map(|i| Tone {
                freq_hz: 60.0 * 2f32.powi(i) * rng.random_range(0.9..1.1),
                amp: rng.random_range(0.05..0.4),
                lfo_hz: rng.random_range(0.1..2.0),
            })
            .collect();
        let analyser = FftAnalyser::new(fft_size);
        let pcm = vec![0.0; analyser.fft_size()];
        log::debug!("synthetic source seed {} fft {}", seed, analyser.fft_size());
        Self {
            rng,
            analyser,
            tones,
            noise: 0.02,
            sample_rate: DEFAULT_SAMPLE_RATE,
            pcm,
            pos: 0,
        }
    }

    pub fn set_noise(&mut self, level: f32) {
        self.noise = level.max(0.0);
    }

    fn generate(&mut self) {
        let sr = self.sample_rate as f32;
        let tau = std::f32::consts::TAU;
        for s in self.pcm.iter_mut() {
            let t = self.pos as f32 / sr;
            let mut v = 0.0;
            for tone in &self.tones {
                let env = 0.5 + 0.5 * (tau * tone.lfo_hz * t).sin();
                v += tone.amp * env * (tau * tone.freq_hz * t).sin();
            }
            v += self.noise * self.rng.random_range(-1.0f32..1.0);
            *s = v.clamp(-1.0, 1.0);
            self.pos += 1;
        }
    }
}

impl AudioSource for SyntheticSource {
    fn bin_count(&self) -> usize {
        self.analyser.bin_count()
    }

    fn frequency_magnitudes(&mut self, out: &mut [u8]) {
        self.generate();
        self.analyser.analyse(&self.pcm);
        self.analyser.byte_magnitudes(out);
    }
}
