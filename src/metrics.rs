/*
 *  metrics.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-frame performance samples and the metrics snapshot
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

use std::collections::VecDeque;
use std::fmt::Write;

use arrayvec::ArrayString;
use serde::Serialize;

use crate::constants::{SUMMARY_LEN, SUMMARY_NAME_CHARS};

/// Measurements for one rendered frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSample {
    pub timestamp_ms: f64,
    /// Time since the previous accepted frame
    pub frame_time_ms: f64,
    pub clear_time_ms: f64,
    pub draw_time_ms: f64,
    pub draw_calls: u32,
    pub style_changes: u32,
    pub estimated_memory_bytes: usize,
}

/// Bounded rolling window of samples, oldest dropped first.
#[derive(Debug, Clone)]
pub struct PerformanceHistory {
    samples: VecDeque<PerformanceSample>,
    capacity: usize,
}

impl PerformanceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, sample: PerformanceSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Shrinks from the old end when the window gets smaller.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }
    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }
    pub fn last(&self) -> Option<&PerformanceSample> { self.samples.back() }
    pub fn iter(&self) -> impl Iterator<Item = &PerformanceSample> { self.samples.iter() }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean frame time over the window, ignoring the seed frame (time 0).
    pub fn average_frame_time_ms(&self) -> f64 {
        let (sum, n) = self.samples
            .iter()
            .filter(|s| s.frame_time_ms > 0.0)
            .fold((0.0, 0usize), |(acc, n), s| (acc + s.frame_time_ms, n + 1));
        if n == 0 { 0.0 } else { sum / n as f64 }
    }

    pub fn average_draw_time_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().map(|s| s.draw_time_ms).sum::<f64>() / self.samples.len() as f64
    }

    pub fn bytes(&self) -> usize {
        self.samples.capacity() * std::mem::size_of::<PerformanceSample>()
    }
}

/// Point-in-time view of the renderer's health.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub average_fps: f32,
    /// Rate the measured per-frame work would allow
    pub headroom_fps: f32,
    pub quality_index: usize,
    pub quality_name: String,
    pub band_count: usize,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub frames_dropped: u64,
    pub consecutive_dropped: u32,
    pub quality_changes: u64,
    pub average_frame_time_ms: f64,
    pub average_draw_time_ms: f64,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub last_sample: Option<PerformanceSample>,
}

impl PerformanceMetrics {
    /// One-line status for the periodic log. Every field is bounded (the
    /// name is cut to `SUMMARY_NAME_CHARS`, rates and times are clamped), so
    /// the line always fits `SUMMARY_LEN`.
    pub fn summary(&self) -> ArrayString<SUMMARY_LEN> {
        let name = match self.quality_name.char_indices().nth(SUMMARY_NAME_CHARS) {
            Some((cut, _)) => &self.quality_name[..cut],
            None => self.quality_name.as_str(),
        };
        let mut s = ArrayString::<SUMMARY_LEN>::new();
        let _ = write!(
            s,
            "{:5.1} fps [{}:{} {}b] rendered {} skipped {} dropped {} draw {:.2}ms",
            self.average_fps.clamp(0.0, 9999.9),
            self.quality_index,
            name,
            self.band_count,
            self.frames_rendered,
            self.frames_skipped,
            self.frames_dropped,
            self.average_draw_time_ms.clamp(0.0, 99999.99),
        );
        s
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64, ft: f64) -> PerformanceSample {
        PerformanceSample { timestamp_ms: t, frame_time_ms: ft, draw_time_ms: 1.0, ..Default::default() }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut h = PerformanceHistory::new(3);
        for i in 0..5 {
            h.push(sample(i as f64, 16.0));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.iter().next().map(|s| s.timestamp_ms), Some(2.0));
        assert_eq!(h.last().map(|s| s.timestamp_ms), Some(4.0));
        h.set_capacity(1);
        assert_eq!(h.len(), 1);
        assert_eq!(h.last().map(|s| s.timestamp_ms), Some(4.0));
    }

    #[test]
    fn test_average_skips_seed_frame() {
        let mut h = PerformanceHistory::new(10);
        h.push(sample(0.0, 0.0));
        h.push(sample(20.0, 20.0));
        h.push(sample(30.0, 10.0));
        assert_eq!(h.average_frame_time_ms(), 15.0);
        assert_eq!(h.average_draw_time_ms(), 1.0);
    }

    #[test]
    fn test_summary_fits() {
        let m = PerformanceMetrics {
            average_fps: 59.94,
            quality_name: "medium".into(),
            band_count: 32,
            ..Default::default()
        };
        let s = m.summary();
        assert!(s.starts_with(" 59.9 fps [0:medium 32b]"));
        assert!(s.ends_with("ms"));
        assert!(m.to_json().unwrap().contains("\"quality_name\""));
    }

    #[test]
    fn test_summary_cuts_long_name_and_keeps_tail() {
        // widest possible line: long multibyte name, every counter at max
        let m = PerformanceMetrics {
            average_fps: f32::MAX,
            quality_index: usize::MAX,
            quality_name: "ünïcödé-preset-name-that-keeps-going-and-going".into(),
            band_count: usize::MAX,
            frames_rendered: u64::MAX,
            frames_skipped: u64::MAX,
            frames_dropped: u64::MAX,
            average_draw_time_ms: f64::MAX,
            ..Default::default()
        };
        let s = m.summary();
        assert!(s.contains(":ünïcödé-preset-name-that "));
        assert!(s.ends_with("draw 99999.99ms"), "{}", s);
        assert!(s.starts_with("9999.9 fps"));
    }
}
