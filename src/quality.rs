/*
 *  quality.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Quality presets and the adaptive controller that moves between them
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
use crate::constants::{
    DEFAULT_DROP_THRESHOLD,
    DEFAULT_FPS_SMOOTHING,
    DEFAULT_MIN_FPS_RATIO,
    DEFAULT_PROMOTE_RATIO,
    DEFAULT_PROMOTION_DELAY_MS,
    DEFAULT_WARMUP_FRAMES,
    HEADROOM_FPS_CAP,
};
use crate::display::traits::DrawingSurface;

/// A named bundle of rendering parameters switched as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub name: String,
    pub band_count: usize,
    pub target_fps: u32,
    /// Demotion floor; derived from `target_fps` when absent.
    #[serde(default)]
    pub min_fps: Option<f32>,
    #[serde(default = "default_true")]
    pub smoothing_enabled: bool,
    #[serde(default = "default_true")]
    pub effects_enabled: bool,
}

fn default_true() -> bool { true }

impl QualityPreset {
    pub fn new(name: &str, band_count: usize, target_fps: u32, smoothing: bool, effects: bool) -> Self {
        Self {
            name: name.to_string(),
            band_count,
            target_fps,
            min_fps: None,
            smoothing_enabled: smoothing,
            effects_enabled: effects,
        }
    }

    pub fn min_fps(&self) -> f32 {
        self.min_fps
            .unwrap_or(self.target_fps as f32 * DEFAULT_MIN_FPS_RATIO)
    }
}

/// Built-in ladder, best first.
pub fn default_presets() -> Vec<QualityPreset> {
    vec![
        QualityPreset::new("ultra", 128, 60, true, true),
        QualityPreset::new("high", 64, 60, true, true),
        QualityPreset::new("medium", 32, 45, true, false),
        QualityPreset::new("low", 16, 30, false, false),
    ]
}

/// Device facts gathered once when the renderer is initialised.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Capabilities {
    pub surface_width: u32,
    pub surface_height: u32,
    pub max_fps: u32,
    pub supports_gradients: bool,
    pub cpu_cores: usize,
}

impl Capabilities {
    pub fn probe<S: DrawingSurface + ?Sized>(surface: &S) -> Self {
        let caps = surface.capabilities();
        let (w, h) = surface.dimensions();
        let cpu_cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let probed = Self {
            surface_width: w,
            surface_height: h,
            max_fps: caps.max_fps,
            supports_gradients: caps.supports_gradients,
            cpu_cores,
        };
        log::info!(
            "capabilities: {}x{} max {} fps, gradients {}, {} cores",
            w, h, probed.max_fps, probed.supports_gradients, cpu_cores
        );
        probed
    }

    /// Large surfaces cost more per frame regardless of band count.
    pub fn is_heavy(&self) -> bool {
        (self.surface_width as u64 * self.surface_height as u64) > 1920 * 1080
    }
}

/// Why the active preset moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeReason {
    /// Rolling fps under the preset's floor.
    LowFrameRate,
    /// Too many late frames in a row.
    DroppedFrames,
    /// Sustained headroom over the stabilisation window.
    Recovered,
    /// Caller picked a level.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualityChange {
    pub from: usize,
    pub to: usize,
    pub reason: ChangeReason,
}

/// Tunables for the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub adaptive: bool,
    pub promote_ratio: f32,
    pub promotion_delay_ms: f64,
    pub fps_smoothing: f32,
    pub warmup_frames: u32,
    pub drop_threshold: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            adaptive: true,
            promote_ratio: DEFAULT_PROMOTE_RATIO,
            promotion_delay_ms: DEFAULT_PROMOTION_DELAY_MS,
            fps_smoothing: DEFAULT_FPS_SMOOTHING,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
        }
    }
}

/// Hysteretic preset selector.
///
/// Two signals feed it. The delivered frame rate (accepted frame timestamps)
/// drops a level as soon as it falls under the preset floor. Headroom, the
/// rate the measured per-frame work would allow, climbs a level back only
/// after it has stayed above target for the whole stabilisation window. The
/// delivered rate cannot serve for promotion: the scheduler caps it at the
/// preset's own target.
#[derive(Debug, Clone)]
pub struct QualityController {
    presets: Vec<QualityPreset>,
    current: usize,
    settings: ControllerSettings,
    avg_fps: f32,
    avg_work_ms: Option<f64>,
    last_frame: Option<f64>,
    frames_seen: u32,
    good_since: Option<f64>,
}

impl QualityController {
    /// `presets` must be non-empty; config validation guarantees it.
    pub fn new(presets: Vec<QualityPreset>, settings: ControllerSettings) -> Self {
        Self {
            presets,
            current: 0,
            settings,
            avg_fps: 0.0,
            avg_work_ms: None,
            last_frame: None,
            frames_seen: 0,
            good_since: None,
        }
    }

    pub fn presets(&self) -> &[QualityPreset] { &self.presets }
    pub fn current_index(&self) -> usize { self.current }
    pub fn average_fps(&self) -> f32 { self.avg_fps }

    /// Frame rate the smoothed per-frame work would sustain, capped.
    pub fn headroom_fps(&self) -> f32 {
        match self.avg_work_ms {
            Some(w) if w > 0.0 => ((1000.0 / w) as f32).min(HEADROOM_FPS_CAP),
            _ => HEADROOM_FPS_CAP,
        }
    }
    pub fn settings(&self) -> &ControllerSettings { &self.settings }

    pub fn active(&self) -> &QualityPreset {
        &self.presets[self.current]
    }

    fn lowest(&self) -> usize {
        self.presets.len().saturating_sub(1)
    }

    pub fn set_settings(&mut self, settings: ControllerSettings) {
        self.settings = settings;
        self.good_since = None;
    }

    /// Swap the ladder, keeping the current index where it still exists.
    pub fn set_presets(&mut self, presets: Vec<QualityPreset>) {
        self.presets = presets;
        self.current = self.current.min(self.lowest());
        self.good_since = None;
    }

    /// Pick the starting level from probed capabilities.
    pub fn initial_level(&self, caps: &Capabilities) -> usize {
        let mut level = self.presets
            .iter()
            .position(|p| p.target_fps <= caps.max_fps)
            .unwrap_or(self.lowest());
        if caps.cpu_cores <= 2 || caps.is_heavy() {
            level = (level + 1).min(self.lowest());
        }
        level
    }

    /// Manual selection. Returns None when the index is out of range.
    pub fn set_level(&mut self, index: usize) -> Option<QualityChange> {
        if index >= self.presets.len() {
            return None;
        }
        let change = QualityChange { from: self.current, to: index, reason: ChangeReason::Manual };
        self.current = index;
        self.good_since = None;
        Some(change)
    }

    /// Fold in an accepted frame's timestamp and the time spent producing it,
    /// then judge the result.
    pub fn record_frame(&mut self, now_ms: f64, work_ms: f64, consecutive_dropped: u32) -> Option<QualityChange> {
        let a = self.settings.fps_smoothing.clamp(0.0, 1.0);
        let work_ms = work_ms.max(0.0);
        self.avg_work_ms = Some(match self.avg_work_ms {
            Some(w) => w * (1.0 - a as f64) + work_ms * a as f64,
            None => work_ms,
        });
        if let Some(last) = self.last_frame {
            let dt = now_ms - last;
            if dt > 0.0 {
                let inst = (1000.0 / dt) as f32;
                self.avg_fps = if self.frames_seen == 0 {
                    inst
                } else {
                    self.avg_fps * (1.0 - a) + inst * a
                };
                self.frames_seen = self.frames_seen.saturating_add(1);
            }
        }
        self.last_frame = Some(now_ms);

        if self.frames_seen < self.settings.warmup_frames.max(1) {
            return None;
        }
        self.evaluate(self.avg_fps, self.headroom_fps(), consecutive_dropped, now_ms)
    }

    /// Core decision: `fps` is the delivered rate, `headroom_fps` the rate
    /// the current workload could sustain.
    pub fn evaluate(
        &mut self,
        fps: f32,
        headroom_fps: f32,
        consecutive_dropped: u32,
        now_ms: f64,
    ) -> Option<QualityChange> {
        if !self.settings.adaptive {
            return None;
        }
        let preset = &self.presets[self.current];

        let reason = if fps < preset.min_fps() {
            Some(ChangeReason::LowFrameRate)
        } else if self.settings.drop_threshold > 0 && consecutive_dropped >= self.settings.drop_threshold {
            Some(ChangeReason::DroppedFrames)
        } else {
            None
        };
        if let Some(reason) = reason {
            self.good_since = None;
            if self.current < self.lowest() {
                let change = QualityChange { from: self.current, to: self.current + 1, reason };
                self.current += 1;
                return Some(change);
            }
            return None;
        }

        if self.current > 0 && headroom_fps > preset.target_fps as f32 * self.settings.promote_ratio {
            let since = *self.good_since.get_or_insert(now_ms);
            if now_ms - since >= self.settings.promotion_delay_ms {
                let change = QualityChange { from: self.current, to: self.current - 1, reason: ChangeReason::Recovered };
                self.current -= 1;
                // the next step needs a fresh window
                self.good_since = None;
                return Some(change);
            }
        } else {
            self.good_since = None;
        }
        None
    }

    /// Forget frame history (dispose / reinitialise).
    pub fn reset_history(&mut self) {
        self.avg_fps = 0.0;
        self.avg_work_ms = None;
        self.last_frame = None;
        self.frames_seen = 0;
        self.good_since = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> QualityController {
        QualityController::new(default_presets(), ControllerSettings::default())
    }

    #[test]
    fn test_sustained_low_fps_demotes_every_tick_until_floor() {
        let mut q = controller();
        let mut t = 0.0;
        let mut seen = vec![q.current_index()];
        for _ in 0..8 {
            t += 100.0;
            let before = q.current_index();
            let change = q.evaluate(10.0, 10.0, 0, t);
            if before < 3 {
                assert_eq!(change.map(|c| c.to), Some(before + 1));
                assert_eq!(change.map(|c| c.reason), Some(ChangeReason::LowFrameRate));
            } else {
                assert!(change.is_none());
            }
            seen.push(q.current_index());
        }
        assert_eq!(&seen[..5], &[0, 1, 2, 3, 3]);
        assert_eq!(q.current_index(), 3);
    }

    #[test]
    fn test_promotion_requires_full_window() {
        let mut q = controller();
        q.set_level(2);
        // medium targets 45 fps: 60 fps of headroom is above 49.5
        let mut t = 0.0;
        while t < 1900.0 {
            assert!(q.evaluate(45.0, 60.0, 0, t).is_none());
            t += 100.0;
        }
        assert_eq!(q.current_index(), 2);
    }

    #[test]
    fn test_promotion_after_window_is_single_step() {
        let mut q = controller();
        q.set_level(2);
        let mut promotions = 0;
        let mut t = 0.0;
        // a little more than one window, less than two
        while t <= 2500.0 {
            if q.evaluate(45.0, 70.0, 0, t).is_some() {
                promotions += 1;
            }
            t += 100.0;
        }
        assert_eq!(promotions, 1);
        assert_eq!(q.current_index(), 1);
    }

    #[test]
    fn test_dip_resets_promotion_window() {
        let mut q = controller();
        q.set_level(1);
        assert!(q.evaluate(60.0, 80.0, 0, 0.0).is_none());
        assert!(q.evaluate(60.0, 80.0, 0, 1500.0).is_none());
        // sitting at target is not headroom
        assert!(q.evaluate(60.0, 60.0, 0, 1600.0).is_none());
        assert!(q.evaluate(60.0, 80.0, 0, 2100.0).is_none());
        assert!(q.evaluate(60.0, 80.0, 0, 3500.0).is_none());
        assert!(q.evaluate(60.0, 80.0, 0, 4100.0).is_some());
    }

    #[test]
    fn test_never_promotes_past_best() {
        let mut q = controller();
        for i in 0..50 {
            assert!(q.evaluate(60.0, 500.0, 0, i as f64 * 1000.0).is_none());
        }
        assert_eq!(q.current_index(), 0);
    }

    #[test]
    fn test_dropped_frames_demote_even_with_good_average() {
        let mut q = controller();
        let change = q.evaluate(59.0, 59.0, DEFAULT_DROP_THRESHOLD, 10.0);
        assert_eq!(change.map(|c| c.reason), Some(ChangeReason::DroppedFrames));
        assert_eq!(q.current_index(), 1);
    }

    #[test]
    fn test_non_adaptive_holds_level() {
        let settings = ControllerSettings { adaptive: false, ..ControllerSettings::default() };
        let mut q = QualityController::new(default_presets(), settings);
        assert!(q.evaluate(1.0, 1.0, 100, 0.0).is_none());
        assert_eq!(q.current_index(), 0);
    }

    #[test]
    fn test_record_frame_averages_timestamps() {
        let settings = ControllerSettings { warmup_frames: 0, ..ControllerSettings::default() };
        let mut q = QualityController::new(default_presets(), settings);
        let mut t = 0.0;
        for _ in 0..30 {
            q.record_frame(t, 0.0, 0);
            t += 1000.0 / 60.0;
        }
        assert!((q.average_fps() - 60.0).abs() < 0.5);
        assert_eq!(q.current_index(), 0);
    }

    #[test]
    fn test_headroom_promotes_while_delivery_is_throttled() {
        // delivered rate pinned near target, 2 ms of work per frame
        let mut q = controller();
        q.set_level(2);
        let mut changes = Vec::new();
        let mut t = 0.0;
        while t <= 3000.0 {
            if let Some(c) = q.record_frame(t, 2.0, 0) {
                changes.push(c);
            }
            t += 20.0;
        }
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].reason, ChangeReason::Recovered);
        assert_eq!(q.current_index(), 1);
        assert!((q.headroom_fps() - 500.0).abs() < 1.0);
    }

    #[test]
    fn test_heavy_work_blocks_promotion() {
        // 20 ms per frame only sustains 50 fps, under 60 * 1.1
        let mut q = controller();
        q.set_level(1);
        let mut t = 0.0;
        while t <= 5000.0 {
            assert!(q.record_frame(t, 20.0, 0).is_none());
            t += 1000.0 / 60.0;
        }
        assert_eq!(q.current_index(), 1);
        assert!((q.headroom_fps() - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_unmeasurable_work_reports_capped_headroom() {
        let mut q = controller();
        assert_eq!(q.headroom_fps(), HEADROOM_FPS_CAP);
        q.record_frame(0.0, 0.0, 0);
        assert_eq!(q.headroom_fps(), HEADROOM_FPS_CAP);
    }

    #[test]
    fn test_warmup_suppresses_early_judgement() {
        let mut q = controller();
        // a 10 fps start would demote immediately without warmup
        for i in 0..5 {
            assert!(q.record_frame(i as f64 * 100.0, 0.0, 0).is_none());
        }
        assert_eq!(q.current_index(), 0);
    }

    #[test]
    fn test_set_level_rejects_out_of_range() {
        let mut q = controller();
        assert!(q.set_level(9).is_none());
        assert_eq!(q.set_level(3).map(|c| c.reason), Some(ChangeReason::Manual));
    }

    #[test]
    fn test_initial_level_from_capabilities() {
        let q = controller();
        let mut caps = Capabilities {
            surface_width: 640,
            surface_height: 240,
            max_fps: 60,
            supports_gradients: true,
            cpu_cores: 8,
        };
        assert_eq!(q.initial_level(&caps), 0);
        caps.max_fps = 45;
        assert_eq!(q.initial_level(&caps), 2);
        caps.cpu_cores = 2;
        assert_eq!(q.initial_level(&caps), 3);
        caps.max_fps = 10;
        assert_eq!(q.initial_level(&caps), 3);
    }

    #[test]
    fn test_min_fps_defaults_below_target() {
        let p = QualityPreset::new("x", 8, 60, true, true);
        assert!((p.min_fps() - 45.0).abs() < 1e-6);
        let p = QualityPreset { min_fps: Some(50.0), ..p };
        assert_eq!(p.min_fps(), 50.0);
    }
}
