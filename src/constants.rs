//! This module contains global constants used across the renderer and its helpers.

/// Default surface width for the host binary.
pub const DEFAULT_SURFACE_WIDTH: u32 = 640;
/// Default surface height for the host binary.
pub const DEFAULT_SURFACE_HEIGHT: u32 = 240;

/// Default host refresh rate (display ticks per second).
pub const DEFAULT_REFRESH_HZ: u32 = 60;

// signal processing
/// Per-tick multiplicative peak decay.
pub const DEFAULT_PEAK_DECAY: f32 = 0.96;
/// EMA coefficient applied to band amplitudes (0 disables smoothing).
pub const DEFAULT_SMOOTHING: f32 = 0.7;
/// Input gain applied after normalisation.
pub const DEFAULT_SENSITIVITY: f32 = 1.0;
/// Full-scale raw magnitude.
pub const MAGNITUDE_MAX: f32 = 255.0;

// quality control
/// Multiplier over target fps that counts as "headroom" for promotion.
pub const DEFAULT_PROMOTE_RATIO: f32 = 1.1;
/// Sustained headroom required before stepping back up a preset.
pub const DEFAULT_PROMOTION_DELAY_MS: f64 = 2000.0;
/// EMA coefficient for the rolling fps average.
pub const DEFAULT_FPS_SMOOTHING: f32 = 0.2;
/// Accepted frames ignored before the controller starts judging.
pub const DEFAULT_WARMUP_FRAMES: u32 = 10;
/// Consecutive late frames that force a demotion regardless of fps.
pub const DEFAULT_DROP_THRESHOLD: u32 = 5;
/// min_fps derived from target_fps when a preset does not name one.
pub const DEFAULT_MIN_FPS_RATIO: f32 = 0.75;
/// Headroom reported when per-frame work is too small to measure.
pub const HEADROOM_FPS_CAP: f32 = 1000.0;

// scheduling
/// Hard render ceiling independent of the active preset.
pub const DEFAULT_MAX_RENDER_FPS: u32 = 120;
/// A frame later than this multiple of the interval is counted as dropped.
pub const DROPPED_FRAME_FACTOR: f64 = 1.5;
/// Timer jitter tolerated when comparing elapsed time against the interval.
pub const FRAME_SLACK_MS: f64 = 0.5;
/// EMA weight for the observed host tick period.
pub const HOST_PERIOD_SMOOTHING: f64 = 0.1;

// layout
/// Share of the surface width the bar group occupies.
pub const BAR_AREA_WIDTH_RATIO: f32 = 0.9;
pub const DEFAULT_BAR_SPACING: u32 = 2;
pub const DEFAULT_MIN_BAR_HEIGHT: u32 = 2;
pub const DEFAULT_PEAK_THICKNESS: u32 = 2;
/// Share of the surface height given to reflections when effects are on.
pub const REFLECTION_RATIO: f32 = 0.2;
/// Reflection height relative to the bar it mirrors.
pub const REFLECTION_SCALE: f32 = 0.35;

// metrics
/// PerformanceSample history window.
pub const DEFAULT_HISTORY_LEN: usize = 120;

// analysis
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
pub const DEFAULT_FFT_SIZE: usize = 2048;
pub const FFT_MIN: usize = 128;
pub const FFT_MAX: usize = 32768;
/// Magnitudes at or below this map to byte 0.
pub const ANALYSER_MIN_DB: f32 = -100.0;
/// Magnitudes at or above this map to byte 255.
pub const ANALYSER_MAX_DB: f32 = -30.0;
/// Time smoothing between consecutive analyses.
pub const ANALYSER_SMOOTHING: f32 = 0.8;

// renderer
/// Gradient cache capacity; live keys number a handful
pub const RESOURCE_CACHE_CAPACITY: u64 = 32;
/// Undrained events beyond this are dropped oldest first.
pub const MAX_PENDING_EVENTS: usize = 64;

// metrics
/// Preset name characters kept in the summary line.
pub const SUMMARY_NAME_CHARS: usize = 24;
/// Summary line capacity: 46 fixed bytes plus the widest value of each field.
pub const SUMMARY_LEN: usize = 256;
