/*
 *  config.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered configuration: defaults < YAML < command line
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
use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use std::{fs, path::{Path, PathBuf}};
use thiserror::Error;

use crate::constants::*;
use crate::display::color::ColorScheme;
use crate::processor::{FrequencyMapping, ProcessParams};
use crate::quality::{default_presets, ControllerSettings, QualityPreset};

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General options
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    /// host refresh callback rate
    pub refresh_hz: Option<u32>,
    /// stop after this long; runs until ctrl-c when absent
    pub duration_secs: Option<u64>,
    /// PPM of the last frame, written at exit
    pub snapshot_path: Option<PathBuf>,
    /// JSON metrics, written at exit
    pub metrics_path: Option<PathBuf>,

    pub surface: Option<SurfaceConfig>,
    pub renderer: Option<ConfigUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SurfaceConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub max_fps: Option<u32>,
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn surface_size(&self) -> (u32, u32) {
        let s = self.surface.as_ref();
        (
            s.and_then(|s| s.width).unwrap_or(DEFAULT_SURFACE_WIDTH),
            s.and_then(|s| s.height).unwrap_or(DEFAULT_SURFACE_HEIGHT),
        )
    }

    pub fn surface_max_fps(&self) -> u32 {
        self.surface.as_ref().and_then(|s| s.max_fps).unwrap_or(DEFAULT_REFRESH_HZ)
    }

    pub fn refresh_hz(&self) -> u32 {
        self.refresh_hz.unwrap_or(DEFAULT_REFRESH_HZ)
    }

    /// Resolved renderer settings (defaults overlaid with the YAML/CLI section).
    pub fn renderer_config(&self) -> Result<RendererConfig, ConfigError> {
        match self.renderer.as_ref() {
            Some(update) => RendererConfig::default().apply(update),
            None => Ok(RendererConfig::default()),
        }
    }
}

/// Partial renderer settings. Used for the `renderer:` YAML section and for
/// live updates: absent fields leave the current value alone.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ConfigUpdate {
    pub mapping: Option<FrequencyMapping>,
    pub sensitivity: Option<f32>,
    pub smoothing: Option<f32>,
    pub peak_decay: Option<f32>,
    pub show_peaks: Option<bool>,
    pub color_scheme: Option<ColorScheme>,
    pub bar_spacing: Option<u32>,
    pub min_bar_height: Option<u32>,
    pub peak_thickness: Option<u32>,
    /// overrides the preset band count
    pub band_count: Option<usize>,
    pub max_render_fps: Option<u32>,
    pub adaptive: Option<bool>,
    pub promote_ratio: Option<f32>,
    pub promotion_delay_ms: Option<f64>,
    pub fps_smoothing: Option<f32>,
    pub warmup_frames: Option<u32>,
    pub drop_threshold: Option<u32>,
    pub history_len: Option<usize>,
    pub presets: Option<Vec<QualityPreset>>,
    /// preset name to start from instead of the probed level
    pub initial_quality: Option<String>,
}

impl ConfigUpdate {
    /// Overlay `src` onto `self`, Option-by-Option.
    pub fn merge(&mut self, src: ConfigUpdate) {
        if src.mapping.is_some()            { self.mapping = src.mapping; }
        if src.sensitivity.is_some()        { self.sensitivity = src.sensitivity; }
        if src.smoothing.is_some()          { self.smoothing = src.smoothing; }
        if src.peak_decay.is_some()         { self.peak_decay = src.peak_decay; }
        if src.show_peaks.is_some()         { self.show_peaks = src.show_peaks; }
        if src.color_scheme.is_some()       { self.color_scheme = src.color_scheme; }
        if src.bar_spacing.is_some()        { self.bar_spacing = src.bar_spacing; }
        if src.min_bar_height.is_some()     { self.min_bar_height = src.min_bar_height; }
        if src.peak_thickness.is_some()     { self.peak_thickness = src.peak_thickness; }
        if src.band_count.is_some()         { self.band_count = src.band_count; }
        if src.max_render_fps.is_some()     { self.max_render_fps = src.max_render_fps; }
        if src.adaptive.is_some()           { self.adaptive = src.adaptive; }
        if src.promote_ratio.is_some()      { self.promote_ratio = src.promote_ratio; }
        if src.promotion_delay_ms.is_some() { self.promotion_delay_ms = src.promotion_delay_ms; }
        if src.fps_smoothing.is_some()      { self.fps_smoothing = src.fps_smoothing; }
        if src.warmup_frames.is_some()      { self.warmup_frames = src.warmup_frames; }
        if src.drop_threshold.is_some()     { self.drop_threshold = src.drop_threshold; }
        if src.history_len.is_some()        { self.history_len = src.history_len; }
        if src.presets.is_some()            { self.presets = src.presets; }
        if src.initial_quality.is_some()    { self.initial_quality = src.initial_quality; }
    }
}

/// Fully resolved renderer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub mapping: FrequencyMapping,
    pub sensitivity: f32,
    pub smoothing: f32,
    pub peak_decay: f32,
    pub show_peaks: bool,
    pub color_scheme: ColorScheme,
    pub bar_spacing: u32,
    pub min_bar_height: u32,
    pub peak_thickness: u32,
    pub band_count: Option<usize>,
    pub max_render_fps: u32,
    pub adaptive: bool,
    pub promote_ratio: f32,
    pub promotion_delay_ms: f64,
    pub fps_smoothing: f32,
    pub warmup_frames: u32,
    pub drop_threshold: u32,
    pub history_len: usize,
    pub presets: Vec<QualityPreset>,
    pub initial_quality: Option<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mapping: FrequencyMapping::Logarithmic,
            sensitivity: DEFAULT_SENSITIVITY,
            smoothing: DEFAULT_SMOOTHING,
            peak_decay: DEFAULT_PEAK_DECAY,
            show_peaks: true,
            color_scheme: ColorScheme::default(),
            bar_spacing: DEFAULT_BAR_SPACING,
            min_bar_height: DEFAULT_MIN_BAR_HEIGHT,
            peak_thickness: DEFAULT_PEAK_THICKNESS,
            band_count: None,
            max_render_fps: DEFAULT_MAX_RENDER_FPS,
            adaptive: true,
            promote_ratio: DEFAULT_PROMOTE_RATIO,
            promotion_delay_ms: DEFAULT_PROMOTION_DELAY_MS,
            fps_smoothing: DEFAULT_FPS_SMOOTHING,
            warmup_frames: DEFAULT_WARMUP_FRAMES,
            drop_threshold: DEFAULT_DROP_THRESHOLD,
            history_len: DEFAULT_HISTORY_LEN,
            presets: default_presets(),
            initial_quality: None,
        }
    }
}

impl RendererConfig {
    /// New config with `update` applied. `self` is untouched if the result
    /// does not validate.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<RendererConfig, ConfigError> {
        let mut c = self.clone();
        if let Some(v) = update.mapping            { c.mapping = v; }
        if let Some(v) = update.sensitivity        { c.sensitivity = v; }
        if let Some(v) = update.smoothing          { c.smoothing = v; }
        if let Some(v) = update.peak_decay         { c.peak_decay = v; }
        if let Some(v) = update.show_peaks         { c.show_peaks = v; }
        if let Some(v) = update.color_scheme       { c.color_scheme = v; }
        if let Some(v) = update.bar_spacing        { c.bar_spacing = v; }
        if let Some(v) = update.min_bar_height     { c.min_bar_height = v; }
        if let Some(v) = update.peak_thickness     { c.peak_thickness = v; }
        if let Some(v) = update.band_count         { c.band_count = Some(v); }
        if let Some(v) = update.max_render_fps     { c.max_render_fps = v; }
        if let Some(v) = update.adaptive           { c.adaptive = v; }
        if let Some(v) = update.promote_ratio      { c.promote_ratio = v; }
        if let Some(v) = update.promotion_delay_ms { c.promotion_delay_ms = v; }
        if let Some(v) = update.fps_smoothing      { c.fps_smoothing = v; }
        if let Some(v) = update.warmup_frames      { c.warmup_frames = v; }
        if let Some(v) = update.drop_threshold     { c.drop_threshold = v; }
        if let Some(v) = update.history_len        { c.history_len = v; }
        if let Some(v) = update.presets.as_ref()   { c.presets = v.clone(); }
        if let Some(v) = update.initial_quality.as_ref() { c.initial_quality = Some(v.clone()); }
        c.validate()?;
        Ok(c)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Validation(msg));

        if !(self.sensitivity.is_finite() && self.sensitivity > 0.0) {
            return fail(format!("sensitivity must be > 0 (got {})", self.sensitivity));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return fail(format!("smoothing must be in [0, 1) (got {})", self.smoothing));
        }
        if !(self.peak_decay > 0.0 && self.peak_decay < 1.0) {
            return fail(format!("peak_decay must be in (0, 1) (got {})", self.peak_decay));
        }
        if self.band_count == Some(0) {
            return fail("band_count must be > 0".into());
        }
        if self.max_render_fps == 0 {
            return fail("max_render_fps must be > 0".into());
        }
        if self.peak_thickness == 0 {
            return fail("peak_thickness must be > 0".into());
        }
        if !(self.promote_ratio >= 1.0) {
            return fail(format!("promote_ratio must be >= 1 (got {})", self.promote_ratio));
        }
        if !(self.promotion_delay_ms >= 0.0) {
            return fail("promotion_delay_ms must be >= 0".into());
        }
        if !(self.fps_smoothing > 0.0 && self.fps_smoothing <= 1.0) {
            return fail(format!("fps_smoothing must be in (0, 1] (got {})", self.fps_smoothing));
        }
        if self.history_len == 0 {
            return fail("history_len must be > 0".into());
        }
        if self.presets.is_empty() {
            return fail("at least one quality preset is required".into());
        }
        for p in &self.presets {
            if p.band_count == 0 || p.target_fps == 0 {
                return fail(format!("preset '{}' needs band_count and target_fps > 0", p.name));
            }
            if let Some(min) = p.min_fps {
                if !(min > 0.0 && min < p.target_fps as f32) {
                    return fail(format!(
                        "preset '{}' min_fps {} must be in (0, {})", p.name, min, p.target_fps
                    ));
                }
            }
        }
        if let Some(name) = self.initial_quality.as_deref() {
            if self.preset_index(name).is_none() {
                return fail(format!("initial_quality '{}' is not a known preset", name));
            }
        }
        Ok(())
    }

    pub fn preset_index(&self, name: &str) -> Option<usize> {
        self.presets.iter().position(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Processor parameters for a preset; smoothing is forced off when the
    /// preset disables it.
    pub fn process_params(&self, preset: &QualityPreset) -> ProcessParams {
        ProcessParams {
            mapping: self.mapping,
            sensitivity: self.sensitivity,
            smoothing: if preset.smoothing_enabled { self.smoothing } else { 0.0 },
            peak_decay: self.peak_decay,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            adaptive: self.adaptive,
            promote_ratio: self.promote_ratio,
            promotion_delay_ms: self.promotion_delay_ms,
            fps_smoothing: self.fps_smoothing,
            warmup_frames: self.warmup_frames,
            drop_threshold: self.drop_threshold,
        }
    }

    /// Band count in force for `preset`.
    pub fn bands_for(&self, preset: &QualityPreset) -> usize {
        self.band_count.unwrap_or(preset.band_count)
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "lyspectrum", about = "LySpectrum audio spectrum renderer", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    #[arg(long)]
    pub refresh_hz: Option<u32>,
    #[arg(long)]
    pub duration_secs: Option<u64>,
    /// starting preset name (ultra, high, ...)
    #[arg(long)]
    pub quality: Option<String>,
    #[arg(long)]
    pub bands: Option<usize>,
    /// spectrum | fire | ocean | mono
    #[arg(long)]
    pub scheme: Option<String>,
    #[arg(long, action = ArgAction::Set)]
    pub adaptive: Option<bool>,
    /// write the last frame as PPM at exit
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
    /// write performance metrics as JSON at exit
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub dump_metrics: Option<PathBuf>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<(Config, Cli), ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;
    Ok((cfg, cli))
}

pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        log::debug!("using config {}", p.display());
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli)?;

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Pretty YAML of the effective config (nice for debugging)
pub fn dump(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/lyspectrum/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/lyspectrum/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lyspectrum.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["lyspectrum.yaml", "config/lyspectrum.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()     { dst.log_level = src.log_level; }
    if src.refresh_hz.is_some()    { dst.refresh_hz = src.refresh_hz; }
    if src.duration_secs.is_some() { dst.duration_secs = src.duration_secs; }
    if src.snapshot_path.is_some() { dst.snapshot_path = src.snapshot_path; }
    if src.metrics_path.is_some()  { dst.metrics_path = src.metrics_path; }
    // surface
    match (&mut dst.surface, src.surface) {
        (None, Some(c)) => dst.surface = Some(c),
        (Some(d), Some(s)) => merge_surface(d, s),
        _ => {}
    }
    // renderer
    match (&mut dst.renderer, src.renderer) {
        (None, Some(c)) => dst.renderer = Some(c),
        (Some(d), Some(s)) => d.merge(s),
        _ => {}
    }
}

fn merge_surface(dst: &mut SurfaceConfig, src: SurfaceConfig) {
    if src.width.is_some()   { dst.width = src.width; }
    if src.height.is_some()  { dst.height = src.height; }
    if src.max_fps.is_some() { dst.max_fps = src.max_fps; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) -> Result<(), ConfigError> {
    if cli.log_level.is_some()     { cfg.log_level = cli.log_level.clone(); }
    if cli.refresh_hz.is_some()    { cfg.refresh_hz = cli.refresh_hz; }
    if cli.duration_secs.is_some() { cfg.duration_secs = cli.duration_secs; }
    if cli.snapshot.is_some()      { cfg.snapshot_path = cli.snapshot.clone(); }
    if cli.dump_metrics.is_some()  { cfg.metrics_path = cli.dump_metrics.clone(); }

    if cli.width.is_some() || cli.height.is_some() {
        let surface = cfg.surface.get_or_insert_with(SurfaceConfig::default);
        if cli.width.is_some()  { surface.width = cli.width; }
        if cli.height.is_some() { surface.height = cli.height; }
    }

    let mut update = ConfigUpdate {
        initial_quality: cli.quality.clone(),
        band_count: cli.bands,
        adaptive: cli.adaptive,
        ..Default::default()
    };
    if let Some(s) = cli.scheme.as_deref() {
        update.color_scheme = Some(serde_yaml::from_str(s)?);
    }
    if update != ConfigUpdate::default() {
        cfg.renderer.get_or_insert_with(ConfigUpdate::default).merge(update);
    }
    Ok(())
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(surface) = cfg.surface.as_ref() {
        if surface.width == Some(0) || surface.height == Some(0) {
            return Err(ConfigError::Validation("surface width/height must be > 0".into()));
        }
        if surface.max_fps == Some(0) {
            return Err(ConfigError::Validation("surface max_fps must be > 0".into()));
        }
    }
    if cfg.refresh_hz == Some(0) {
        return Err(ConfigError::Validation("refresh_hz must be > 0".into()));
    }
    cfg.renderer_config()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut v = vec!["lyspectrum"];
        v.extend_from_slice(args);
        Cli::try_parse_from(v).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let rc = RendererConfig::default();
        assert!(rc.validate().is_ok());
        assert_eq!(rc.presets.len(), 4);
        assert_eq!(rc.peak_decay, DEFAULT_PEAK_DECAY);
    }

    #[test]
    fn test_yaml_renderer_section() {
        let cfg = parse_yaml(
            r#"
log_level: debug
surface:
  width: 320
  height: 120
renderer:
  mapping: linear
  color_scheme: fire
  peak_decay: 0.9
  presets:
    - { name: fast, band_count: 24, target_fps: 30 }
    - { name: slow, band_count: 8, target_fps: 20, min_fps: 10, effects_enabled: false }
"#,
        )
        .unwrap();
        assert_eq!(cfg.surface_size(), (320, 120));
        let rc = cfg.renderer_config().unwrap();
        assert_eq!(rc.mapping, FrequencyMapping::Linear);
        assert_eq!(rc.color_scheme, ColorScheme::Fire);
        assert_eq!(rc.presets[0].name, "fast");
        assert!(rc.presets[0].effects_enabled);
        assert_eq!(rc.presets[1].min_fps(), 10.0);
        assert_eq!(rc.presets[0].min_fps(), 30.0 * DEFAULT_MIN_FPS_RATIO);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = RendererConfig::default();
        let bad = [
            ConfigUpdate { band_count: Some(0), ..Default::default() },
            ConfigUpdate { sensitivity: Some(0.0), ..Default::default() },
            ConfigUpdate { smoothing: Some(1.0), ..Default::default() },
            ConfigUpdate { peak_decay: Some(1.0), ..Default::default() },
            ConfigUpdate { presets: Some(vec![]), ..Default::default() },
            ConfigUpdate { initial_quality: Some("potato".into()), ..Default::default() },
        ];
        for update in &bad {
            assert!(
                matches!(base.apply(update), Err(ConfigError::Validation(_))),
                "accepted {:?}", update
            );
        }
        let mut p = QualityPreset::new("x", 8, 30, true, true);
        p.min_fps = Some(30.0);
        let update = ConfigUpdate { presets: Some(vec![p]), ..Default::default() };
        assert!(base.apply(&update).is_err());
    }

    #[test]
    fn test_apply_keeps_untouched_fields() {
        let base = RendererConfig::default();
        let next = base
            .apply(&ConfigUpdate { sensitivity: Some(2.0), ..Default::default() })
            .unwrap();
        assert_eq!(next.sensitivity, 2.0);
        assert_eq!(next.smoothing, base.smoothing);
        assert_eq!(base.sensitivity, DEFAULT_SENSITIVITY);
    }

    #[test]
    fn test_smoothing_forced_off_by_preset() {
        let rc = RendererConfig::default();
        let low = QualityPreset::new("low", 16, 30, false, false);
        assert_eq!(rc.process_params(&low).smoothing, 0.0);
        let high = QualityPreset::new("high", 64, 60, true, true);
        assert_eq!(rc.process_params(&high).smoothing, DEFAULT_SMOOTHING);
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let mut cfg = parse_yaml("surface: { width: 100, height: 50 }\nrenderer: { band_count: 12 }").unwrap();
        let args = cli(&["--width", "200", "--bands", "24", "--scheme", "ocean", "--quality", "low"]);
        apply_cli_overrides(&mut cfg, &args).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.surface_size(), (200, 50));
        let rc = cfg.renderer_config().unwrap();
        assert_eq!(rc.band_count, Some(24));
        assert_eq!(rc.color_scheme, ColorScheme::Ocean);
        assert_eq!(rc.preset_index(rc.initial_quality.as_deref().unwrap()), Some(3));
    }

    #[test]
    fn test_cli_bad_scheme() {
        let mut cfg = Config::default();
        let args = cli(&["--scheme", "plaid"]);
        assert!(matches!(apply_cli_overrides(&mut cfg, &args), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_zero_surface_rejected() {
        let cfg = parse_yaml("surface: { width: 0 }").unwrap();
        assert!(validate(&cfg).is_err());
    }
}
