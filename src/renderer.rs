/*
 *  renderer.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Spectrum renderer - ties processor, scheduler, quality control and the
 *  drawing surface together, one tick at a time
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
use std::collections::vec_deque::Drain;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;

use crate::audio::AudioSource;
use crate::clock::{Clock, SectionTimer};
use crate::config::{ConfigUpdate, RendererConfig};
use crate::constants::MAX_PENDING_EVENTS;
use crate::display::batch::{BatchQueue, FlushStats, Primitive};
use crate::display::cache::{ResourceCache, ResourceKey, ResourceKind};
use crate::display::color::{ColorScheme, ColorStop, FillStyle, LinearGradient, StrokeStyle};
use crate::display::error::{RenderError, SurfaceError};
use crate::display::layout::BarLayout;
use crate::display::traits::{DrawingSurface, Translation};
use crate::metrics::{PerformanceHistory, PerformanceMetrics, PerformanceSample};
use crate::pacer::FrameScheduler;
use crate::processor::SpectrumProcessor;
use crate::quality::{Capabilities, QualityChange, QualityController, QualityPreset};

type GradientCache = ResourceCache<ResourceKey, LinearGradient>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Constructed, no surface yet
    Uninitialized,
    Ready,
    /// Surface lost; only `initialize` recovers
    Halted,
    Disposed,
}

/// Notifications queued for the host, drained with `drain_events`.
#[derive(Debug, Clone, PartialEq)]
pub enum RendererEvent {
    QualityChanged { change: QualityChange, preset: String, band_count: usize },
    /// A cached resource could not be built; a flat fill was used instead
    ResourceFallback { kind: ResourceKind, reason: String },
    RenderUnavailable { reason: String },
    Resized { width: u32, height: u32 },
    ConfigApplied,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    Rendered(PerformanceSample),
    /// Too early for the active preset's frame rate
    Skipped,
}

fn push_event(events: &mut VecDeque<RendererEvent>, event: RendererEvent) {
    if events.len() == MAX_PENDING_EVENTS {
        events.pop_front();
    }
    events.push_back(event);
}

/// Flat colour standing in for a gradient of `kind`.
fn fallback_color(kind: ResourceKind, scheme: ColorScheme) -> Rgb888 {
    match kind {
        ResourceKind::BarGradient => scheme.fallback(),
        ResourceKind::ReflectionGradient => scheme.reflection_stops()[0].color,
    }
}

/// Cached gradient for `key`, or a flat fill if it cannot be had this frame.
/// Only a lost surface is an error here.
fn gradient_fill<S>(
    surface: &mut S,
    cache: &mut GradientCache,
    events: &mut VecDeque<RendererEvent>,
    key: ResourceKey,
    span: (i32, i32),
    stops: &[ColorStop],
) -> Result<FillStyle, RenderError>
where
    S: DrawingSurface + ?Sized,
{
    let flat = FillStyle::Solid(fallback_color(key.kind, key.scheme));
    if !surface.capabilities().supports_gradients {
        return Ok(flat);
    }
    match cache.get_or_create(key, || surface.create_linear_gradient(span.0, span.1, stops)) {
        Ok(g) => Ok(FillStyle::Gradient(g)),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            log::warn!("{:?} unavailable, using flat fill: {}", key.kind, e);
            push_event(events, RendererEvent::ResourceFallback { kind: key.kind, reason: e.to_string() });
            Ok(flat)
        }
    }
}

/// The audio-reactive bar renderer.
///
/// Owns every buffer it touches: band buffers, gradient cache, draw batches
/// and sample history are allocated at `initialize`, reused each tick and
/// released by `dispose`. All work happens inside `tick`, which takes
/// `&mut self`, so passes can never overlap.
pub struct SpectrumRenderer<S: DrawingSurface> {
    config: RendererConfig,
    state: RendererState,
    surface: Option<S>,
    capabilities: Option<Capabilities>,
    processor: SpectrumProcessor,
    quality: QualityController,
    scheduler: FrameScheduler,
    cache: GradientCache,
    batches: BatchQueue,
    history: PerformanceHistory,
    source: Option<Box<dyn AudioSource>>,
    sample_buf: Vec<u8>,
    surface_size: (u32, u32),
    pending_resize: Option<(u32, u32)>,
    cache_dirty: bool,
    events: VecDeque<RendererEvent>,
    clock: Box<dyn Clock>,
    frames_rendered: u64,
    quality_changes: u64,
}

impl<S: DrawingSurface> SpectrumRenderer<S> {
    pub fn new(config: RendererConfig, clock: Box<dyn Clock>) -> Result<Self, RenderError> {
        config.validate()?;
        let quality = QualityController::new(config.presets.clone(), config.controller_settings());
        let scheduler = FrameScheduler::new(quality.active().target_fps, config.max_render_fps);
        let history = PerformanceHistory::new(config.history_len);
        Ok(Self {
            config,
            state: RendererState::Uninitialized,
            surface: None,
            capabilities: None,
            processor: SpectrumProcessor::new(0),
            quality,
            scheduler,
            cache: ResourceCache::new(),
            batches: BatchQueue::new(),
            history,
            source: None,
            sample_buf: Vec::new(),
            surface_size: (0, 0),
            pending_resize: None,
            cache_dirty: false,
            events: VecDeque::new(),
            clock,
            frames_rendered: 0,
            quality_changes: 0,
        })
    }

    /// Take ownership of `surface`, probe it and allocate per-surface state.
    /// Also the only way out of `Halted`.
    pub fn initialize(&mut self, surface: S) -> Result<(), RenderError> {
        if self.state == RendererState::Disposed {
            return Err(RenderError::NotInitialized);
        }
        if !surface.is_available() {
            let reason = "surface unavailable at initialise".to_string();
            log::error!("{}", reason);
            push_event(&mut self.events, RendererEvent::RenderUnavailable { reason: reason.clone() });
            return Err(RenderError::SurfaceUnavailable(reason));
        }

        let caps = Capabilities::probe(&surface);
        let level = match self.config.initial_quality.as_deref() {
            Some(name) => self.config.preset_index(name).unwrap_or(0),
            None => self.quality.initial_level(&caps),
        };
        self.quality.set_level(level);
        self.quality.reset_history();

        let preset = self.quality.active();
        let bands = self.config.bands_for(preset);
        log::info!(
            "renderer ready: {}x{} preset '{}' ({} bands @ {} fps)",
            caps.surface_width, caps.surface_height, preset.name, bands, preset.target_fps
        );

        self.scheduler.set_target_fps(preset.target_fps);
        self.scheduler.set_max_fps(self.config.max_render_fps);
        self.scheduler.reset();
        self.processor.resize(bands);
        self.processor.reset();
        self.cache.clear();
        self.batches.discard();
        self.history.clear();
        self.surface_size = surface.dimensions();
        self.pending_resize = None;
        self.cache_dirty = false;
        self.capabilities = Some(caps);
        self.surface = Some(surface);
        self.state = RendererState::Ready;
        Ok(())
    }

    /// Replace the audio source; returns the previous one.
    pub fn attach_source(&mut self, source: Box<dyn AudioSource>) -> Option<Box<dyn AudioSource>> {
        log::debug!("audio source attached ({} bins)", source.bin_count());
        self.source.replace(source)
    }

    pub fn detach_source(&mut self) -> Option<Box<dyn AudioSource>> {
        self.source.take()
    }

    fn ensure_ready(&self) -> Result<(), RenderError> {
        match self.state {
            RendererState::Ready => Ok(()),
            RendererState::Halted => Err(RenderError::Halted),
            RendererState::Uninitialized | RendererState::Disposed => Err(RenderError::NotInitialized),
        }
    }

    /// Host per-refresh entry point.
    pub fn tick(&mut self, now_ms: f64) -> Result<TickOutcome, RenderError> {
        self.ensure_ready()?;
        if !self.scheduler.should_render(now_ms) {
            log::trace!("tick {:.1} skipped", now_ms);
            return Ok(TickOutcome::Skipped);
        }
        match self.render_frame(now_ms) {
            Ok(sample) => Ok(TickOutcome::Rendered(sample)),
            Err(e) => {
                self.scheduler.record_failed_frame();
                Err(e)
            }
        }
    }

    /// Render one frame now, bypassing the scheduler.
    pub fn render_frame(&mut self, now_ms: f64) -> Result<PerformanceSample, RenderError> {
        self.ensure_ready()?;
        match self.draw_frame(now_ms) {
            Ok(sample) => {
                self.history.push(sample);
                self.frames_rendered += 1;
                let dropped = self.scheduler.consecutive_dropped();
                let work_ms = sample.clear_time_ms + sample.draw_time_ms;
                if let Some(change) = self.quality.record_frame(now_ms, work_ms, dropped) {
                    self.apply_quality_change(change);
                }
                Ok(sample)
            }
            Err(e) => {
                self.batches.discard();
                if e.is_fatal() {
                    self.halt(&e);
                } else {
                    log::warn!("frame failed: {}", e);
                }
                Err(e)
            }
        }
    }

    fn halt(&mut self, err: &RenderError) {
        log::error!("render halted: {}", err);
        self.state = RendererState::Halted;
        push_event(&mut self.events, RendererEvent::RenderUnavailable { reason: err.to_string() });
    }

    /// Resize, cache invalidation, band reallocation, then fold in the
    /// latest sample.
    fn prepare(&mut self) -> Result<(), RenderError> {
        let surface = self.surface.as_mut().ok_or(RenderError::NotInitialized)?;
        if !surface.is_available() {
            return Err(RenderError::SurfaceUnavailable("surface reported unavailable".into()));
        }

        if let Some((w, h)) = self.pending_resize.take() {
            match surface.resize(w, h) {
                Ok(()) => {}
                Err(SurfaceError::UnsupportedOperation) => {
                    log::warn!("surface cannot resize to {}x{}", w, h);
                }
                Err(e) => return Err(e.into()),
            }
        }
        let dims = surface.dimensions();
        if dims != self.surface_size {
            log::info!("surface {}x{} -> {}x{}", self.surface_size.0, self.surface_size.1, dims.0, dims.1);
            self.surface_size = dims;
            self.cache_dirty = true;
            push_event(&mut self.events, RendererEvent::Resized { width: dims.0, height: dims.1 });
        }
        if self.cache_dirty {
            self.cache.clear();
            self.cache_dirty = false;
        }

        let preset = self.quality.active();
        self.processor.resize(self.config.bands_for(preset));

        match self.source.as_mut() {
            Some(src) => {
                let n = src.bin_count();
                if self.sample_buf.len() != n {
                    self.sample_buf.resize(n, 0);
                }
                src.frequency_magnitudes(&mut self.sample_buf);
            }
            None => self.sample_buf.clear(),
        }
        let params = self.config.process_params(preset);
        self.processor.process(&self.sample_buf, &params);
        Ok(())
    }

    fn draw_frame(&mut self, now_ms: f64) -> Result<PerformanceSample, RenderError> {
        self.prepare()?;

        let (clear_time_ms, draw_time_ms, stats) = {
            let Self { surface, clock, cache, batches, processor, config, quality, events, .. } = self;
            let surface = surface.as_mut().ok_or(RenderError::NotInitialized)?;
            let preset: &QualityPreset = quality.active();
            let scheme = config.color_scheme;
            let clips = surface.capabilities().supports_clip;
            let mut timer = SectionTimer::start(&**clock);

            surface.clear(scheme.background())?;
            let clear_time_ms = timer.lap();

            let (w, h) = surface.dimensions();
            let bands = processor.band_count();
            let layout = BarLayout::compute(
                w, h, bands, config.bar_spacing, config.min_bar_height, preset.effects_enabled,
            );
            let offset = Some(Translation::new(layout.origin_x, 0));
            let smoothed = processor.smoothed();
            let peaks = processor.peaks();

            // bars share one gradient spanning the full bar area
            let bar_fill = gradient_fill(
                surface, cache, events,
                ResourceKey::new(ResourceKind::BarGradient, scheme, layout.baseline as u32),
                (0, layout.baseline),
                scheme.bar_stops(),
            )?;
            batches.begin(offset, clips.then(|| layout.bar_area()));
            for i in 0..bands {
                batches.add(Primitive::Rect {
                    rect: layout.bar_rect(i, smoothed.get(i)),
                    fill: bar_fill.clone(),
                });
            }
            if preset.effects_enabled {
                let cap = StrokeStyle::new(scheme.highlight(), 1);
                for i in 0..bands {
                    let r = layout.bar_rect(i, smoothed.get(i));
                    let right = r.top_left + Point::new(r.size.width as i32 - 1, 0);
                    batches.add(Primitive::Line { from: r.top_left, to: right, stroke: cap });
                }
            }
            if config.show_peaks {
                let marker = FillStyle::Solid(scheme.peak());
                for i in 0..bands {
                    batches.add(Primitive::Rect {
                        rect: layout.peak_rect(i, peaks.get(i), config.peak_thickness),
                        fill: marker.clone(),
                    });
                }
            }

            if layout.reflection_height > 0 {
                let stops = scheme.reflection_stops();
                let top = layout.baseline;
                let refl_fill = gradient_fill(
                    surface, cache, events,
                    ResourceKey::new(ResourceKind::ReflectionGradient, scheme, layout.reflection_height),
                    (top, top + layout.reflection_height as i32),
                    &stops,
                )?;
                batches.begin(offset, clips.then(|| layout.reflection_area()));
                for i in 0..bands {
                    if let Some(rect) = layout.reflection_rect(i, smoothed.get(i)) {
                        batches.add(Primitive::Rect { rect, fill: refl_fill.clone() });
                    }
                }
            }

            let stats: FlushStats = batches.flush(surface)?;
            surface.flush()?;
            let draw_time_ms = timer.lap();
            (clear_time_ms, draw_time_ms, stats)
        };

        let sample = PerformanceSample {
            timestamp_ms: now_ms,
            frame_time_ms: self.scheduler.delta_ms(),
            clear_time_ms,
            draw_time_ms,
            draw_calls: stats.draw_calls,
            style_changes: stats.style_changes,
            estimated_memory_bytes: self.estimated_memory(),
        };
        log::trace!(
            "frame {:.1}: {} draws, {} style changes, {:.2}ms",
            now_ms, sample.draw_calls, sample.style_changes, draw_time_ms
        );
        Ok(sample)
    }

    fn estimated_memory(&self) -> usize {
        self.processor.bytes()
            + self.cache.bytes()
            + self.batches.bytes()
            + self.history.bytes()
            + self.sample_buf.capacity()
    }

    fn apply_quality_change(&mut self, change: QualityChange) {
        let preset = self.quality.active();
        let bands = self.config.bands_for(preset);
        log::info!(
            "quality {} -> {} ({:?}): '{}' {} bands @ {} fps",
            change.from, change.to, change.reason, preset.name, bands, preset.target_fps
        );
        self.scheduler.set_target_fps(preset.target_fps);
        self.quality_changes += 1;
        push_event(&mut self.events, RendererEvent::QualityChanged {
            change,
            preset: preset.name.clone(),
            band_count: bands,
        });
    }

    /// Apply a partial configuration. Nothing changes if it does not validate.
    pub fn update_config(&mut self, update: &ConfigUpdate) -> Result<(), RenderError> {
        let next = self.config.apply(update).inspect_err(|e| log::warn!("config rejected: {}", e))?;

        if next.presets != self.config.presets {
            self.quality.set_presets(next.presets.clone());
        }
        let settings = next.controller_settings();
        if settings != *self.quality.settings() {
            self.quality.set_settings(settings);
        }
        if next.color_scheme != self.config.color_scheme {
            self.cache_dirty = true;
        }
        if next.history_len != self.config.history_len {
            self.history.set_capacity(next.history_len);
        }
        self.scheduler.set_max_fps(next.max_render_fps);
        self.scheduler.set_target_fps(self.quality.active().target_fps);
        self.scheduler.force_next();
        self.config = next;
        log::debug!("config updated");
        push_event(&mut self.events, RendererEvent::ConfigApplied);
        Ok(())
    }

    /// Manual preset selection.
    pub fn set_quality_level(&mut self, index: usize) -> Result<(), RenderError> {
        let available = self.quality.presets().len();
        let change = self
            .quality
            .set_level(index)
            .ok_or(RenderError::InvalidQualityLevel { index, available })?;
        if change.from != change.to {
            self.apply_quality_change(change);
        }
        self.scheduler.force_next();
        Ok(())
    }

    /// Queue a surface resize; applied at the start of the next tick.
    /// Ignored when the surface reports it cannot resize.
    pub fn request_resize(&mut self, width: u32, height: u32) {
        if let Some(surface) = self.surface.as_ref() {
            if !surface.capabilities().supports_resize {
                log::warn!("surface cannot resize, {}x{} ignored", width, height);
                return;
            }
        }
        self.pending_resize = Some((width, height));
        self.scheduler.force_next();
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let preset = self.quality.active();
        PerformanceMetrics {
            average_fps: self.quality.average_fps(),
            headroom_fps: self.quality.headroom_fps(),
            quality_index: self.quality.current_index(),
            quality_name: preset.name.clone(),
            band_count: self.config.bands_for(preset),
            frames_rendered: self.frames_rendered,
            frames_skipped: self.scheduler.skipped(),
            frames_dropped: self.scheduler.dropped_total(),
            consecutive_dropped: self.scheduler.consecutive_dropped(),
            quality_changes: self.quality_changes,
            average_frame_time_ms: self.history.average_frame_time_ms(),
            average_draw_time_ms: self.history.average_draw_time_ms(),
            cache_entries: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            last_sample: self.history.last().copied(),
        }
    }

    /// Single dispatch point for queued notifications.
    pub fn drain_events(&mut self) -> Drain<'_, RendererEvent> {
        self.events.drain(..)
    }

    /// Release everything and hand the surface back.
    pub fn dispose(&mut self) -> Option<S> {
        if self.state != RendererState::Disposed {
            log::info!("renderer disposed after {} frames", self.frames_rendered);
        }
        self.state = RendererState::Disposed;
        self.processor.release();
        self.cache.clear();
        self.batches.discard();
        self.history.clear();
        self.quality.reset_history();
        self.scheduler.reset();
        self.source = None;
        self.sample_buf = Vec::new();
        self.pending_resize = None;
        self.capabilities = None;
        self.surface.take()
    }

    pub fn state(&self) -> RendererState { self.state }
    pub fn config(&self) -> &RendererConfig { &self.config }
    pub fn processor(&self) -> &SpectrumProcessor { &self.processor }
    pub fn scheduler(&self) -> &FrameScheduler { &self.scheduler }
    pub fn quality(&self) -> &QualityController { &self.quality }
    pub fn history(&self) -> &PerformanceHistory { &self.history }
    pub fn capabilities(&self) -> Option<&Capabilities> { self.capabilities.as_ref() }
    pub fn surface(&self) -> Option<&S> { self.surface.as_ref() }
    pub fn surface_mut(&mut self) -> Option<&mut S> { self.surface.as_mut() }
    pub fn active_preset(&self) -> &QualityPreset { self.quality.active() }
}
