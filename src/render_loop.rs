/*
 *  render_loop.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Adapter between a host's per-refresh callback and the renderer
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

use crate::display::error::RenderError;
use crate::display::traits::DrawingSurface;
use crate::renderer::SpectrumRenderer;

/// What the host should do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Schedule the next callback
    Continue,
    Stop,
}

pub struct RenderLoop<S: DrawingSurface> {
    renderer: SpectrumRenderer<S>,
    stop_requested: bool,
    stopped: bool,
    released: Option<S>,
    frames: u64,
    errors: u64,
}

impl<S: DrawingSurface> RenderLoop<S> {
    pub fn new(renderer: SpectrumRenderer<S>) -> Self {
        Self {
            renderer,
            stop_requested: false,
            stopped: false,
            released: None,
            frames: 0,
            errors: 0,
        }
    }

    /// Host callback, once per display refresh.
    pub fn on_frame(&mut self, now_ms: f64) -> LoopControl {
        if self.stopped {
            return LoopControl::Stop;
        }
        if self.stop_requested {
            self.finish();
            return LoopControl::Stop;
        }

        self.frames += 1;
        match self.renderer.tick(now_ms) {
            Ok(_) => LoopControl::Continue,
            Err(e @ (RenderError::SurfaceUnavailable(_) | RenderError::Halted | RenderError::NotInitialized)) => {
                log::error!("render loop stopping: {}", e);
                self.errors += 1;
                self.stopped = true;
                LoopControl::Stop
            }
            Err(e) => {
                log::warn!("frame error: {}", e);
                self.errors += 1;
                LoopControl::Continue
            }
        }
    }

    /// Cancel. The next `on_frame` returns `Stop` and disposes the renderer.
    pub fn stop(&mut self) {
        log::debug!("render loop stop requested");
        self.stop_requested = true;
    }

    fn finish(&mut self) {
        self.stopped = true;
        self.released = self.renderer.dispose();
    }

    /// Stop right away and hand the surface back, whatever state the
    /// renderer was left in.
    pub fn shutdown(&mut self) -> Option<S> {
        if !self.stopped {
            self.finish();
        }
        self.released.take().or_else(|| self.renderer.dispose())
    }

    pub fn is_running(&self) -> bool { !self.stopped }
    pub fn frames(&self) -> u64 { self.frames }
    pub fn errors(&self) -> u64 { self.errors }

    pub fn renderer(&self) -> &SpectrumRenderer<S> { &self.renderer }
    pub fn renderer_mut(&mut self) -> &mut SpectrumRenderer<S> { &mut self.renderer }

    /// Surface handed back by the renderer once the loop has stopped.
    pub fn take_surface(&mut self) -> Option<S> {
        self.released.take()
    }
}
