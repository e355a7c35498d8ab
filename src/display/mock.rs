/*
 *  display/mock.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Mock drawing surface for unit tests
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

use std::sync::{Arc, Mutex};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Arc as ArcPrimitive, Rectangle};

use crate::display::color::{ColorStop, FillStyle, LinearGradient, StrokeStyle};
use crate::display::error::SurfaceError;
use crate::display::traits::{DrawingSurface, SurfaceCapabilities, Translation};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Clear(Rgb888),
    SetFill,
    FillRect(Rectangle),
    SetStroke(StrokeStyle),
    StrokeLine(Point, Point),
    StrokeArc,
    CreateGradient { y0: i32, y1: i32 },
    SetTransform(Translation),
    SetClip(Option<Rectangle>),
    Resize(u32, u32),
    Flush,
}

/// Mock surface for testing
///
/// Records every call and never touches pixels. Clones share state, so a
/// test can keep one handle while the renderer owns the other.
#[derive(Debug, Clone)]
pub struct MockSurface {
    capabilities: SurfaceCapabilities,
    state: Arc<Mutex<MockSurfaceState>>,
}

/// Internal state for the mock surface (shared for inspection in tests)
#[derive(Debug)]
pub struct MockSurfaceState {
    pub width: u32,
    pub height: u32,
    pub calls: Vec<SurfaceCall>,
    pub transform: Translation,
    pub fill: Option<FillStyle>,

    /// False simulates a lost context
    pub available: bool,

    /// Simulate failures (for error testing)
    pub simulate_gradient_failure: bool,
    pub simulate_draw_failure: bool,
}

impl MockSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            capabilities: SurfaceCapabilities::default(),
            state: Arc::new(Mutex::new(MockSurfaceState {
                width,
                height,
                calls: Vec::new(),
                transform: Translation::IDENTITY,
                fill: None,
                available: true,
                simulate_gradient_failure: false,
                simulate_draw_failure: false,
            })),
        }
    }

    pub fn with_capabilities(mut self, capabilities: SurfaceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Get reference to state for inspection in tests
    pub fn state(&self) -> Arc<Mutex<MockSurfaceState>> {
        Arc::clone(&self.state)
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn fill_style_changes(&self) -> usize {
        self.count(|c| matches!(c, SurfaceCall::SetFill))
    }

    pub fn fill_rect_count(&self) -> usize {
        self.count(|c| matches!(c, SurfaceCall::FillRect(_)))
    }

    pub fn gradient_count(&self) -> usize {
        self.count(|c| matches!(c, SurfaceCall::CreateGradient { .. }))
    }

    pub fn clear_count(&self) -> usize {
        self.count(|c| matches!(c, SurfaceCall::Clear(_)))
    }

    pub fn flush_count(&self) -> usize {
        self.count(|c| matches!(c, SurfaceCall::Flush))
    }

    pub fn current_transform(&self) -> Translation {
        self.state.lock().unwrap().transform
    }

    pub fn current_fill(&self) -> Option<FillStyle> {
        self.state.lock().unwrap().fill.clone()
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    pub fn simulate_gradient_failure(&self, fail: bool) {
        self.state.lock().unwrap().simulate_gradient_failure = fail;
    }

    pub fn simulate_draw_failure(&self, fail: bool) {
        self.state.lock().unwrap().simulate_draw_failure = fail;
    }

    /// Change the reported size without a resize call (host-driven resize)
    pub fn set_dimensions(&self, width: u32, height: u32) {
        let mut state = self.state.lock().unwrap();
        state.width = width;
        state.height = height;
    }

    fn record(&self, call: SurfaceCall) -> Result<(), SurfaceError> {
        let mut state = self.state.lock().unwrap();
        if !state.available {
            return Err(SurfaceError::Unavailable("mock surface lost".into()));
        }
        state.calls.push(call);
        Ok(())
    }

    fn record_draw(&self, call: SurfaceCall) -> Result<(), SurfaceError> {
        self.record(call)?;
        if self.state.lock().unwrap().simulate_draw_failure {
            return Err(SurfaceError::DrawingError("simulated draw failure".into()));
        }
        Ok(())
    }
}

impl DrawingSurface for MockSurface {
    fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    fn dimensions(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.width, state.height)
    }

    fn is_available(&self) -> bool {
        self.state.lock().unwrap().available
    }

    fn clear(&mut self, color: Rgb888) -> Result<(), SurfaceError> {
        self.record(SurfaceCall::Clear(color))
    }

    fn set_fill_style(&mut self, style: &FillStyle) -> Result<(), SurfaceError> {
        self.record(SurfaceCall::SetFill)?;
        self.state.lock().unwrap().fill = Some(style.clone());
        Ok(())
    }

    fn fill_rect(&mut self, rect: &Rectangle) -> Result<(), SurfaceError> {
        self.record_draw(SurfaceCall::FillRect(*rect))
    }

    fn set_stroke_style(&mut self, style: &StrokeStyle) -> Result<(), SurfaceError> {
        self.record(SurfaceCall::SetStroke(*style))
    }

    fn stroke_line(&mut self, from: Point, to: Point) -> Result<(), SurfaceError> {
        self.record_draw(SurfaceCall::StrokeLine(from, to))
    }

    fn stroke_arc(&mut self, _arc: &ArcPrimitive) -> Result<(), SurfaceError> {
        self.record_draw(SurfaceCall::StrokeArc)
    }

    fn create_linear_gradient(
        &mut self,
        y0: i32,
        y1: i32,
        stops: &[ColorStop],
    ) -> Result<LinearGradient, SurfaceError> {
        self.record(SurfaceCall::CreateGradient { y0, y1 })?;
        if self.state.lock().unwrap().simulate_gradient_failure {
            return Err(SurfaceError::GradientFailed("simulated gradient failure".into()));
        }
        LinearGradient::build(y0, y1, stops)
    }

    fn set_transform(&mut self, translation: Translation) {
        let mut state = self.state.lock().unwrap();
        state.transform = translation;
        state.calls.push(SurfaceCall::SetTransform(translation));
    }

    fn set_clip(&mut self, clip: Option<Rectangle>) {
        self.state.lock().unwrap().calls.push(SurfaceCall::SetClip(clip));
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        self.record(SurfaceCall::Resize(width, height))?;
        self.set_dimensions(width, height);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SurfaceError> {
        self.record(SurfaceCall::Flush)
    }
}
