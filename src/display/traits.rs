/*
 *  display/traits.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for drawing surface abstraction
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

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Arc as ArcPrimitive, Rectangle};

use crate::display::color::{ColorStop, FillStyle, LinearGradient, StrokeStyle};
use crate::display::error::SurfaceError;

/// Surface capabilities and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceCapabilities {
    /// Maximum refresh the surface can present
    pub max_fps: u32,

    /// Whether gradient fills are available (flat fills always are)
    pub supports_gradients: bool,

    /// Whether the surface honours clip regions
    pub supports_clip: bool,

    /// Whether the surface can be resized in place
    pub supports_resize: bool,
}

impl Default for SurfaceCapabilities {
    fn default() -> Self {
        Self {
            max_fps: 60,
            supports_gradients: true,
            supports_clip: true,
            supports_resize: true,
        }
    }
}

/// Translation applied to every primitive until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Translation {
    pub dx: i32,
    pub dy: i32,
}

impl Translation {
    pub const IDENTITY: Translation = Translation { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    #[inline]
    pub fn offset(&self) -> Point {
        Point::new(self.dx, self.dy)
    }

    #[inline]
    pub fn apply(&self, rect: &Rectangle) -> Rectangle {
        Rectangle::new(rect.top_left + self.offset(), rect.size)
    }
}

/// Stateful 2D raster target the renderer paints onto.
///
/// The surface keeps a current fill style, stroke style, translation and
/// clip, in the manner of a canvas context. Callers are expected to change
/// style state as rarely as possible; `fill_rect` and the stroke calls use
/// whatever is current.
pub trait DrawingSurface {
    /// Returns the capabilities of this surface
    fn capabilities(&self) -> &SurfaceCapabilities;

    /// Current pixel dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// False once the surface has been lost and must be recreated
    fn is_available(&self) -> bool {
        true
    }

    /// Fill the whole surface with an opaque colour, ignoring clip and translation
    fn clear(&mut self, color: Rgb888) -> Result<(), SurfaceError>;

    fn set_fill_style(&mut self, style: &FillStyle) -> Result<(), SurfaceError>;

    fn fill_rect(&mut self, rect: &Rectangle) -> Result<(), SurfaceError>;

    fn set_stroke_style(&mut self, style: &StrokeStyle) -> Result<(), SurfaceError>;

    fn stroke_line(&mut self, from: Point, to: Point) -> Result<(), SurfaceError>;

    fn stroke_arc(&mut self, arc: &ArcPrimitive) -> Result<(), SurfaceError>;

    /// Build a vertical gradient spanning `y0..y1` in user space
    fn create_linear_gradient(
        &mut self,
        y0: i32,
        y1: i32,
        stops: &[ColorStop],
    ) -> Result<LinearGradient, SurfaceError>;

    fn set_transform(&mut self, translation: Translation);

    fn reset_transform(&mut self) {
        self.set_transform(Translation::IDENTITY);
    }

    /// Restrict drawing to `clip` (device coordinates); `None` removes it
    fn set_clip(&mut self, clip: Option<Rectangle>);

    /// Change the pixel dimensions (if supported)
    fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        let _ = (width, height);
        Err(SurfaceError::UnsupportedOperation)
    }

    /// Present the finished frame
    fn flush(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }
}
