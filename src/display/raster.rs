/*
 *  display/raster.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Software RGB surface backed by a VarFrameBuf
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

use std::io::{self, Write};

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{
    Arc as ArcPrimitive, Line, PrimitiveStyle, Rectangle, StyledDrawable,
};

use crate::display::color::{ColorStop, FillStyle, LinearGradient, StrokeStyle};
use crate::display::error::SurfaceError;
use crate::display::traits::{DrawingSurface, SurfaceCapabilities, Translation};
use crate::vframebuf::VarFrameBuf;

/// In-memory surface used by the host binary and the integration tests.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    fb: VarFrameBuf<Rgb888>,
    capabilities: SurfaceCapabilities,
    fill: FillStyle,
    stroke: StrokeStyle,
    translation: Translation,
    clip: Option<Rectangle>,
    lost: bool,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, SurfaceError> {
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidSize { width, height });
        }
        log::debug!("raster surface {}x{}", width, height);
        Ok(Self {
            fb: VarFrameBuf::new(width, height, Rgb888::BLACK),
            capabilities: SurfaceCapabilities::default(),
            fill: FillStyle::default(),
            stroke: StrokeStyle::default(),
            translation: Translation::IDENTITY,
            clip: None,
            lost: false,
        })
    }

    pub fn with_max_fps(mut self, max_fps: u32) -> Self {
        self.capabilities.max_fps = max_fps;
        self
    }

    /// Simulate losing the underlying context.
    pub fn mark_lost(&mut self) {
        log::warn!("raster surface marked lost");
        self.lost = true;
    }

    pub fn framebuffer(&self) -> &VarFrameBuf<Rgb888> {
        &self.fb
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb888> {
        self.fb.pixel(x, y)
    }

    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.fb.write_ppm(out)
    }

    #[inline]
    fn check(&self) -> Result<(), SurfaceError> {
        if self.lost {
            Err(SurfaceError::Unavailable("raster surface lost".into()))
        } else {
            Ok(())
        }
    }

    /// Device area that drawing may touch right now.
    fn drawable_area(&self) -> Rectangle {
        let bounds = self.fb.bounding_box();
        match self.clip {
            Some(c) => c.intersection(&bounds),
            None => bounds,
        }
    }

    fn stroke_primitive<P>(&mut self, primitive: P) -> Result<(), SurfaceError>
    where
        P: StyledDrawable<PrimitiveStyle<Rgb888>, Color = Rgb888, Output = ()>,
    {
        self.check()?;
        let style = PrimitiveStyle::with_stroke(self.stroke.color, self.stroke.width);
        let area = self.drawable_area();
        let offset = self.translation.offset();
        let mut clipped = self.fb.clipped(&area);
        let mut target = clipped.translated(offset);
        primitive
            .draw_styled(&style, &mut target)
            .map_err(|e| match e {})
    }
}

impl DrawingSurface for RasterSurface {
    fn capabilities(&self) -> &SurfaceCapabilities {
        &self.capabilities
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.fb.width() as u32, self.fb.height() as u32)
    }

    fn is_available(&self) -> bool {
        !self.lost
    }

    fn clear(&mut self, color: Rgb888) -> Result<(), SurfaceError> {
        self.check()?;
        self.fb.clear_color(color);
        Ok(())
    }

    fn set_fill_style(&mut self, style: &FillStyle) -> Result<(), SurfaceError> {
        self.check()?;
        self.fill = style.clone();
        Ok(())
    }

    fn fill_rect(&mut self, rect: &Rectangle) -> Result<(), SurfaceError> {
        self.check()?;
        let device = self.translation.apply(rect).intersection(&self.drawable_area());
        if device.is_zero_sized() {
            return Ok(());
        }
        match &self.fill {
            FillStyle::Solid(c) => {
                let c = *c;
                self.fb.fill_solid(&device, c).map_err(|e| match e {})
            }
            FillStyle::Gradient(g) => {
                // gradient rows are addressed in user space
                let g = g.clone();
                let dy = self.translation.dy;
                for row in 0..device.size.height as i32 {
                    let y = device.top_left.y + row;
                    let line = Rectangle::new(
                        Point::new(device.top_left.x, y),
                        Size::new(device.size.width, 1),
                    );
                    self.fb.fill_solid(&line, g.color_at(y - dy)).map_err(|e| match e {})?;
                }
                Ok(())
            }
        }
    }

    fn set_stroke_style(&mut self, style: &StrokeStyle) -> Result<(), SurfaceError> {
        self.check()?;
        self.stroke = *style;
        Ok(())
    }

    fn stroke_line(&mut self, from: Point, to: Point) -> Result<(), SurfaceError> {
        self.stroke_primitive(Line::new(from, to))
    }

    fn stroke_arc(&mut self, arc: &ArcPrimitive) -> Result<(), SurfaceError> {
        self.stroke_primitive(*arc)
    }

    fn create_linear_gradient(
        &mut self,
        y0: i32,
        y1: i32,
        stops: &[ColorStop],
    ) -> Result<LinearGradient, SurfaceError> {
        self.check()?;
        LinearGradient::build(y0, y1, stops)
    }

    fn set_transform(&mut self, translation: Translation) {
        self.translation = translation;
    }

    fn set_clip(&mut self, clip: Option<Rectangle>) {
        self.clip = clip;
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), SurfaceError> {
        self.check()?;
        if width == 0 || height == 0 {
            return Err(SurfaceError::InvalidSize { width, height });
        }
        self.fb.resize(width, height, Rgb888::BLACK);
        self.clip = None;
        self.translation = Translation::IDENTITY;
        log::debug!("raster surface resized to {}x{}", width, height);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SurfaceError> {
        self.check()
    }
}
