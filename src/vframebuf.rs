/*
 *  vframebuf.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime-sized, resizable framebuffer for embedded-graphics
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

use core::convert::Infallible;
use std::io::{self, Write};

use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::{PixelColor, Rgb888};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized framebuffer for embedded-graphics.
#[derive(Debug, Clone)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
}

impl<C: PixelColor> VarFrameBuf<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    pub fn as_slice(&self) -> &[C] { &self.buf }

    pub fn clear_color(&mut self, color: C) {
        self.buf.fill(color);
    }

    /// Reallocate to a new size; contents are reset to `fill`.
    pub fn resize(&mut self, width: u32, height: u32, fill: C) {
        self.w = width as usize;
        self.h = height as usize;
        self.buf.clear();
        self.buf.resize(self.w * self.h, fill);
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<C> {
        self.idx(Point::new(x, y)).map(|i| self.buf[i])
    }

    pub fn bytes(&self) -> usize {
        self.buf.capacity() * std::mem::size_of::<C>()
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }

    fn bounds(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.w as u32, self.h as u32))
    }
}

impl VarFrameBuf<Rgb888> {
    /// Binary PPM (P6) dump, handy for eyeballing a frame.
    pub fn write_ppm<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "P6\n{} {}\n255\n", self.w, self.h)?;
        let mut row = Vec::with_capacity(self.w * 3);
        for line in self.buf.chunks(self.w.max(1)) {
            row.clear();
            for c in line {
                row.extend_from_slice(&[c.r(), c.g(), c.b()]);
            }
            out.write_all(&row)?;
        }
        Ok(())
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.clear_color(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // colours arrive row-major over the full area; skip the off-screen ones
        let Size { width, height } = area.size;
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut it = colors.into_iter();
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let Some(c) = it.next() else { return Ok(()) };
                if let Some(i) = self.idx(area.top_left + Point::new(x, y)) {
                    self.buf[i] = c;
                }
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let r = area.intersection(&self.bounds());
        if r.is_zero_sized() {
            return Ok(());
        }
        let (x0, y0) = (r.top_left.x as usize, r.top_left.y as usize);
        let (w, h) = (r.size.width as usize, r.size.height as usize);
        for row in y0..y0 + h {
            let base = row * self.w + x0;
            self.buf[base..base + w].fill(color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_solid_clips_to_bounds() {
        let mut fb = VarFrameBuf::new(8, 4, Rgb888::BLACK);
        fb.fill_solid(&Rectangle::new(Point::new(-2, 2), Size::new(5, 10)), Rgb888::RED).unwrap();
        assert_eq!(fb.pixel(0, 2), Some(Rgb888::RED));
        assert_eq!(fb.pixel(2, 3), Some(Rgb888::RED));
        assert_eq!(fb.pixel(3, 3), Some(Rgb888::BLACK));
        assert_eq!(fb.pixel(0, 1), Some(Rgb888::BLACK));
        assert_eq!(fb.pixel(8, 0), None);
    }

    #[test]
    fn test_fill_contiguous_partially_offscreen() {
        let mut fb = VarFrameBuf::new(4, 4, Rgb888::BLACK);
        let area = Rectangle::new(Point::new(-1, -1), Size::new(3, 3));
        let colors = (0..9u8).map(|v| Rgb888::new(v, 0, 0));
        fb.fill_contiguous(&area, colors).unwrap();
        // (0,0) receives the centre colour of the 3x3 block
        assert_eq!(fb.pixel(0, 0), Some(Rgb888::new(4, 0, 0)));
        assert_eq!(fb.pixel(1, 1), Some(Rgb888::new(8, 0, 0)));
        assert_eq!(fb.pixel(2, 2), Some(Rgb888::BLACK));
    }

    #[test]
    fn test_resize_and_ppm() {
        let mut fb = VarFrameBuf::new(2, 2, Rgb888::WHITE);
        fb.resize(3, 1, Rgb888::BLUE);
        assert_eq!(fb.size(), Size::new(3, 1));
        let mut out = Vec::new();
        fb.write_ppm(&mut out).unwrap();
        let header = b"P6\n3 1\n255\n";
        assert_eq!(&out[..header.len()], header);
        assert_eq!(out.len(), header.len() + 9);
        assert_eq!(&out[header.len()..header.len() + 3], &[0, 0, 255]);
    }
}
