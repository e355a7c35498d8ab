/*
 *  display/color.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Colour schemes, gradients and fill/stroke styles
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

use std::rc::Rc;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use serde::{Deserialize, Serialize};

use crate::display::error::SurfaceError;

/// A colour anchored at `offset` (0.0 = top of the gradient, 1.0 = bottom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Rgb888,
}

impl ColorStop {
    pub const fn new(offset: f32, color: Rgb888) -> Self {
        Self { offset, color }
    }
}

const SPECTRUM_BARS: [ColorStop; 3] = [
    ColorStop::new(0.0, Rgb888::new(255, 48, 48)),
    ColorStop::new(0.45, Rgb888::new(255, 214, 0)),
    ColorStop::new(1.0, Rgb888::new(0, 200, 96)),
];
const FIRE_BARS: [ColorStop; 3] = [
    ColorStop::new(0.0, Rgb888::new(255, 240, 160)),
    ColorStop::new(0.4, Rgb888::new(255, 120, 0)),
    ColorStop::new(1.0, Rgb888::new(140, 0, 0)),
];
const OCEAN_BARS: [ColorStop; 3] = [
    ColorStop::new(0.0, Rgb888::new(180, 255, 255)),
    ColorStop::new(0.5, Rgb888::new(0, 160, 220)),
    ColorStop::new(1.0, Rgb888::new(0, 40, 120)),
];
const MONO_BARS: [ColorStop; 2] = [
    ColorStop::new(0.0, Rgb888::new(255, 255, 255)),
    ColorStop::new(1.0, Rgb888::new(96, 96, 96)),
];

/// Palette used for bars, peaks and reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Spectrum,
    Fire,
    Ocean,
    Mono,
}

impl ColorScheme {
    /// Top-to-bottom stops for the bar gradient.
    pub fn bar_stops(&self) -> &'static [ColorStop] {
        match self {
            ColorScheme::Spectrum => &SPECTRUM_BARS,
            ColorScheme::Fire => &FIRE_BARS,
            ColorScheme::Ocean => &OCEAN_BARS,
            ColorScheme::Mono => &MONO_BARS,
        }
    }

    /// Reflection fades from a dimmed base colour into the background.
    pub fn reflection_stops(&self) -> [ColorStop; 2] {
        let stops = self.bar_stops();
        let base = stops[stops.len() - 1].color;
        [
            ColorStop::new(0.0, scale(base, 0.45)),
            ColorStop::new(1.0, self.background()),
        ]
    }

    pub fn background(&self) -> Rgb888 {
        match self {
            ColorScheme::Mono => Rgb888::BLACK,
            _ => Rgb888::new(8, 8, 16),
        }
    }

    pub fn peak(&self) -> Rgb888 {
        match self {
            ColorScheme::Spectrum => Rgb888::new(255, 255, 255),
            ColorScheme::Fire => Rgb888::new(255, 255, 200),
            ColorScheme::Ocean => Rgb888::new(220, 255, 255),
            ColorScheme::Mono => Rgb888::new(200, 200, 200),
        }
    }

    pub fn highlight(&self) -> Rgb888 {
        scale(self.bar_stops()[0].color, 1.2)
    }

    /// Flat fill used when a gradient cannot be built.
    pub fn fallback(&self) -> Rgb888 {
        let stops = self.bar_stops();
        stops[stops.len() / 2].color
    }
}

#[inline]
fn scale(c: Rgb888, k: f32) -> Rgb888 {
    let ch = |v: u8| ((v as f32 * k).round().clamp(0.0, 255.0)) as u8;
    Rgb888::new(ch(c.r()), ch(c.g()), ch(c.b()))
}

#[inline]
fn lerp(a: Rgb888, b: Rgb888, t: f32) -> Rgb888 {
    let ch = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8;
    Rgb888::new(ch(a.r(), b.r()), ch(a.g(), b.g()), ch(a.b(), b.b()))
}

/// Vertical gradient baked into one colour per row.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    y0: i32,
    lut: Vec<Rgb888>,
}

impl LinearGradient {
    /// Bake `stops` over rows `y0..y1`. Stops must be sorted by offset.
    pub fn build(y0: i32, y1: i32, stops: &[ColorStop]) -> Result<Self, SurfaceError> {
        if stops.is_empty() {
            return Err(SurfaceError::GradientFailed("no colour stops".into()));
        }
        if y1 <= y0 {
            return Err(SurfaceError::GradientFailed(format!("empty span {}..{}", y0, y1)));
        }
        if stops.windows(2).any(|w| w[1].offset < w[0].offset) {
            return Err(SurfaceError::GradientFailed("colour stops out of order".into()));
        }

        let rows = (y1 - y0) as usize;
        let mut lut = Vec::with_capacity(rows);
        for row in 0..rows {
            let t = if rows > 1 { row as f32 / (rows - 1) as f32 } else { 0.0 };
            lut.push(Self::sample(stops, t));
        }
        Ok(Self { y0, lut })
    }

    fn sample(stops: &[ColorStop], t: f32) -> Rgb888 {
        let first = stops[0];
        if t <= first.offset {
            return first.color;
        }
        for pair in stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b.offset {
                let span = b.offset - a.offset;
                let k = if span > 0.0 { (t - a.offset) / span } else { 1.0 };
                return lerp(a.color, b.color, k);
            }
        }
        stops[stops.len() - 1].color
    }

    pub fn y0(&self) -> i32 { self.y0 }
    pub fn rows(&self) -> usize { self.lut.len() }

    /// Colour at user-space row `y`, clamped to the ends.
    #[inline]
    pub fn color_at(&self, y: i32) -> Rgb888 {
        let last = self.lut.len() as i32 - 1;
        let i = (y - self.y0).clamp(0, last.max(0)) as usize;
        self.lut[i]
    }

    pub fn bytes(&self) -> usize {
        self.lut.capacity() * std::mem::size_of::<Rgb888>()
    }
}

/// Current fill state of a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum FillStyle {
    Solid(Rgb888),
    Gradient(Rc<LinearGradient>),
}

impl FillStyle {
    /// Identity comparison: gradients match only if they are the same instance.
    pub fn same_as(&self, other: &FillStyle) -> bool {
        match (self, other) {
            (FillStyle::Solid(a), FillStyle::Solid(b)) => a == b,
            (FillStyle::Gradient(a), FillStyle::Gradient(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Colour at row `y` for this style.
    #[inline]
    pub fn color_at(&self, y: i32) -> Rgb888 {
        match self {
            FillStyle::Solid(c) => *c,
            FillStyle::Gradient(g) => g.color_at(y),
        }
    }
}

impl Default for FillStyle {
    fn default() -> Self {
        FillStyle::Solid(Rgb888::BLACK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrokeStyle {
    pub color: Rgb888,
    pub width: u32,
}

impl StrokeStyle {
    pub fn new(color: Rgb888, width: u32) -> Self {
        Self { color, width }
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self { color: Rgb888::WHITE, width: 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_hits_end_stops() {
        let g = LinearGradient::build(0, 100, ColorScheme::Spectrum.bar_stops()).unwrap();
        assert_eq!(g.rows(), 100);
        assert_eq!(g.color_at(0), SPECTRUM_BARS[0].color);
        assert_eq!(g.color_at(99), SPECTRUM_BARS[2].color);
        // clamped outside the span
        assert_eq!(g.color_at(-20), SPECTRUM_BARS[0].color);
        assert_eq!(g.color_at(500), SPECTRUM_BARS[2].color);
    }

    #[test]
    fn test_gradient_interpolates_midpoint() {
        let stops = [
            ColorStop::new(0.0, Rgb888::new(0, 0, 0)),
            ColorStop::new(1.0, Rgb888::new(200, 100, 50)),
        ];
        let g = LinearGradient::build(10, 21, &stops).unwrap();
        assert_eq!(g.color_at(15), Rgb888::new(100, 50, 25));
    }

    #[test]
    fn test_gradient_rejects_bad_input() {
        assert!(LinearGradient::build(0, 10, &[]).is_err());
        assert!(LinearGradient::build(5, 5, ColorScheme::Fire.bar_stops()).is_err());
        let unordered = [
            ColorStop::new(0.8, Rgb888::BLACK),
            ColorStop::new(0.2, Rgb888::WHITE),
        ];
        assert!(LinearGradient::build(0, 10, &unordered).is_err());
    }

    #[test]
    fn test_fill_style_identity() {
        let g = Rc::new(LinearGradient::build(0, 4, ColorScheme::Ocean.bar_stops()).unwrap());
        let same = FillStyle::Gradient(Rc::clone(&g));
        let copy = FillStyle::Gradient(Rc::new((*g).clone()));
        assert!(FillStyle::Gradient(g).same_as(&same));
        assert!(!same.same_as(&copy));
        assert!(FillStyle::Solid(Rgb888::RED).same_as(&FillStyle::Solid(Rgb888::RED)));
    }
}
