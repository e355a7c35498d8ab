/*
 *  display/layout.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Bar geometry for a given surface size and band count
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

use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

use crate::constants::{BAR_AREA_WIDTH_RATIO, REFLECTION_RATIO, REFLECTION_SCALE};

/// Layout parameters for one render pass.
///
/// Bar positions are local to the bar group; the group is centred on the
/// surface by translating by `origin_x`, so the per-bar math never needs to
/// know the surface width.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    /// Surface width in pixels
    pub width: u32,

    /// Surface height in pixels
    pub height: u32,

    /// Number of bars
    pub bands: usize,

    /// Width of a single bar
    pub bar_width: u32,

    /// Gap between adjacent bars (may be squeezed to 0 on narrow surfaces)
    pub spacing: u32,

    /// Device x of the first bar
    pub origin_x: i32,

    /// Bars grow upward from here
    pub baseline: i32,

    /// Tallest bar
    pub max_height: u32,

    /// Shortest bar (silence)
    pub min_height: u32,

    /// Space below the baseline for reflections (0 without effects)
    pub reflection_height: u32,
}

impl BarLayout {
    pub fn compute(
        width: u32,
        height: u32,
        bands: usize,
        spacing: u32,
        min_height: u32,
        effects: bool,
    ) -> Self {
        let n = bands.max(1) as f32;
        let usable = width as f32 * BAR_AREA_WIDTH_RATIO;
        let mut spacing = spacing;
        if spacing as f32 * (n - 1.0) >= usable {
            spacing = 0;
        }
        let total_spacing = spacing as f32 * (n - 1.0);
        let bar_width = ((usable - total_spacing) / n).floor().max(1.0) as u32;

        let group = bar_width as i64 * bands as i64 + spacing as i64 * (bands as i64 - 1).max(0);
        let origin_x = ((width as i64 - group) / 2) as i32;

        let reflection_height = if effects {
            (height as f32 * REFLECTION_RATIO).floor() as u32
        } else {
            0
        };
        let baseline = height.saturating_sub(reflection_height);

        Self {
            width,
            height,
            bands,
            bar_width,
            spacing,
            origin_x,
            baseline: baseline as i32,
            max_height: baseline,
            min_height: min_height.min(baseline),
            reflection_height,
        }
    }

    /// Local x of bar `i` inside the translated group.
    #[inline]
    pub fn bar_x(&self, i: usize) -> i32 {
        (i as u32 * (self.bar_width + self.spacing)) as i32
    }

    /// Pixel height for an amplitude in [0, 1].
    #[inline]
    pub fn bar_height(&self, amplitude: f32) -> u32 {
        let span = (self.max_height - self.min_height) as f32;
        let h = amplitude.clamp(0.0, 1.0) * span + self.min_height as f32;
        (h.round() as u32).min(self.max_height)
    }

    pub fn bar_rect(&self, i: usize, amplitude: f32) -> Rectangle {
        let h = self.bar_height(amplitude);
        Rectangle::new(
            Point::new(self.bar_x(i), self.baseline - h as i32),
            Size::new(self.bar_width, h),
        )
    }

    /// Thin marker sitting on top of the peak height.
    pub fn peak_rect(&self, i: usize, peak: f32, thickness: u32) -> Rectangle {
        let h = self.bar_height(peak) as i32;
        let y = (self.baseline - h - thickness as i32).max(0);
        Rectangle::new(Point::new(self.bar_x(i), y), Size::new(self.bar_width, thickness))
    }

    /// Mirrored stub under the baseline, if effects left room for one.
    pub fn reflection_rect(&self, i: usize, amplitude: f32) -> Option<Rectangle> {
        if self.reflection_height == 0 {
            return None;
        }
        let h = ((self.bar_height(amplitude) as f32 * REFLECTION_SCALE).round() as u32)
            .min(self.reflection_height);
        if h == 0 {
            return None;
        }
        Some(Rectangle::new(
            Point::new(self.bar_x(i), self.baseline),
            Size::new(self.bar_width, h),
        ))
    }

    /// Device-space clip for bars and peaks.
    pub fn bar_area(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.width, self.baseline as u32))
    }

    /// Device-space clip for reflections.
    pub fn reflection_area(&self) -> Rectangle {
        Rectangle::new(Point::new(0, self.baseline), Size::new(self.width, self.reflection_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_width_follows_formula() {
        // (640*0.9 - 2*63) / 64 = (576 - 126) / 64 = 7.03 -> 7
        let l = BarLayout::compute(640, 240, 64, 2, 2, false);
        assert_eq!(l.bar_width, 7);
        assert_eq!(l.spacing, 2);
        let group = 7 * 64 + 2 * 63;
        assert_eq!(l.origin_x, (640 - group) / 2);
    }

    #[test]
    fn test_group_is_centred() {
        let l = BarLayout::compute(300, 100, 10, 3, 1, false);
        let last = l.bar_x(9) + l.bar_width as i32;
        let left = l.origin_x;
        let right = 300 - (l.origin_x + last);
        assert!((left - right).abs() <= 1);
    }

    #[test]
    fn test_heights_span_min_to_max() {
        let l = BarLayout::compute(200, 100, 8, 2, 4, false);
        assert_eq!(l.bar_height(0.0), 4);
        assert_eq!(l.bar_height(1.0), 100);
        assert_eq!(l.bar_height(3.0), 100);
        assert_eq!(l.bar_height(0.5), 52);
        let r = l.bar_rect(0, 1.0);
        assert_eq!(r.top_left.y, 0);
    }

    #[test]
    fn test_effects_reserve_reflection_band() {
        let l = BarLayout::compute(200, 100, 8, 2, 2, true);
        assert_eq!(l.reflection_height, 20);
        assert_eq!(l.baseline, 80);
        assert_eq!(l.max_height, 80);
        let r = l.reflection_rect(0, 1.0).unwrap();
        assert_eq!(r.top_left.y, 80);
        assert_eq!(r.size.height, 20.min((80.0f32 * REFLECTION_SCALE).round() as u32));
        assert!(BarLayout::compute(200, 100, 8, 2, 2, false).reflection_rect(0, 1.0).is_none());
    }

    #[test]
    fn test_narrow_surface_squeezes_spacing() {
        let l = BarLayout::compute(50, 40, 128, 2, 1, false);
        assert_eq!(l.spacing, 0);
        assert_eq!(l.bar_width, 1);
    }

    #[test]
    fn test_peak_marker_clamped_to_top() {
        let l = BarLayout::compute(100, 50, 4, 1, 0, false);
        let r = l.peak_rect(0, 1.0, 2);
        assert_eq!(r.top_left.y, 0);
        assert_eq!(r.size.height, 2);
    }
}
