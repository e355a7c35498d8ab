/*
 *  display/batch.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Draw batching - group primitives that share a transform and clip,
 *  submit them in order and skip redundant style changes
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
use embedded_graphics::primitives::{Arc as ArcPrimitive, Rectangle};

use crate::display::color::{FillStyle, StrokeStyle};
use crate::display::error::SurfaceError;
use crate::display::traits::{DrawingSurface, Translation};

/// One queued drawing operation.
#[derive(Debug, Clone)]
pub enum Primitive {
    Rect { rect: Rectangle, fill: FillStyle },
    Line { from: Point, to: Point, stroke: StrokeStyle },
    Arc { arc: ArcPrimitive, stroke: StrokeStyle },
}

/// Primitives sharing one optional transform and clip.
#[derive(Debug, Default)]
pub struct DrawBatch {
    pub translation: Option<Translation>,
    pub clip: Option<Rectangle>,
    pub primitives: Vec<Primitive>,
}

impl DrawBatch {
    fn reset(&mut self, translation: Option<Translation>, clip: Option<Rectangle>) {
        self.translation = translation;
        self.clip = clip;
        self.primitives.clear();
    }
}

/// Counters from one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub batches: u32,
    pub draw_calls: u32,
    pub style_changes: u32,
}

/// Per-frame queue of batches.
///
/// Batch storage is pooled: `flush` and `discard` only reset the open count,
/// so primitive vectors keep their capacity across frames.
#[derive(Debug, Default)]
pub struct BatchQueue {
    pool: Vec<DrawBatch>,
    open: usize,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new batch; subsequent `add` calls land in it.
    pub fn begin(&mut self, translation: Option<Translation>, clip: Option<Rectangle>) {
        if self.open == self.pool.len() {
            self.pool.push(DrawBatch::default());
        }
        self.pool[self.open].reset(translation, clip);
        self.open += 1;
    }

    /// Queue a primitive in the current batch, opening a plain one if needed.
    pub fn add(&mut self, primitive: Primitive) {
        if self.open == 0 {
            self.begin(None, None);
        }
        self.pool[self.open - 1].primitives.push(primitive);
    }

    /// Number of queued primitives across all open batches
    pub fn pending(&self) -> usize {
        self.pool[..self.open].iter().map(|b| b.primitives.len()).sum()
    }

    pub fn batches(&self) -> usize {
        self.open
    }

    /// Drop everything queued without drawing.
    pub fn discard(&mut self) {
        self.open = 0;
    }

    /// Submit every batch in insertion order. The queue is empty afterwards
    /// even when the surface reports an error part way through.
    pub fn flush<S>(&mut self, surface: &mut S) -> Result<FlushStats, SurfaceError>
    where
        S: DrawingSurface + ?Sized,
    {
        let open = self.open;
        self.open = 0;

        let mut stats = FlushStats::default();
        let mut fill: Option<FillStyle> = None;
        let mut stroke: Option<StrokeStyle> = None;

        for batch in &self.pool[..open] {
            if batch.primitives.is_empty() {
                continue;
            }
            stats.batches += 1;

            if let Some(t) = batch.translation {
                surface.set_transform(t);
            }
            if batch.clip.is_some() {
                surface.set_clip(batch.clip);
            }

            let drawn = Self::submit(surface, batch, &mut fill, &mut stroke, &mut stats);

            if batch.clip.is_some() {
                surface.set_clip(None);
            }
            if batch.translation.is_some() {
                surface.reset_transform();
            }
            drawn?;
        }
        Ok(stats)
    }

    fn submit<S>(
        surface: &mut S,
        batch: &DrawBatch,
        fill: &mut Option<FillStyle>,
        stroke: &mut Option<StrokeStyle>,
        stats: &mut FlushStats,
    ) -> Result<(), SurfaceError>
    where
        S: DrawingSurface + ?Sized,
    {
        for prim in &batch.primitives {
            match prim {
                Primitive::Rect { rect, fill: style } => {
                    if !fill.as_ref().is_some_and(|f| f.same_as(style)) {
                        surface.set_fill_style(style)?;
                        *fill = Some(style.clone());
                        stats.style_changes += 1;
                    }
                    surface.fill_rect(rect)?;
                }
                Primitive::Line { from, to, stroke: style } => {
                    if *stroke != Some(*style) {
                        surface.set_stroke_style(style)?;
                        *stroke = Some(*style);
                        stats.style_changes += 1;
                    }
                    surface.stroke_line(*from, *to)?;
                }
                Primitive::Arc { arc, stroke: style } => {
                    if *stroke != Some(*style) {
                        surface.set_stroke_style(style)?;
                        *stroke = Some(*style);
                        stats.style_changes += 1;
                    }
                    surface.stroke_arc(arc)?;
                }
            }
            stats.draw_calls += 1;
        }
        Ok(())
    }

    /// Rough footprint of the pooled storage.
    pub fn bytes(&self) -> usize {
        self.pool
            .iter()
            .map(|b| b.primitives.capacity() * std::mem::size_of::<Primitive>())
            .sum::<usize>()
            + self.pool.capacity() * std::mem::size_of::<DrawBatch>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::color::LinearGradient;
    use crate::display::color::ColorScheme;
    use crate::display::mock::{MockSurface, SurfaceCall};
    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::primitives::Rectangle;
    use std::rc::Rc;

    fn rect(x: i32) -> Rectangle {
        Rectangle::new(Point::new(x, 0), Size::new(4, 10))
    }

    #[test]
    fn test_shared_style_set_once() {
        let mut surface = MockSurface::new(100, 50);
        let grad = Rc::new(LinearGradient::build(0, 50, ColorScheme::Fire.bar_stops()).unwrap());
        let mut q = BatchQueue::new();
        q.begin(Some(Translation::new(5, 0)), None);
        for i in 0..16 {
            q.add(Primitive::Rect { rect: rect(i * 5), fill: FillStyle::Gradient(Rc::clone(&grad)) });
        }
        let stats = q.flush(&mut surface).unwrap();
        assert_eq!(stats.style_changes, 1);
        assert_eq!(stats.draw_calls, 16);
        assert_eq!(surface.fill_style_changes(), 1);
        assert_eq!(surface.fill_rect_count(), 16);
        assert_eq!(q.pending(), 0);
    }

    #[test]
    fn test_order_and_transform_restored() {
        let mut surface = MockSurface::new(100, 50);
        let mut q = BatchQueue::new();
        let clip = Rectangle::new(Point::zero(), Size::new(100, 40));
        q.begin(Some(Translation::new(3, 0)), Some(clip));
        q.add(Primitive::Rect { rect: rect(0), fill: FillStyle::Solid(Rgb888::RED) });
        q.begin(None, None);
        q.add(Primitive::Line { from: Point::zero(), to: Point::new(10, 0), stroke: StrokeStyle::default() });
        q.flush(&mut surface).unwrap();

        let calls = surface.calls();
        assert_eq!(calls, vec![
            SurfaceCall::SetTransform(Translation::new(3, 0)),
            SurfaceCall::SetClip(Some(clip)),
            SurfaceCall::SetFill,
            SurfaceCall::FillRect(rect(0)),
            SurfaceCall::SetClip(None),
            SurfaceCall::SetTransform(Translation::IDENTITY),
            SurfaceCall::SetStroke(StrokeStyle::default()),
            SurfaceCall::StrokeLine(Point::zero(), Point::new(10, 0)),
        ]);
    }

    #[test]
    fn test_style_change_counted_per_switch() {
        let mut surface = MockSurface::new(100, 50);
        let mut q = BatchQueue::new();
        q.add(Primitive::Rect { rect: rect(0), fill: FillStyle::Solid(Rgb888::RED) });
        q.add(Primitive::Rect { rect: rect(5), fill: FillStyle::Solid(Rgb888::RED) });
        q.add(Primitive::Rect { rect: rect(10), fill: FillStyle::Solid(Rgb888::BLUE) });
        let arc = ArcPrimitive::new(Point::new(10, 10), 8, 0.0f32.deg(), 90.0f32.deg());
        q.add(Primitive::Arc { arc, stroke: StrokeStyle::default() });
        let stats = q.flush(&mut surface).unwrap();
        assert_eq!(stats.style_changes, 3);
        assert_eq!(stats.draw_calls, 4);
    }

    #[test]
    fn test_failed_flush_still_clears() {
        let mut surface = MockSurface::new(100, 50);
        surface.simulate_draw_failure(true);
        let mut q = BatchQueue::new();
        q.begin(Some(Translation::new(1, 1)), None);
        q.add(Primitive::Rect { rect: rect(0), fill: FillStyle::Solid(Rgb888::GREEN) });
        assert!(q.flush(&mut surface).is_err());
        assert_eq!(q.pending(), 0);
        assert_eq!(q.batches(), 0);
        // transform still reverted
        assert_eq!(surface.current_transform(), Translation::IDENTITY);
    }

    #[test]
    fn test_pool_reused_between_frames() {
        let mut surface = MockSurface::new(10, 10);
        let mut q = BatchQueue::new();
        for _ in 0..3 {
            q.begin(None, None);
            q.add(Primitive::Rect { rect: rect(0), fill: FillStyle::Solid(Rgb888::RED) });
            q.flush(&mut surface).unwrap();
        }
        assert_eq!(q.pool.len(), 1);
        q.add(Primitive::Rect { rect: rect(0), fill: FillStyle::Solid(Rgb888::RED) });
        q.discard();
        assert_eq!(q.pending(), 0);
    }
}
