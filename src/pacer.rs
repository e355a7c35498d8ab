/*
 *  pacer.rs
 *
 *  LySpectrum - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Frame pacing against host-supplied timestamps
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use crate::constants::{DROPPED_FRAME_FACTOR, FRAME_SLACK_MS, HOST_PERIOD_SMOOTHING};

/// What the scheduler wants done with the current host tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Interval elapsed, render normally.
    Render,
    /// Interval not elapsed but a forced frame was requested.
    Force,
    /// Too early, drop this tick on the floor.
    Skip,
}

#[inline]
fn interval_for(fps: u32) -> f64 {
    1000.0 / fps.max(1) as f64
}

/// Throttles the host's refresh callback down to the active preset's rate.
///
/// Frames are due on a fixed grid (`next_due` advances by one interval per
/// accepted frame), and a frame is taken on whichever host tick lands
/// nearest its due time. A target that does not divide the host rate
/// therefore averages out to the target (45 fps on a 60 Hz host renders
/// three ticks in four) instead of rounding down to the next whole tick.
///
/// Skipped ticks are not queued: if the host runs faster than the target the
/// extra ticks simply vanish. A separate ceiling caps renders per second even
/// for forced frames, so a misbehaving host timer cannot spin the renderer.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    interval_ms: f64,
    ceiling_ms: f64,
    last_frame: Option<f64>,
    next_due: f64,
    last_tick: Option<f64>,
    host_period_ms: Option<f64>,
    delta_ms: f64,
    force_next: bool,
    accepted: u64,
    skipped: u64,
    dropped_total: u64,
    consecutive_dropped: u32,
}

impl FrameScheduler {
    pub fn new(target_fps: u32, max_fps: u32) -> Self {
        Self {
            interval_ms: interval_for(target_fps),
            ceiling_ms: interval_for(max_fps),
            last_frame: None,
            next_due: 0.0,
            last_tick: None,
            host_period_ms: None,
            delta_ms: 0.0,
            force_next: false,
            accepted: 0,
            skipped: 0,
            dropped_total: 0,
            consecutive_dropped: 0,
        }
    }

    /// Retarget; the next frame falls due one new interval after the last.
    pub fn set_target_fps(&mut self, fps: u32) {
        self.interval_ms = interval_for(fps);
        if let Some(last) = self.last_frame {
            self.next_due = last + self.step_ms();
        }
    }

    #[inline]
    pub fn set_max_fps(&mut self, fps: u32) {
        self.ceiling_ms = interval_for(fps);
    }

    pub fn interval_ms(&self) -> f64 { self.interval_ms }
    pub fn delta_ms(&self) -> f64 { self.delta_ms }
    pub fn accepted(&self) -> u64 { self.accepted }
    pub fn skipped(&self) -> u64 { self.skipped }
    pub fn dropped_total(&self) -> u64 { self.dropped_total }
    pub fn consecutive_dropped(&self) -> u32 { self.consecutive_dropped }

    /// Smoothed period between host ticks, skipped ones included.
    pub fn host_period_ms(&self) -> Option<f64> { self.host_period_ms }

    /// Let the next tick through regardless of the preset interval.
    pub fn force_next(&mut self) {
        self.force_next = true;
    }

    /// Interval actually enforceable under the ceiling.
    #[inline]
    fn step_ms(&self) -> f64 {
        self.interval_ms.max(self.ceiling_ms)
    }

    /// How early a tick may be and still take the frame: half a host
    /// period, so the nearest tick wins.
    #[inline]
    fn tolerance_ms(&self) -> f64 {
        let half = self.host_period_ms
            .map(|p| p.min(self.step_ms()) / 2.0)
            .unwrap_or(0.0);
        half.max(FRAME_SLACK_MS)
    }

    fn observe_tick(&mut self, now_ms: f64) {
        if let Some(prev) = self.last_tick {
            let dt = now_ms - prev;
            if dt > 0.0 {
                self.host_period_ms = Some(match self.host_period_ms {
                    Some(p) => p * (1.0 - HOST_PERIOD_SMOOTHING) + dt * HOST_PERIOD_SMOOTHING,
                    None => dt,
                });
            }
        }
        self.last_tick = Some(now_ms);
    }

    /// Returns true if we should render now; if true, it also records the frame.
    #[inline]
    pub fn should_render(&mut self, now_ms: f64) -> bool {
        self.decide(now_ms) != FrameDecision::Skip
    }

    pub fn decide(&mut self, now_ms: f64) -> FrameDecision {
        self.observe_tick(now_ms);
        let Some(last) = self.last_frame else {
            self.accept(now_ms, 0.0, None);
            self.force_next = false;
            return FrameDecision::Render;
        };

        let elapsed = (now_ms - last).max(0.0);
        if elapsed + FRAME_SLACK_MS < self.ceiling_ms {
            self.skipped += 1;
            return FrameDecision::Skip;
        }
        if now_ms + self.tolerance_ms() >= self.next_due {
            self.force_next = false;
            self.accept(now_ms, elapsed, Some(now_ms - self.next_due));
            return FrameDecision::Render;
        }
        if self.force_next {
            self.force_next = false;
            self.accept(now_ms, elapsed, None);
            return FrameDecision::Force;
        }
        self.skipped += 1;
        FrameDecision::Skip
    }

    /// `lateness` is how far past its due time the frame landed; `None` for
    /// frames taken off the grid (first and forced), which restart it.
    fn accept(&mut self, now_ms: f64, elapsed: f64, lateness: Option<f64>) {
        self.last_frame = Some(now_ms);
        self.delta_ms = elapsed;
        self.accepted += 1;
        let step = self.step_ms();
        match lateness {
            Some(late) if late > step * (DROPPED_FRAME_FACTOR - 1.0) => self.note_dropped(),
            _ => self.consecutive_dropped = 0,
        }
        self.next_due = match lateness {
            Some(_) if self.next_due + step > now_ms => self.next_due + step,
            // after a stall, restart the grid rather than bursting to catch up
            _ => now_ms + step,
        };
    }

    /// A tick that was accepted but failed to produce a frame.
    pub fn record_failed_frame(&mut self) {
        self.note_dropped();
    }

    fn note_dropped(&mut self) {
        self.dropped_total += 1;
        self.consecutive_dropped = self.consecutive_dropped.saturating_add(1);
        log::trace!("dropped frame ({} in a row)", self.consecutive_dropped);
    }

    /// Forget timing history, keeping the configured rates.
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.next_due = 0.0;
        self.last_tick = None;
        self.host_period_ms = None;
        self.delta_ms = 0.0;
        self.force_next = false;
        self.accepted = 0;
        self.skipped = 0;
        self.dropped_total = 0;
        self.consecutive_dropped = 0;
    }
}
