/*
 *  lib.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Audio-reactive spectrum renderer with adaptive quality control
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

pub mod analyser;
pub mod audio;
pub mod clock;
pub mod config;
pub mod constants;
pub mod display;
pub mod metrics;
pub mod pacer;
pub mod processor;
pub mod quality;
pub mod render_loop;
pub mod renderer;
pub mod vframebuf;

pub use audio::{AudioSource, StaticSource, SyntheticSource};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, ConfigUpdate, RendererConfig};
pub use display::{DrawingSurface, RasterSurface, RenderError, SurfaceError};
pub use render_loop::{LoopControl, RenderLoop};
pub use renderer::{RendererEvent, RendererState, SpectrumRenderer, TickOutcome};
