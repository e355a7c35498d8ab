/*
 *  display/mod.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Display subsystem - drawing surface abstraction, colour, layout,
 *  resource caching and draw batching
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

// Core trait definitions
pub mod traits;
pub mod error;
pub mod color;

// Geometry
pub mod layout;

// Render cache & batcher
pub mod cache;
pub mod batch;

// Software surface
pub mod raster;

#[cfg(test)]
pub mod mock;

// Re-exports for convenience
pub use traits::{DrawingSurface, SurfaceCapabilities, Translation};
pub use error::{RenderError, SurfaceError};
pub use color::{ColorScheme, ColorStop, FillStyle, LinearGradient, StrokeStyle};
pub use layout::BarLayout;
pub use cache::{ResourceCache, ResourceKey, ResourceKind};
pub use batch::{BatchQueue, DrawBatch, FlushStats, Primitive};
pub use raster::RasterSurface;
