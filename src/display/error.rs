/*
 *  display/error.rs
 *
 *  LySpectrum - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Error types for the drawing surface and the renderer
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

use std::fmt;
use std::error::Error;
use thiserror::Error as ThisError;

use crate::config::ConfigError;

/// Error type for all drawing surface operations
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// Surface lost or never acquired; needs a full reinitialisation
    Unavailable(String),

    /// Gradient or other cached resource could not be built
    GradientFailed(String),

    /// Drawing operation failed
    DrawingError(String),

    /// Unsupported operation for this surface
    UnsupportedOperation,

    /// Zero or oversized dimensions
    InvalidSize { width: u32, height: u32 },
}

impl SurfaceError {
    /// Only a lost surface stops the render loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SurfaceError::Unavailable(_))
    }
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::Unavailable(msg) =>
                write!(f, "Drawing surface unavailable: {}", msg),
            SurfaceError::GradientFailed(msg) =>
                write!(f, "Gradient creation failed: {}", msg),
            SurfaceError::DrawingError(msg) =>
                write!(f, "Drawing error: {}", msg),
            SurfaceError::UnsupportedOperation =>
                write!(f, "Operation not supported by this surface"),
            SurfaceError::InvalidSize { width, height } =>
                write!(f, "Invalid surface size {}x{}", width, height),
        }
    }
}

impl Error for SurfaceError {}

/// Failures reported by the renderer to its caller.
#[derive(Debug, ThisError)]
pub enum RenderError {
    /// Unrecoverable: the renderer halted and needs `initialize` again.
    #[error("render unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("renderer not initialised")]
    NotInitialized,

    #[error("renderer halted after surface loss")]
    Halted,

    #[error("frame failed: {0}")]
    Drawing(#[source] SurfaceError),

    #[error("quality level {index} out of range (0..{available})")]
    InvalidQualityLevel { index: usize, available: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RenderError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RenderError::SurfaceUnavailable(_) | RenderError::Halted)
    }
}

impl From<SurfaceError> for RenderError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Unavailable(msg) => RenderError::SurfaceUnavailable(msg),
            other => RenderError::Drawing(other),
        }
    }
}
