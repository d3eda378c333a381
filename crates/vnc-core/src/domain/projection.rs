//! Display projection geometry for the mirrored virtual display.
//!
//! The compositor renders the device's layer stack into a virtual display
//! whose buffers become the served framebuffer.  The projection says which
//! part of the layer stack is captured (all of it) and where inside the
//! framebuffer it lands: scaled to fit, aspect ratio preserved, centred, with
//! black bars on the two remaining sides.
//!
//! ```text
//!   framebuffer (video size)
//!   ┌──────────────────────────┐
//!   │    │               │     │
//!   │    │  display_rect │     │  off_x = (video_w - out_w) / 2
//!   │    │               │     │
//!   └──────────────────────────┘
//! ```
//!
//! When `rotate` is requested the content is turned 90 degrees, so the fit is
//! computed against the video size with width and height swapped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when computing a projection.
#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    /// The source display reported a zero dimension.
    #[error("display has empty geometry: {width}x{height}")]
    EmptyDisplay { width: u32, height: u32 },

    /// The orientation value is not a multiple of 90 degrees.
    #[error("invalid display orientation: {0} degrees")]
    InvalidOrientation(u32),
}

/// Physical display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Parses an orientation given in degrees (0, 90, 180, 270).
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidOrientation`] for any other value.
    pub fn from_degrees(degrees: u32) -> Result<Self, ProjectionError> {
        match degrees {
            0 => Ok(Orientation::Deg0),
            90 => Ok(Orientation::Deg90),
            180 => Ok(Orientation::Deg180),
            270 => Ok(Orientation::Deg270),
            other => Err(ProjectionError::InvalidOrientation(other)),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Returns `true` for the two sideways orientations.
    pub fn is_sideways(self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }
}

/// Characteristics of the physical display being mirrored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
}

impl DisplayInfo {
    /// Returns `true` if the device is currently rotated sideways.
    pub fn is_rotated(&self) -> bool {
        self.orientation.is_sideways()
    }

    /// Native video size: the display size in its current orientation.
    pub fn native_video_size(&self) -> (u32, u32) {
        if self.is_rotated() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// Axis-aligned rectangle with exclusive right/bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            top: 0,
            right: width,
            bottom: height,
        }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Where the layer stack lands inside the served framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayProjection {
    /// Orientation applied to the virtual display (0 or 90 degrees).
    pub orientation: Orientation,
    /// Captured region of the layer stack; always the whole source.
    pub layer_stack: Rect,
    /// Destination region, in projected (possibly rotated) video coordinates.
    pub display_rect: Rect,
    pub framebuffer_width: u32,
    pub framebuffer_height: u32,
}

impl DisplayProjection {
    /// Computes the projection of `display` into a `video_width` × `video_height`
    /// framebuffer.  A zero video dimension means "native size".
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::EmptyDisplay`] if the display has no area.
    pub fn compute(
        display: &DisplayInfo,
        video_width: u32,
        video_height: u32,
        rotate: bool,
    ) -> Result<Self, ProjectionError> {
        if display.width == 0 || display.height == 0 {
            return Err(ProjectionError::EmptyDisplay {
                width: display.width,
                height: display.height,
            });
        }

        let (source_w, source_h) = display.native_video_size();
        let framebuffer_width = if video_width == 0 { source_w } else { video_width };
        let framebuffer_height = if video_height == 0 { source_h } else { video_height };

        let (video_w, video_h) = if rotate {
            (framebuffer_height, framebuffer_width)
        } else {
            (framebuffer_width, framebuffer_height)
        };

        // Integer form of `video_w * (source_h / source_w)`.
        let (vw, vh, sw, sh) = (
            u64::from(video_w),
            u64::from(video_h),
            u64::from(source_w),
            u64::from(source_h),
        );
        let fitted_h = vw * sh / sw;
        let (out_w, out_h) = if vh > fitted_h {
            (vw, fitted_h)
        } else {
            (vh * sw / sh, vh)
        };
        let (out_w, out_h) = (out_w as u32, out_h as u32);

        let off_x = (video_w - out_w) / 2;
        let off_y = (video_h - out_h) / 2;

        Ok(Self {
            orientation: if rotate {
                Orientation::Deg90
            } else {
                Orientation::Deg0
            },
            layer_stack: Rect::from_size(source_w, source_h),
            display_rect: Rect {
                left: off_x,
                top: off_y,
                right: off_x + out_w,
                bottom: off_y + out_h,
            },
            framebuffer_width,
            framebuffer_height,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
