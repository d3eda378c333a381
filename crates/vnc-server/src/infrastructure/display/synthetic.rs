//! Synthetic display: a frame producer thread and a test-pattern renderer.
//!
//! `SyntheticDisplay` plays the compositor.  Its producer thread calls
//! [`FrameNotifier::on_frame_available`] at a fixed rate, exactly like a
//! buffer-queue callback would.  `TestPatternRenderer` plays the GPU: each
//! latch advances the pattern and each render draws colour bars that scroll
//! sideways, letterboxed into the projected rectangle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info};
use vnc_core::domain::projection::Rect;
use vnc_core::{DisplayInfo, DisplayProjection, Orientation};

use super::{DisplayProjector, ProjectorError};
use crate::application::frame_capture::{FrameNotifier, FrameRenderer, RenderError, BYTES_PER_PIXEL};

// ── Producer ──────────────────────────────────────────────────────────────────

/// A fake primary display with a fixed geometry and refresh rate.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticDisplay {
    info: DisplayInfo,
    fps: u32,
}

impl SyntheticDisplay {
    pub fn new(width: u32, height: u32, orientation: Orientation, fps: u32) -> Self {
        Self {
            info: DisplayInfo {
                width,
                height,
                orientation,
            },
            fps: fps.max(1),
        }
    }

    pub fn info(&self) -> DisplayInfo {
        self.info
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps
    }

    /// Spawns the producer thread.  It signals one frame per interval until
    /// `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn start(&self, notifier: FrameNotifier, running: Arc<AtomicBool>) -> io::Result<JoinHandle<u64>> {
        let interval = self.frame_interval();
        info!(fps = self.fps, "synthetic display started");
        thread::Builder::new()
            .name("synthetic-display".to_string())
            .spawn(move || {
                let mut next = Instant::now();
                let mut frames = 0u64;
                while running.load(Ordering::SeqCst) {
                    next += interval;
                    notifier.on_frame_available();
                    frames += 1;
                    if let Some(wait) = next.checked_duration_since(Instant::now()) {
                        thread::sleep(wait);
                    } else {
                        next = Instant::now();
                    }
                }
                debug!(frames, "synthetic display stopped");
                frames
            })
    }
}

// ── Renderer ──────────────────────────────────────────────────────────────────

/// Eight colour bars, RGBA.
const BARS: [[u8; 4]; 8] = [
    [0xC0, 0xC0, 0xC0, 0xFF],
    [0xC0, 0xC0, 0x00, 0xFF],
    [0x00, 0xC0, 0xC0, 0xFF],
    [0x00, 0xC0, 0x00, 0xFF],
    [0xC0, 0x00, 0xC0, 0xFF],
    [0xC0, 0x00, 0x00, 0xFF],
    [0x00, 0x00, 0xC0, 0xFF],
    [0x10, 0x10, 0x10, 0xFF],
];

/// Pixels the pattern scrolls per latched frame.
const SCROLL_STEP: u32 = 4;

/// Draws a moving test pattern where the projected display would appear.
pub struct TestPatternRenderer {
    target: Rect,
    frame: u64,
}

impl TestPatternRenderer {
    pub fn new(projection: &DisplayProjection) -> Self {
        Self {
            target: framebuffer_rect(projection),
            frame: 0,
        }
    }

    /// Number of buffers latched so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let t = &self.target;
        if x < t.left || x >= t.right || y < t.top || y >= t.bottom {
            return [0, 0, 0, 0xFF];
        }
        let w = u64::from(t.width().max(1));
        let offset = self.frame * u64::from(SCROLL_STEP);
        let bar = ((u64::from(x - t.left) + offset) % w) * BARS.len() as u64 / w;
        let mut rgba = BARS[bar as usize];
        // Darken towards the bottom so orientation is visible.
        let shade = (u64::from(y - t.top) * 96 / u64::from(t.height().max(1))) as u8;
        for c in &mut rgba[..3] {
            *c = c.saturating_sub(shade);
        }
        rgba
    }
}

impl FrameRenderer for TestPatternRenderer {
    fn latch_buffer(&mut self) -> Result<(), RenderError> {
        self.frame += 1;
        Ok(())
    }

    fn render_into(&mut self, dst: &mut [u8], width: u16, height: u16) -> Result<(), RenderError> {
        let expected = usize::from(width) * usize::from(height) * BYTES_PER_PIXEL;
        if dst.len() != expected {
            return Err(RenderError::Readback(format!(
                "buffer holds {} bytes, {width}x{height} needs {expected}",
                dst.len()
            )));
        }
        for (i, px) in dst.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = (i % usize::from(width)) as u32;
            let y = (i / usize::from(width)) as u32;
            px.copy_from_slice(&self.pixel(x, y));
        }
        Ok(())
    }
}

/// Destination rectangle in framebuffer coordinates.
///
/// A 90 degree projection lays out the display rect in rotated video space,
/// so it is mapped back before drawing.
fn framebuffer_rect(projection: &DisplayProjection) -> Rect {
    let r = projection.display_rect;
    match projection.orientation {
        Orientation::Deg90 => {
            let fb_h = projection.framebuffer_height;
            Rect {
                left: r.top,
                top: fb_h.saturating_sub(r.right),
                right: r.bottom,
                bottom: fb_h.saturating_sub(r.left),
            }
        }
        _ => r,
    }
}

// ── Projector ─────────────────────────────────────────────────────────────────

/// Projector that records the active projection and logs it.
#[derive(Default)]
pub struct LoggingProjector {
    active: Mutex<Option<(String, DisplayProjection)>>,
}

impl LoggingProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The projection currently in place, if any.
    pub fn active(&self) -> Option<DisplayProjection> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, p)| *p)
    }
}

impl DisplayProjector for LoggingProjector {
    fn create_virtual_display(&self, name: &str, projection: &DisplayProjection) -> Result<(), ProjectorError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((existing, _)) = active.as_ref() {
            return Err(ProjectorError::AlreadyCreated(existing.clone()));
        }
        let r = projection.display_rect;
        info!(
            name,
            orientation = projection.orientation.degrees(),
            framebuffer = %format_args!("{}x{}", projection.framebuffer_width, projection.framebuffer_height),
            rect = %format_args!("{},{} {}x{}", r.left, r.top, r.width(), r.height()),
            "virtual display created"
        );
        *active = Some((name.to_string(), *projection));
        Ok(())
    }

    fn destroy_virtual_display(&self) {
        if let Some((name, _)) = self.active.lock().unwrap_or_else(PoisonError::into_inner).take() {
            info!(name, "virtual display destroyed");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
