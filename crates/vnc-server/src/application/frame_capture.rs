//! FrameCapturePipeline: turns compositor frame notifications into pixels.
//!
//! The compositor produces frames on its own schedule and tells us about
//! them from an arbitrary thread.  The publish loop consumes them on another
//! thread.  The two are connected by a **single-slot coalescing channel**:
//!
//! ```text
//! compositor thread                      publish loop thread
//! ─────────────────                      ───────────────────
//! on_frame_available() ──▶ [ slot ] ──▶ request_frame(timeout)
//! on_frame_available() ──▶ [ slot ]        ├─ latch newest buffer
//!   (overwrites, never blocks)             ├─ render + read back RGBA
//!                                          └─ swap into SharedFramebuffer
//! ```
//!
//! If several frames arrive between two `request_frame` calls, only the
//! newest is converted.  All GPU work happens on the consumer side; the
//! producer callback only takes a mutex for a few instructions.
//!
//! # Error policy
//!
//! - A fence timeout while latching a buffer is logged and the frame is
//!   still converted.
//! - Any blit or readback failure is fatal and ends the publish loop.
//! - A wake-up with nothing in the slot is reported as `TimedOut`.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{trace, warn};

/// Bytes per pixel of the RGBA8888 capture buffer.
pub const BYTES_PER_PIXEL: usize = 4;

/// Errors reported by a [`FrameRenderer`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    /// The producer's release fence did not signal in time.
    #[error("buffer fence not signalled after {0:?}")]
    FenceTimeout(Duration),

    /// Drawing the latched texture into the readback surface failed.
    #[error("blit failed: {0}")]
    Blit(String),

    /// Reading pixels back to CPU memory failed.
    #[error("pixel readback failed: {0}")]
    Readback(String),
}

/// Fatal errors from [`FrameCapturePipeline::request_frame`].
#[derive(Debug, Error, PartialEq)]
pub enum CaptureError {
    #[error("frame conversion failed: {0}")]
    Render(#[source] RenderError),
}

/// GPU-side capability: latch the newest buffer and read it back.
///
/// Implementations own whatever graphics context they need; the pipeline
/// only calls them from the publish loop thread.
pub trait FrameRenderer: Send {
    /// Makes the newest queued buffer the current texture.
    fn latch_buffer(&mut self) -> Result<(), RenderError>;

    /// Renders the current texture and reads it back into `dst` as
    /// RGBA8888, `width × height × 4` bytes, top row first.
    fn render_into(&mut self, dst: &mut [u8], width: u16, height: u16) -> Result<(), RenderError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Coalescing slot ───────────────────────────────────────────────────────────

/// Identifies one signalled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTicket {
    /// Monotonically increasing per signal, including coalesced ones.
    pub sequence: u64,
    pub signalled_at: Instant,
}

#[derive(Default)]
struct SlotState {
    pending: Option<FrameTicket>,
    next_sequence: u64,
    coalesced: u64,
}

#[derive(Default)]
struct FrameSlot {
    state: Mutex<SlotState>,
    available: Condvar,
}

/// Creates a connected notifier/receiver pair.
pub fn frame_channel() -> (FrameNotifier, FrameReceiver) {
    let slot = Arc::new(FrameSlot::default());
    (
        FrameNotifier {
            slot: Arc::clone(&slot),
        },
        FrameReceiver { slot },
    )
}

/// Producer handle given to the compositor callback.
#[derive(Clone)]
pub struct FrameNotifier {
    slot: Arc<FrameSlot>,
}

impl FrameNotifier {
    /// Signals that a new frame is queued.  Callable from any thread.
    ///
    /// Overwrites any frame still pending; never blocks on GPU work.
    pub fn on_frame_available(&self) {
        let mut state = lock(&self.slot.state);
        state.next_sequence += 1;
        if state.pending.is_some() {
            state.coalesced += 1;
        }
        state.pending = Some(FrameTicket {
            sequence: state.next_sequence,
            signalled_at: Instant::now(),
        });
        drop(state);
        self.slot.available.notify_one();
    }
}

/// Consumer handle owned by the pipeline.
pub struct FrameReceiver {
    slot: Arc<FrameSlot>,
}

impl FrameReceiver {
    /// Takes the pending frame, waiting at most once for up to `timeout`.
    ///
    /// Returns `None` on timeout and on a wake-up that finds the slot empty.
    pub fn wait(&self, timeout: Duration) -> Option<FrameTicket> {
        let mut state = lock(&self.slot.state);
        if state.pending.is_none() {
            let (guard, _) = self
                .slot
                .available
                .wait_timeout(state, timeout)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
        state.pending.take()
    }

    /// Number of signals that overwrote a frame nobody had consumed yet.
    pub fn coalesced_count(&self) -> u64 {
        lock(&self.slot.state).coalesced
    }
}

// ── Shared framebuffer ────────────────────────────────────────────────────────

/// The RGBA8888 pixel buffer served to every viewer.
///
/// Written only by the pipeline (by swapping in a freshly rendered buffer)
/// and read by the RFB writer tasks.  Each publish bumps a generation
/// counter that writer tasks watch for incremental updates.
pub struct SharedFramebuffer {
    width: u16,
    height: u16,
    pixels: RwLock<Vec<u8>>,
    generation: watch::Sender<u64>,
}

impl SharedFramebuffer {
    /// Creates a black framebuffer.
    pub fn new(width: u16, height: u16) -> Arc<Self> {
        let (generation, _) = watch::channel(0u64);
        Arc::new(Self {
            width,
            height,
            pixels: RwLock::new(vec![0; Self::byte_len(width, height)]),
            generation,
        })
    }

    fn byte_len(width: u16, height: u16) -> usize {
        usize::from(width) * usize::from(height) * BYTES_PER_PIXEL
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Locks the pixels for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.pixels.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exchanges the current pixels with `buf`, which must be full size.
    fn swap(&self, buf: &mut Vec<u8>) {
        let mut pixels = self.pixels.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::swap(&mut *pixels, buf);
    }

    /// Marks the whole framebuffer as modified.
    pub fn mark_modified(&self) {
        self.generation.send_modify(|g| *g = g.wrapping_add(1));
    }

    /// Number of publishes so far.
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// Returns a receiver that wakes on every publish.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// Where the pipeline is in its per-frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    WaitingForSignal,
    FrameReady,
    Converting,
}

/// Outcome of one [`FrameCapturePipeline::request_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The framebuffer now holds the frame identified by the ticket.
    Ready(FrameTicket),
    /// No frame arrived within the timeout.
    TimedOut,
}

/// Consumer side of the capture path.
pub struct FrameCapturePipeline {
    receiver: FrameReceiver,
    renderer: Box<dyn FrameRenderer>,
    framebuffer: Arc<SharedFramebuffer>,
    scratch: Vec<u8>,
    state: CaptureState,
}

impl FrameCapturePipeline {
    pub fn new(
        receiver: FrameReceiver,
        renderer: Box<dyn FrameRenderer>,
        framebuffer: Arc<SharedFramebuffer>,
    ) -> Self {
        let scratch = vec![0; SharedFramebuffer::byte_len(framebuffer.width(), framebuffer.height())];
        Self {
            receiver,
            renderer,
            framebuffer,
            scratch,
            state: CaptureState::Idle,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn framebuffer(&self) -> &Arc<SharedFramebuffer> {
        &self.framebuffer
    }

    /// Number of frames dropped because a newer one replaced them.
    pub fn coalesced_frames(&self) -> u64 {
        self.receiver.coalesced_count()
    }

    /// Waits up to `timeout` for a frame and converts it into the shared
    /// framebuffer.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Render`] if latching (other than a fence
    /// timeout), blitting, or reading back fails.  The caller should stop.
    pub fn request_frame(&mut self, timeout: Duration) -> Result<FrameStatus, CaptureError> {
        self.state = CaptureState::WaitingForSignal;
        let Some(ticket) = self.receiver.wait(timeout) else {
            self.state = CaptureState::Idle;
            trace!("no frame within {timeout:?}");
            return Ok(FrameStatus::TimedOut);
        };
        self.state = CaptureState::FrameReady;

        match self.renderer.latch_buffer() {
            Ok(()) => {}
            Err(RenderError::FenceTimeout(waited)) => {
                warn!(sequence = ticket.sequence, "buffer fence timed out after {waited:?}; converting anyway");
            }
            Err(e) => {
                self.state = CaptureState::Idle;
                return Err(CaptureError::Render(e));
            }
        }

        self.state = CaptureState::Converting;
        let result = self.renderer.render_into(
            &mut self.scratch,
            self.framebuffer.width(),
            self.framebuffer.height(),
        );
        self.state = CaptureState::Idle;
        result.map_err(CaptureError::Render)?;

        self.framebuffer.swap(&mut self.scratch);
        trace!(
            sequence = ticket.sequence,
            latency_us = ticket.signalled_at.elapsed().as_micros() as u64,
            "frame converted"
        );
        Ok(FrameStatus::Ready(ticket))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
