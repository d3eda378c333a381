//! The publish loop: request a frame, publish it, repeat until stopped.
//!
//! Runs on its own blocking thread.  The stop flag is checked once per
//! iteration, so shutdown takes at most one frame timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use super::frame_capture::{CaptureError, FrameCapturePipeline, FrameStatus};
use super::remote_display::RemoteDisplayServer;

/// Totals reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub frames_published: u64,
    pub timeouts: u64,
}

pub struct PublishLoop {
    pipeline: FrameCapturePipeline,
    display: Arc<RemoteDisplayServer>,
    frame_timeout: Duration,
}

impl PublishLoop {
    pub fn new(pipeline: FrameCapturePipeline, display: Arc<RemoteDisplayServer>, frame_timeout: Duration) -> Self {
        Self {
            pipeline,
            display,
            frame_timeout,
        }
    }

    /// Runs until `running` is cleared or capture fails.
    ///
    /// # Errors
    ///
    /// Returns the first [`CaptureError`]; conversion failures are not retried.
    pub fn run(&mut self, running: &AtomicBool) -> Result<PublishStats, CaptureError> {
        let mut stats = PublishStats::default();
        info!(timeout = ?self.frame_timeout, "publish loop started");

        while running.load(Ordering::SeqCst) {
            match self.pipeline.request_frame(self.frame_timeout) {
                Ok(FrameStatus::Ready(ticket)) => {
                    self.display.mark_modified();
                    stats.frames_published += 1;
                    debug!(sequence = ticket.sequence, "frame published");
                }
                Ok(FrameStatus::TimedOut) => stats.timeouts += 1,
                Err(e) => {
                    error!("frame capture failed: {e}");
                    return Err(e);
                }
            }
        }

        info!(
            frames = stats.frames_published,
            timeouts = stats.timeouts,
            coalesced = self.pipeline.coalesced_frames(),
            "publish loop stopped"
        );
        Ok(stats)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::frame_capture::{frame_channel, FrameRenderer, RenderError, SharedFramebuffer};
    use crate::application::inject_input::InputInjectionClient;
    use crate::infrastructure::input_service::InMemoryServiceManager;
    use std::sync::Mutex;
    use vnc_core::InjectMode;

    /// Fills frames with one byte; fails after `fail_after` renders if set.
    struct CountingRenderer {
        rendered: Arc<Mutex<u32>>,
        fail_after: Option<u32>,
        running: Option<Arc<AtomicBool>>,
    }

    impl FrameRenderer for CountingRenderer {
        fn latch_buffer(&mut self) -> Result<(), RenderError> {
            Ok(())
        }

        fn render_into(&mut self, dst: &mut [u8], _w: u16, _h: u16) -> Result<(), RenderError> {
            let mut n = self.rendered.lock().unwrap();
            if self.fail_after == Some(*n) {
                return Err(RenderError::Readback("lost context".to_string()));
            }
            *n += 1;
            dst.fill(0xAB);
            if let Some(running) = &self.running {
                running.store(false, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn display(fb: Arc<SharedFramebuffer>) -> Arc<RemoteDisplayServer> {
        let injector = InputInjectionClient::new(Arc::new(InMemoryServiceManager::new()), "input", InjectMode::Async);
        Arc::new(RemoteDisplayServer::new("test", fb, injector))
    }

    #[test]
    fn test_stopped_flag_exits_without_requesting() {
        // Arrange
        let (_notifier, receiver) = frame_channel();
        let fb = SharedFramebuffer::new(2, 2);
        let rendered = Arc::new(Mutex::new(0));
        let renderer = CountingRenderer {
            rendered: Arc::clone(&rendered),
            fail_after: None,
            running: None,
        };
        let pipeline = FrameCapturePipeline::new(receiver, Box::new(renderer), Arc::clone(&fb));
        let mut publish = PublishLoop::new(pipeline, display(fb), Duration::from_millis(10));

        // Act
        let stats = publish.run(&AtomicBool::new(false)).expect("clean exit");

        // Assert
        assert_eq!(stats, PublishStats::default());
        assert_eq!(*rendered.lock().unwrap(), 0);
    }

    #[test]
    fn test_ready_frame_marks_display_modified() {
        // Arrange: the renderer clears the flag after the first frame.
        let (notifier, receiver) = frame_channel();
        let fb = SharedFramebuffer::new(2, 2);
        let running = Arc::new(AtomicBool::new(true));
        let renderer = CountingRenderer {
            rendered: Arc::new(Mutex::new(0)),
            fail_after: None,
            running: Some(Arc::clone(&running)),
        };
        let pipeline = FrameCapturePipeline::new(receiver, Box::new(renderer), Arc::clone(&fb));
        let mut publish = PublishLoop::new(pipeline, display(Arc::clone(&fb)), Duration::from_millis(10));
        notifier.on_frame_available();

        // Act
        let stats = publish.run(&running).expect("clean exit");

        // Assert
        assert_eq!(stats.frames_published, 1);
        assert_eq!(fb.generation(), 1);
        assert!(fb.read().iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_render_failure_ends_loop_with_error() {
        let (notifier, receiver) = frame_channel();
        let fb = SharedFramebuffer::new(2, 2);
        let renderer = CountingRenderer {
            rendered: Arc::new(Mutex::new(0)),
            fail_after: Some(0),
            running: None,
        };
        let pipeline = FrameCapturePipeline::new(receiver, Box::new(renderer), Arc::clone(&fb));
        let mut publish = PublishLoop::new(pipeline, display(Arc::clone(&fb)), Duration::from_millis(10));
        notifier.on_frame_available();

        let result = publish.run(&AtomicBool::new(true));

        assert!(matches!(result, Err(CaptureError::Render(RenderError::Readback(_)))));
        assert_eq!(fb.generation(), 0);
    }
}
