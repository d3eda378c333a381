//! Integration tests for the capture side: producer thread, renderer,
//! pipeline and publish loop wired the way `main.rs` wires them.
//!
//! The synthetic display signals frames from its own thread; the publish
//! loop runs on another.  The tests check that frames flow end to end and
//! that both threads stop when the shared flag is cleared.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vnc_core::{DisplayProjection, InjectMode, Orientation};
use vnc_server::application::frame_capture::{frame_channel, FrameCapturePipeline, FrameNotifier, SharedFramebuffer};
use vnc_server::application::inject_input::InputInjectionClient;
use vnc_server::application::publish_loop::PublishLoop;
use vnc_server::application::remote_display::RemoteDisplayServer;
use vnc_server::infrastructure::display::{SyntheticDisplay, TestPatternRenderer};
use vnc_server::infrastructure::input_service::InMemoryServiceManager;

struct Rig {
    framebuffer: Arc<SharedFramebuffer>,
    display: Arc<RemoteDisplayServer>,
    pipeline: FrameCapturePipeline,
    source: SyntheticDisplay,
    notifier: FrameNotifier,
}

fn rig(width: u32, height: u32, rotate: bool) -> Rig {
    let source = SyntheticDisplay::new(64, 48, Orientation::Deg0, 120);
    let projection = DisplayProjection::compute(&source.info(), width, height, rotate).expect("projection");
    let framebuffer = SharedFramebuffer::new(projection.framebuffer_width as u16, projection.framebuffer_height as u16);
    let injector = InputInjectionClient::new(Arc::new(InMemoryServiceManager::new()), "input", InjectMode::Async);
    let display = Arc::new(RemoteDisplayServer::new("capture", Arc::clone(&framebuffer), injector));
    let (notifier, receiver) = frame_channel();
    let pipeline = FrameCapturePipeline::new(
        receiver,
        Box::new(TestPatternRenderer::new(&projection)),
        Arc::clone(&framebuffer),
    );
    Rig {
        framebuffer,
        display,
        pipeline,
        source,
        notifier,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[test]
fn test_frames_flow_from_producer_to_framebuffer() {
    // Arrange
    let Rig {
        framebuffer,
        display,
        pipeline,
        source,
        notifier,
    } = rig(0, 0, false);
    let running = Arc::new(AtomicBool::new(true));
    let producer = source.start(notifier, Arc::clone(&running)).expect("producer");
    let mut publish = PublishLoop::new(pipeline, display, Duration::from_millis(50));
    let loop_running = Arc::clone(&running);
    let consumer = thread::spawn(move || publish.run(&loop_running));

    // Act: wait for a few published frames, then stop both threads.
    let deadline = Instant::now() + Duration::from_secs(5);
    while framebuffer.generation() < 3 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    running.store(false, Ordering::SeqCst);
    let stats = consumer.join().expect("publish thread").expect("no capture error");
    let signalled = producer.join().expect("producer thread");

    // Assert
    assert!(framebuffer.generation() >= 3);
    assert!(stats.frames_published >= 3);
    assert!(signalled >= stats.frames_published, "coalescing never invents frames");
    assert!(framebuffer.read().iter().any(|&b| b != 0), "pattern was drawn");
}

#[test]
fn test_rotated_projection_publishes_single_signal() {
    // Arrange: 64x48 landscape source, portrait framebuffer, rotated.
    let Rig {
        framebuffer,
        display,
        pipeline,
        notifier,
        ..
    } = rig(48, 64, true);
    let running = AtomicBool::new(true);
    let mut publish = PublishLoop::new(pipeline, display, Duration::from_millis(20));

    // Act: a single signal, then the loop times out until stopped.
    notifier.on_frame_available();
    let stats = thread::scope(|s| {
        let handle = s.spawn(|| publish.run(&running));
        let deadline = Instant::now() + Duration::from_secs(5);
        while framebuffer.generation() < 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        running.store(false, Ordering::SeqCst);
        handle.join().expect("publish thread")
    })
    .expect("no capture error");

    // Assert
    assert_eq!((framebuffer.width(), framebuffer.height()), (48, 64));
    assert_eq!(stats.frames_published, 1);
    assert_eq!(framebuffer.generation(), 1);
}
