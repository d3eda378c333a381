//! End-to-end tests for the RFB front-end over a real loopback socket.
//!
//! Each test binds `127.0.0.1:0`, runs the accept loop in a Tokio task and
//! drives it with a hand-written viewer.  They verify:
//!
//! - A viewer can complete the 3.8 handshake and read the `ServerInit`.
//! - Pointer and key events travel through `RemoteDisplayServer` into the
//!   in-memory input service, with the device IDs the registry resolved.
//! - An incremental update request is answered once a frame is published.
//!
//! ```text
//! test viewer ──TCP──▶ serve() ──▶ run_session ──▶ RemoteDisplayServer ──▶ InMemoryInputManager
//!      ▲                                                  │
//!      └──────────── FramebufferUpdate ◀── mark_modified ─┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use vnc_core::input::events::MotionAction;
use vnc_core::protocol::{
    decode_server_init, encode_client_message, security, ClientMessage, Rectangle, ServerInit,
    RAW_UPDATE_HEADER_LEN, SERVER_PROTOCOL_VERSION,
};
use vnc_core::{DeviceId, InjectMode, InputEvent};
use vnc_server::application::frame_capture::SharedFramebuffer;
use vnc_server::application::inject_input::InputInjectionClient;
use vnc_server::application::remote_display::RemoteDisplayServer;
use vnc_server::infrastructure::input_service::{InMemoryInputManager, InMemoryServiceManager};
use vnc_server::infrastructure::rfb::{bind_listener, serve};

const WIDTH: u16 = 8;
const HEIGHT: u16 = 4;
const IO_TIMEOUT: Duration = Duration::from_secs(5);

// ── Harness ───────────────────────────────────────────────────────────────────

struct Server {
    input: Arc<InMemoryInputManager>,
    display: Arc<RemoteDisplayServer>,
    running: Arc<AtomicBool>,
    task: JoinHandle<anyhow::Result<()>>,
    viewer: TcpStream,
}

impl Server {
    async fn start() -> Self {
        let input = Arc::new(InMemoryInputManager::with_default_devices());
        let manager = Arc::new(InMemoryServiceManager::new());
        manager.register("input", Arc::clone(&input));
        let injector = InputInjectionClient::new(manager, "input", InjectMode::Async);
        let display = Arc::new(RemoteDisplayServer::new(
            "integration",
            SharedFramebuffer::new(WIDTH, HEIGHT),
            injector,
        ));

        let listener = bind_listener("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(serve(listener, Arc::clone(&display), Arc::clone(&running)));
        let viewer = TcpStream::connect(addr).await.expect("connect");

        Self {
            input,
            display,
            running,
            task,
            viewer,
        }
    }

    async fn read_n(&mut self, n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        timeout(IO_TIMEOUT, self.viewer.read_exact(&mut buf))
            .await
            .expect("read timed out")
            .expect("read");
        buf
    }

    async fn send(&mut self, msg: ClientMessage) {
        self.viewer
            .write_all(&encode_client_message(&msg))
            .await
            .expect("write");
    }

    async fn handshake(&mut self) -> ServerInit {
        assert_eq!(self.read_n(12).await, SERVER_PROTOCOL_VERSION.to_vec());
        self.viewer.write_all(b"RFB 003.008\n").await.unwrap();
        assert_eq!(self.read_n(2).await, vec![1, security::NONE]);
        self.viewer.write_all(&[security::NONE]).await.unwrap();
        assert_eq!(self.read_n(4).await, vec![0, 0, 0, 0]);
        self.viewer.write_all(&[1]).await.unwrap();
        let mut init = self.read_n(24).await;
        let name_len = u32::from_be_bytes([init[20], init[21], init[22], init[23]]) as usize;
        init.extend(self.read_n(name_len).await);
        decode_server_init(&init).expect("server init").0
    }

    async fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let stopped = timeout(IO_TIMEOUT, self.task).await.expect("accept loop stops");
        assert!(stopped.expect("join").is_ok());
    }
}

/// Polls `cond` until it holds or the timeout expires.
async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_viewer_handshake_over_tcp() {
    // Arrange
    let mut server = Server::start().await;

    // Act
    let init = server.handshake().await;

    // Assert
    assert_eq!((init.width, init.height), (WIDTH, HEIGHT));
    assert_eq!(init.name, "integration");
    assert!(eventually(|| server.display.session_count() == 1).await);
    server.stop().await;
}

#[tokio::test]
async fn test_tap_and_key_reach_input_service() {
    // Arrange
    let mut server = Server::start().await;
    server.handshake().await;

    // Act: tap at (3, 2), then press and release Return.
    server
        .send(ClientMessage::PointerEvent { button_mask: 1, x: 3, y: 2 })
        .await;
    server
        .send(ClientMessage::PointerEvent { button_mask: 0, x: 3, y: 2 })
        .await;
    server
        .send(ClientMessage::KeyEvent { down: true, keysym: 0xFF0D })
        .await;
    server
        .send(ClientMessage::KeyEvent { down: false, keysym: 0xFF0D })
        .await;
    let input = Arc::clone(&server.input);
    let delivered = eventually(|| input.injected_events().len() == 4).await;

    // Assert
    assert!(delivered, "all four events injected");
    let events = input.injected_events();
    match (&events[0], &events[1]) {
        (InputEvent::Motion(down), InputEvent::Motion(up)) => {
            assert_eq!(down.action, MotionAction::Down);
            assert_eq!(up.action, MotionAction::Up);
            assert_eq!((down.x, down.y), (3.0, 2.0));
            assert_eq!(down.device_id, DeviceId(2), "touchscreen device");
            assert!(up.event_time_ns >= down.event_time_ns);
        }
        other => panic!("expected two motion events, got {other:?}"),
    }
    assert!(matches!(&events[2], InputEvent::Key(k) if k.device_id == DeviceId(1)));
    assert_eq!(server.display.stats().injected, 4);
    server.stop().await;
}

#[tokio::test]
async fn test_incremental_update_follows_publish() {
    // Arrange
    let mut server = Server::start().await;
    server.handshake().await;
    server
        .send(ClientMessage::FramebufferUpdateRequest {
            incremental: true,
            region: Rectangle::full(WIDTH, HEIGHT),
        })
        .await;

    // Act
    tokio::time::sleep(Duration::from_millis(50)).await;
    server.display.mark_modified();
    let update = server
        .read_n(RAW_UPDATE_HEADER_LEN + usize::from(WIDTH) * usize::from(HEIGHT) * 4)
        .await;

    // Assert
    assert_eq!(update[0], 0, "FramebufferUpdate");
    assert_eq!(u16::from_be_bytes([update[2], update[3]]), 1);
    assert_eq!(u16::from_be_bytes([update[8], update[9]]), WIDTH);
    assert_eq!(u16::from_be_bytes([update[10], update[11]]), HEIGHT);
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_removes_session() {
    let mut server = Server::start().await;
    server.handshake().await;
    assert!(eventually(|| server.display.session_count() == 1).await);

    server.viewer.shutdown().await.expect("shutdown");

    assert!(eventually(|| server.display.session_count() == 0).await);
    server.stop().await;
}
