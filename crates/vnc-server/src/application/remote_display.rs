//! RemoteDisplayServer: bridges protocol callbacks to the translators and
//! the input service.
//!
//! The protocol front-end (see `infrastructure::rfb`) owns the sockets and
//! calls into this type:
//!
//! ```text
//! client connects     ──▶ on_client_connected()    ──▶ new Session in table
//! PointerEvent        ──▶ on_pointer_event(handle) ──▶ PointerTranslator ──▶ inject
//! KeyEvent            ──▶ on_key_event(handle)     ──▶ KeyTranslator     ──▶ inject
//! client disconnects  ──▶ on_client_disconnected() ──▶ Session removed
//! publish loop tick   ──▶ mark_modified()          ──▶ writers flush frame
//! ```
//!
//! Sessions live in a table keyed by [`ClientHandle`].  A handle is never
//! reused, so late events for a removed session are simply dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use uuid::Uuid;
use vnc_core::input::monotonic_now_ns;
use vnc_core::{
    ButtonMask, ClientHandle, InputEvent, KeyEvent, KeyTranslator, MotionEvent, Session,
};

use super::frame_capture::SharedFramebuffer;
use super::inject_input::{InputDeviceRegistry, InputInjectionClient};

/// Counters for input that did not reach the device.
#[derive(Debug, Default)]
pub struct InputStats {
    injected: AtomicU64,
    dropped: AtomicU64,
    untranslated: AtomicU64,
}

/// Point-in-time copy of [`InputStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStatsSnapshot {
    /// Events the service accepted.
    pub injected: u64,
    /// Events built but not accepted (disconnected, rejected, RPC error).
    pub dropped: u64,
    /// Viewer messages that produced no event (modifiers, hover, unknown keysyms).
    pub untranslated: u64,
}

impl InputStats {
    pub fn snapshot(&self) -> InputStatsSnapshot {
        InputStatsSnapshot {
            injected: self.injected.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            untranslated: self.untranslated.load(Ordering::Relaxed),
        }
    }
}

/// Per-display state shared by every connected viewer.
pub struct RemoteDisplayServer {
    desktop_name: String,
    framebuffer: Arc<SharedFramebuffer>,
    injector: InputInjectionClient,
    devices: InputDeviceRegistry,
    sessions: Mutex<HashMap<ClientHandle, Session>>,
    stats: InputStats,
}

impl RemoteDisplayServer {
    pub fn new(
        desktop_name: impl Into<String>,
        framebuffer: Arc<SharedFramebuffer>,
        injector: InputInjectionClient,
    ) -> Self {
        let devices = InputDeviceRegistry::new(injector.clone());
        Self {
            desktop_name: desktop_name.into(),
            framebuffer,
            injector,
            devices,
            sessions: Mutex::new(HashMap::new()),
            stats: InputStats::default(),
        }
    }

    pub fn desktop_name(&self) -> &str {
        &self.desktop_name
    }

    pub fn framebuffer(&self) -> &Arc<SharedFramebuffer> {
        &self.framebuffer
    }

    pub fn session_count(&self) -> usize {
        self.sessions().len()
    }

    pub fn stats(&self) -> InputStatsSnapshot {
        self.stats.snapshot()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<ClientHandle, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new viewer and returns its handle.
    ///
    /// Connects the input service if needed and resolves the device ids used
    /// for this viewer's events.
    pub fn on_client_connected(&self) -> ClientHandle {
        let handle = Uuid::new_v4();
        self.sessions().insert(handle, Session::new());

        if self.injector.connect() {
            let caps = self.devices.capabilities();
            info!(
                client = %handle,
                touchscreen = %caps.touchscreen,
                keyboard = %caps.keyboard,
                "client connected"
            );
        } else {
            info!(client = %handle, "client connected; input service unavailable");
        }
        handle
    }

    /// Releases the viewer's session.
    pub fn on_client_disconnected(&self, handle: ClientHandle) {
        if self.sessions().remove(&handle).is_some() {
            info!(client = %handle, "client disconnected");
        }
    }

    /// Handles a PointerEvent message.
    pub fn on_pointer_event(&self, handle: ClientHandle, button_mask: u8, x: u16, y: u16) {
        let intent = {
            let mut sessions = self.sessions();
            let Some(session) = sessions.get_mut(&handle) else {
                debug!(client = %handle, "pointer event for unknown client");
                return;
            };
            session.apply_pointer(ButtonMask(button_mask), x, y)
        };

        let Some(intent) = intent else {
            self.stats.untranslated.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let device = self.devices.capabilities().touchscreen;
        debug!(client = %handle, ?intent, x, y, "pointer");
        self.submit(InputEvent::Motion(MotionEvent::from_intent(
            intent,
            device,
            x,
            y,
            monotonic_now_ns(),
        )));
    }

    /// Handles a KeyEvent message.
    pub fn on_key_event(&self, handle: ClientHandle, down: bool, keysym: u32) {
        let intent = {
            let mut sessions = self.sessions();
            let Some(session) = sessions.get_mut(&handle) else {
                debug!(client = %handle, "key event for unknown client");
                return;
            };
            KeyTranslator::translate(down, keysym, session)
        };

        let Some(intent) = intent else {
            self.stats.untranslated.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let device = self.devices.capabilities().keyboard;
        debug!(client = %handle, key = ?intent.key_code, down, "key");
        self.submit(InputEvent::Key(KeyEvent::from_intent(
            intent,
            device,
            monotonic_now_ns(),
        )));
    }

    fn submit(&self, event: InputEvent) {
        if self.injector.inject(&event) {
            self.stats.injected.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        if !self.injector.is_connected() {
            self.injector.reconnect_in_background();
        }
    }

    /// Marks the whole framebuffer modified so every viewer gets the frame.
    pub fn mark_modified(&self) {
        self.framebuffer.mark_modified();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
