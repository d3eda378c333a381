//! InputInjectionClient and InputDeviceRegistry.
//!
//! The input service lives in another process and is reached through a
//! service manager.  It can die and come back at any time, so the client
//! keeps the connection behind a mutex together with a *generation* number:
//!
//! - every successful [`InputInjectionClient::connect`] bumps the generation;
//! - the death recipient registered for that connection remembers the
//!   generation it was created for and only clears a matching connection.
//!
//! A death notice for an old connection therefore never tears down a newer
//! one.  After a death, `is_connected()` is `false` and the next failed
//! injection triggers [`InputInjectionClient::reconnect_in_background`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use thiserror::Error;
use tracing::{debug, info, warn};
use vnc_core::{DeviceId, InjectMode, InputDeviceInfo, InputEvent, InputSource, MAX_INPUT_DEVICE_COUNT};

/// Errors returned by the input service transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The remote service process has died.
    #[error("input service is dead")]
    DeadObject,

    /// Any other transport failure.
    #[error("input service transport error: {0}")]
    Transport(String),
}

/// Calls consumed from the platform input service.
#[cfg_attr(test, mockall::automock)]
pub trait InputManagerService: Send + Sync {
    /// Returns the ids of every input device currently registered.
    fn get_input_device_ids(&self) -> Result<Vec<DeviceId>, ServiceError>;

    /// Describes one device; `None` if the id is no longer valid.
    fn get_input_device(&self, id: DeviceId) -> Result<Option<InputDeviceInfo>, ServiceError>;

    /// Injects an event.  `Ok(false)` means the service rejected it.
    fn inject_input_event(&self, event: &InputEvent, mode: InjectMode) -> Result<bool, ServiceError>;
}

/// Callback fired when a linked service dies.  May run on any thread.
pub type DeathRecipient = Box<dyn Fn() + Send + Sync>;

/// Looks services up by name and delivers death notifications.
pub trait ServiceManager: Send + Sync {
    fn get_service(&self, name: &str) -> Option<Arc<dyn InputManagerService>>;

    /// Registers `recipient` to be called once when `service` dies.
    fn link_to_death(&self, service: &str, recipient: DeathRecipient) -> Result<(), ServiceError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── InputInjectionClient ──────────────────────────────────────────────────────

#[derive(Default)]
struct Connection {
    service: Option<Arc<dyn InputManagerService>>,
    generation: u64,
}

struct Shared {
    manager: Arc<dyn ServiceManager>,
    service_name: String,
    inject_mode: InjectMode,
    connection: Mutex<Connection>,
    /// Serializes lookup and death linking across concurrent `connect` calls.
    connecting: Mutex<()>,
    reconnecting: AtomicBool,
}

impl Shared {
    /// Drops the connection if it is still the one created for `generation`.
    fn on_service_died(&self, generation: u64) {
        let mut conn = lock(&self.connection);
        if conn.generation == generation && conn.service.take().is_some() {
            warn!(service = %self.service_name, generation, "input service died");
        } else {
            debug!(generation, current = conn.generation, "ignoring stale death notice");
        }
    }
}

/// Cloneable handle to the input service connection.
#[derive(Clone)]
pub struct InputInjectionClient {
    shared: Arc<Shared>,
}

impl InputInjectionClient {
    /// Creates a disconnected client.  Call [`connect`](Self::connect) before use.
    pub fn new(manager: Arc<dyn ServiceManager>, service_name: impl Into<String>, inject_mode: InjectMode) -> Self {
        Self {
            shared: Arc::new(Shared {
                manager,
                service_name: service_name.into(),
                inject_mode,
                connection: Mutex::new(Connection::default()),
                connecting: Mutex::new(()),
                reconnecting: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.connection).service.is_some()
    }

    /// Current service handle and its connection generation.
    pub fn service(&self) -> Option<(Arc<dyn InputManagerService>, u64)> {
        let conn = lock(&self.shared.connection);
        conn.service.as_ref().map(|s| (Arc::clone(s), conn.generation))
    }

    /// Connects to the input service.  Returns `true` if connected afterwards.
    ///
    /// Safe to call when already connected, or from several threads at once;
    /// only one caller looks the service up and links to its death.
    pub fn connect(&self) -> bool {
        if self.is_connected() {
            return true;
        }

        let shared = &self.shared;
        let _connecting = lock(&shared.connecting);
        if self.is_connected() {
            return true;
        }
        let Some(service) = shared.manager.get_service(&shared.service_name) else {
            warn!(service = %shared.service_name, "input service not found");
            return false;
        };

        let generation = {
            let mut conn = lock(&shared.connection);
            conn.generation += 1;
            conn.generation
        };

        let weak: Weak<Shared> = Arc::downgrade(shared);
        let recipient: DeathRecipient = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_service_died(generation);
            }
        });
        if let Err(e) = shared.manager.link_to_death(&shared.service_name, recipient) {
            warn!(service = %shared.service_name, "could not link to service death: {e}");
            return false;
        }

        let mut conn = lock(&shared.connection);
        if conn.generation == generation {
            conn.service = Some(service);
            info!(service = %shared.service_name, generation, "connected to input service");
        }
        conn.service.is_some()
    }

    /// Submits one event.  Returns `false` when disconnected or on failure.
    ///
    /// The RPC runs outside the connection lock, so a death notice arriving
    /// mid-call is never blocked behind it.
    pub fn inject(&self, event: &InputEvent) -> bool {
        let Some((service, generation)) = self.service() else {
            debug!("input service not connected; dropping event");
            return false;
        };

        match service.inject_input_event(event, self.shared.inject_mode) {
            Ok(true) => true,
            Ok(false) => {
                debug!(device = %event.device_id(), "input service rejected event");
                false
            }
            Err(ServiceError::DeadObject) => {
                self.shared.on_service_died(generation);
                false
            }
            Err(e) => {
                warn!("event injection failed: {e}");
                false
            }
        }
    }

    /// Starts a reconnect attempt on a background thread and returns at once.
    ///
    /// At most one attempt runs at a time; extra calls while one is in
    /// flight are ignored.
    pub fn reconnect_in_background(&self) {
        if self.shared.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }

        let client = self.clone();
        let spawned = thread::Builder::new()
            .name("input-reconnect".to_string())
            .spawn(move || {
                let connected = client.connect();
                client.shared.reconnecting.store(false, Ordering::Release);
                if connected {
                    info!("input service reconnected");
                } else {
                    debug!("input service reconnect failed; will retry on next event");
                }
            });

        if let Err(e) = spawned {
            self.shared.reconnecting.store(false, Ordering::Release);
            warn!("failed to spawn reconnect thread: {e}");
        }
    }

    /// `true` while a background reconnect is running.
    pub fn is_reconnecting(&self) -> bool {
        self.shared.reconnecting.load(Ordering::Acquire)
    }
}

// ── InputDeviceRegistry ───────────────────────────────────────────────────────

/// Device ids used for touchscreen and keyboard events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceCapabilitySet {
    pub touchscreen: DeviceId,
    pub keyboard: DeviceId,
}

/// Resolves which device id to stamp on injected events.
///
/// Results are cached per connection generation, so a reconnect triggers a
/// fresh scan.
pub struct InputDeviceRegistry {
    client: InputInjectionClient,
    cache: Mutex<Option<(u64, DeviceCapabilitySet)>>,
}

impl InputDeviceRegistry {
    pub fn new(client: InputInjectionClient) -> Self {
        Self {
            client,
            cache: Mutex::new(None),
        }
    }

    /// Returns the first device whose sources include every bit of `source`.
    ///
    /// Falls back to [`DeviceId::DEFAULT`] when disconnected, when the scan
    /// fails, or when no device matches.
    pub fn resolve_device_id(&self, source: InputSource) -> DeviceId {
        match self.client.service() {
            Some((service, _)) => scan(service.as_ref(), source),
            None => DeviceId::DEFAULT,
        }
    }

    /// Touchscreen and keyboard ids for the current connection.
    pub fn capabilities(&self) -> DeviceCapabilitySet {
        let Some((service, generation)) = self.client.service() else {
            return DeviceCapabilitySet::default();
        };

        if let Some((cached_generation, caps)) = *lock(&self.cache) {
            if cached_generation == generation {
                return caps;
            }
        }

        let caps = DeviceCapabilitySet {
            touchscreen: scan(service.as_ref(), InputSource::TOUCHSCREEN),
            keyboard: scan(service.as_ref(), InputSource::KEYBOARD),
        };
        info!(
            touchscreen = %caps.touchscreen,
            keyboard = %caps.keyboard,
            generation,
            "resolved input devices"
        );
        *lock(&self.cache) = Some((generation, caps));
        caps
    }
}

fn scan(service: &dyn InputManagerService, source: InputSource) -> DeviceId {
    let ids = match service.get_input_device_ids() {
        Ok(ids) => ids,
        Err(e) => {
            warn!("listing input devices failed: {e}");
            return DeviceId::DEFAULT;
        }
    };

    for id in ids.into_iter().take(MAX_INPUT_DEVICE_COUNT) {
        match service.get_input_device(id) {
            Ok(Some(info)) if info.supports_source(source) => {
                debug!(device = %id, name = %info.name, source = source.0, "matched input device");
                return id;
            }
            Ok(_) => {}
            Err(e) => debug!(device = %id, "querying input device failed: {e}"),
        }
    }

    debug!(source = source.0, "no input device supports source; using default");
    DeviceId::DEFAULT
}

// ── Tests ─────────────────────────────────────────────────────────────────────
