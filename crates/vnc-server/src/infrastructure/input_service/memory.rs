//! In-memory input service and service manager.
//!
//! # Why an in-memory service?
//!
//! The real input service runs in another process and injects into the
//! device's input pipeline.  For headless runs and tests we want to:
//!
//! - see exactly which events were injected, in order;
//! - simulate the service dying and coming back.
//!
//! `InMemoryInputManager` records every injected event in a
//! `Mutex<Vec<...>>`.  `InMemoryServiceManager` hands it out by name and can
//! [`kill`](InMemoryServiceManager::kill) it, which fires every registered
//! death recipient the way the platform does.
//!
//! # Usage in tests
//!
//! ```ignore
//! let input = Arc::new(InMemoryInputManager::with_default_devices());
//! let manager = Arc::new(InMemoryServiceManager::new());
//! manager.register("input", Arc::clone(&input));
//!
//! let client = InputInjectionClient::new(manager.clone(), "input", InjectMode::Async);
//! client.connect();
//! manager.kill("input");
//! assert!(!client.is_connected());
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};
use vnc_core::{DeviceId, InjectMode, InputDeviceInfo, InputEvent, InputSource};

use crate::application::inject_input::{DeathRecipient, InputManagerService, ServiceError, ServiceManager};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Records injected events instead of delivering them anywhere.
#[derive(Default)]
pub struct InMemoryInputManager {
    devices: Vec<InputDeviceInfo>,
    /// Every accepted `(event, mode)` pair, in injection order.
    pub injected: Mutex<Vec<(InputEvent, InjectMode)>>,
    /// When `true`, injection fails with a transport error.
    pub should_fail: bool,
    dead: AtomicBool,
}

impl InMemoryInputManager {
    pub fn new(devices: Vec<InputDeviceInfo>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// A keyboard (id 1) and a touchscreen (id 2), like a stock emulator image.
    pub fn with_default_devices() -> Self {
        Self::new(vec![
            InputDeviceInfo {
                id: DeviceId(1),
                name: "virtio_keyboard".to_string(),
                descriptor: "virtio-keyboard-0".to_string(),
                sources: InputSource::KEYBOARD,
                is_external: false,
            },
            InputDeviceInfo {
                id: DeviceId(2),
                name: "virtio_touchscreen".to_string(),
                descriptor: "virtio-touchscreen-0".to_string(),
                sources: InputSource::TOUCHSCREEN,
                is_external: false,
            },
        ])
    }

    /// Snapshot of the injected events without their modes.
    pub fn injected_events(&self) -> Vec<InputEvent> {
        lock(&self.injected).iter().map(|(ev, _)| ev.clone()).collect()
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    fn check_alive(&self) -> Result<(), ServiceError> {
        if self.is_dead() {
            Err(ServiceError::DeadObject)
        } else {
            Ok(())
        }
    }
}

impl InputManagerService for InMemoryInputManager {
    fn get_input_device_ids(&self) -> Result<Vec<DeviceId>, ServiceError> {
        self.check_alive()?;
        Ok(self.devices.iter().map(|d| d.id).collect())
    }

    fn get_input_device(&self, id: DeviceId) -> Result<Option<InputDeviceInfo>, ServiceError> {
        self.check_alive()?;
        Ok(self.devices.iter().find(|d| d.id == id).cloned())
    }

    fn inject_input_event(&self, event: &InputEvent, mode: InjectMode) -> Result<bool, ServiceError> {
        self.check_alive()?;
        if self.should_fail {
            return Err(ServiceError::Transport("simulated failure".to_string()));
        }
        lock(&self.injected).push((event.clone(), mode));
        Ok(true)
    }
}

/// Name-keyed registry of in-memory services with death notification.
#[derive(Default)]
pub struct InMemoryServiceManager {
    services: Mutex<HashMap<String, Arc<InMemoryInputManager>>>,
    recipients: Mutex<HashMap<String, Vec<DeathRecipient>>>,
}

impl InMemoryServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `service` under `name`, replacing any previous one.
    pub fn register(&self, name: &str, service: Arc<InMemoryInputManager>) {
        lock(&self.services).insert(name.to_string(), service);
        info!(service = name, "service registered");
    }

    /// Kills the service: marks it dead, unpublishes it, and fires its
    /// death recipients on the calling thread.
    pub fn kill(&self, name: &str) {
        if let Some(service) = lock(&self.services).remove(name) {
            service.dead.store(true, Ordering::Release);
        }
        let recipients = lock(&self.recipients).remove(name).unwrap_or_default();
        info!(service = name, recipients = recipients.len(), "service killed");
        for recipient in recipients {
            recipient();
        }
    }

    /// Number of death recipients currently linked to `name`.
    pub fn recipient_count(&self, name: &str) -> usize {
        lock(&self.recipients).get(name).map_or(0, Vec::len)
    }
}

impl ServiceManager for InMemoryServiceManager {
    fn get_service(&self, name: &str) -> Option<Arc<dyn InputManagerService>> {
        let service = lock(&self.services).get(name).cloned();
        service.map(|s| s as Arc<dyn InputManagerService>)
    }

    fn link_to_death(&self, service: &str, recipient: DeathRecipient) -> Result<(), ServiceError> {
        if !lock(&self.services).contains_key(service) {
            return Err(ServiceError::DeadObject);
        }
        debug!(service, "linked death recipient");
        lock(&self.recipients)
            .entry(service.to_string())
            .or_default()
            .push(recipient);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::inject_input::{InputDeviceRegistry, InputInjectionClient};
    use vnc_core::{AndroidKeyCode, KeyAction, KeyEvent, KeyIntent, MetaState};

    fn setup() -> (Arc<InMemoryInputManager>, Arc<InMemoryServiceManager>, InputInjectionClient) {
        let input = Arc::new(InMemoryInputManager::with_default_devices());
        let manager = Arc::new(InMemoryServiceManager::new());
        manager.register("input", Arc::clone(&input));
        let client = InputInjectionClient::new(manager.clone(), "input", InjectMode::WaitForFinish);
        (input, manager, client)
    }

    fn back_key() -> InputEvent {
        InputEvent::Key(KeyEvent::from_intent(
            KeyIntent {
                key_code: AndroidKeyCode::Back,
                action: KeyAction::Down,
                meta_state: MetaState(MetaState::NONE),
            },
            DeviceId(1),
            0,
        ))
    }

    #[test]
    fn test_injected_events_are_recorded_with_mode() {
        // Arrange
        let (input, _manager, client) = setup();
        client.connect();

        // Act
        assert!(client.inject(&back_key()));

        // Assert
        let injected = input.injected.lock().unwrap();
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].1, InjectMode::WaitForFinish);
    }

    #[test]
    fn test_kill_fires_recipients_and_unpublishes() {
        // Arrange
        let (input, manager, client) = setup();
        client.connect();
        assert_eq!(manager.recipient_count("input"), 1);

        // Act
        manager.kill("input");

        // Assert
        assert!(input.is_dead());
        assert!(!client.is_connected());
        assert!(!client.connect(), "no service to reconnect to");
        assert_eq!(manager.recipient_count("input"), 0);
    }

    #[test]
    fn test_reregistered_service_accepts_reconnect() {
        let (_old, manager, client) = setup();
        client.connect();
        manager.kill("input");

        let fresh = Arc::new(InMemoryInputManager::with_default_devices());
        manager.register("input", Arc::clone(&fresh));

        assert!(client.connect());
        assert!(client.inject(&back_key()));
        assert_eq!(fresh.injected_events().len(), 1);
    }

    #[test]
    fn test_should_fail_rejects_injection() {
        let input = Arc::new(InMemoryInputManager {
            should_fail: true,
            ..InMemoryInputManager::with_default_devices()
        });
        let manager = Arc::new(InMemoryServiceManager::new());
        manager.register("input", Arc::clone(&input));
        let client = InputInjectionClient::new(manager, "input", InjectMode::Async);
        client.connect();

        assert!(!client.inject(&back_key()));
        assert!(client.is_connected(), "transport errors do not drop the connection");
        assert!(input.injected_events().is_empty());
    }

    #[test]
    fn test_default_devices_resolve_through_registry() {
        let (_input, _manager, client) = setup();
        client.connect();
        let registry = InputDeviceRegistry::new(client);

        let caps = registry.capabilities();

        assert_eq!(caps.keyboard, DeviceId(1));
        assert_eq!(caps.touchscreen, DeviceId(2));
    }
}
