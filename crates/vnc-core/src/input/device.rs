//! Input device descriptions reported by the input service.

use serde::{Deserialize, Serialize};

use crate::input::events::{DeviceId, InputSource};

/// Upper bound on device ids considered when scanning the service.
pub const MAX_INPUT_DEVICE_COUNT: usize = 32;

/// One input device as reported by the input service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDeviceInfo {
    pub id: DeviceId,
    pub name: String,
    /// Stable identifier that survives reconnects and reboots.
    pub descriptor: String,
    pub sources: InputSource,
    pub is_external: bool,
}

impl InputDeviceInfo {
    /// Returns `true` if the device produces every class in `source`.
    pub fn supports_source(&self, source: InputSource) -> bool {
        self.sources.supports(source)
    }
}
