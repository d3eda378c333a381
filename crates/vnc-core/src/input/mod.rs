//! Input events and device descriptions exchanged with the input service.

pub mod device;
pub mod events;

pub use device::{InputDeviceInfo, MAX_INPUT_DEVICE_COUNT};
pub use events::{
    monotonic_now_ns, DeviceId, InjectMode, InputEvent, InputSource, KeyEvent, MotionAction,
    MotionEvent,
};
