//! Fully-populated input events submitted to the injection service.
//!
//! An [`InputEvent`] is built from a translated intent the moment a viewer
//! message arrives and is submitted immediately; events are never queued.
//!
//! Timestamps are nanoseconds on a process-local monotonic clock (see
//! [`monotonic_now_ns`]).  Down time and event time are equal because every
//! RFB event is delivered as a self-contained gesture step.

use std::sync::OnceLock;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::domain::pointer::{MotionIntent, PointerButton};
use crate::keymap::android::{AndroidKeyCode, MetaState};
use crate::keymap::{KeyAction, KeyIntent};

/// Identifier of an input device known to the input service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub i32);

impl DeviceId {
    /// Device id used when no suitable device can be resolved.
    pub const DEFAULT: DeviceId = DeviceId(0);
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bit set of input source classes a device or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InputSource(pub u32);

impl InputSource {
    pub const CLASS_BUTTON: u32 = 0x0000_0001;
    pub const CLASS_POINTER: u32 = 0x0000_0002;
    pub const KEYBOARD: InputSource = InputSource(0x0000_0100 | Self::CLASS_BUTTON);
    pub const TOUCHSCREEN: InputSource = InputSource(0x0000_1000 | Self::CLASS_POINTER);

    /// Returns `true` if every bit of `other` is present in `self`.
    pub fn supports(&self, other: InputSource) -> bool {
        self.0 & other.0 == other.0
    }
}

/// How long the injecting caller waits for the event to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum InjectMode {
    /// Return immediately.
    Async = 0,
    /// Wait until the event has been dispatched to a window.
    WaitForResult = 1,
    /// Wait until the receiving window has finished handling the event.
    #[default]
    WaitForFinish = 2,
}

/// Motion action values (`ACTION_*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum MotionAction {
    Down = 0,
    Up = 1,
    Move = 2,
    Scroll = 8,
}

/// A single-pointer motion event on the touchscreen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: MotionAction,
    /// Button pressed or released by this event; 0 for move and scroll.
    pub action_button: i32,
    /// Buttons held after this event.
    pub button_state: i32,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub size: f32,
    pub vscroll: f32,
    pub down_time_ns: i64,
    pub event_time_ns: i64,
}

impl MotionEvent {
    /// Builds the touchscreen event for a pointer intent at `(x, y)`.
    pub fn from_intent(intent: MotionIntent, device_id: DeviceId, x: u16, y: u16, now_ns: i64) -> Self {
        let (action, action_button, button_state) = match intent {
            MotionIntent::Down(b) => (MotionAction::Down, b.as_i32(), b.as_i32()),
            MotionIntent::Move => (MotionAction::Move, 0, 0),
            MotionIntent::Up(b) => (MotionAction::Up, b.as_i32(), 0),
            MotionIntent::ScrollUp | MotionIntent::ScrollDown => (MotionAction::Scroll, 0, 0),
        };
        Self {
            device_id,
            source: InputSource::TOUCHSCREEN,
            action,
            action_button,
            button_state,
            x: f32::from(x),
            y: f32::from(y),
            pressure: intent.pressure(),
            size: 1.0,
            vscroll: intent.vscroll(),
            down_time_ns: now_ns,
            event_time_ns: now_ns,
        }
    }

    /// Returns the pressed button carried by a Down event.
    pub fn pressed_button(&self) -> Option<PointerButton> {
        if self.action != MotionAction::Down {
            return None;
        }
        match self.action_button {
            1 => Some(PointerButton::Primary),
            2 => Some(PointerButton::Secondary),
            4 => Some(PointerButton::Tertiary),
            _ => None,
        }
    }
}

/// A key press or release on the keyboard device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub device_id: DeviceId,
    pub source: InputSource,
    pub action: KeyAction,
    pub key_code: AndroidKeyCode,
    pub meta_state: MetaState,
    pub repeat_count: i32,
    pub down_time_ns: i64,
    pub event_time_ns: i64,
}

impl KeyEvent {
    /// Builds the keyboard event for a key intent.
    pub fn from_intent(intent: KeyIntent, device_id: DeviceId, now_ns: i64) -> Self {
        Self {
            device_id,
            source: InputSource::KEYBOARD,
            action: intent.action,
            key_code: intent.key_code,
            meta_state: intent.meta_state,
            repeat_count: 0,
            down_time_ns: now_ns,
            event_time_ns: now_ns,
        }
    }
}

/// Any event the injection service accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InputEvent {
    Key(KeyEvent),
    Motion(MotionEvent),
}

impl InputEvent {
    pub fn device_id(&self) -> DeviceId {
        match self {
            InputEvent::Key(k) => k.device_id,
            InputEvent::Motion(m) => m.device_id,
        }
    }

    pub fn source(&self) -> InputSource {
        match self {
            InputEvent::Key(k) => k.source,
            InputEvent::Motion(m) => m.source,
        }
    }
}

/// Nanoseconds elapsed on a monotonic clock anchored at first use.
pub fn monotonic_now_ns() -> i64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    let origin = ORIGIN.get_or_init(Instant::now);
    i64::try_from(origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touchscreen_source_supports_pointer_class() {
        assert!(InputSource::TOUCHSCREEN.supports(InputSource(InputSource::CLASS_POINTER)));
        assert!(!InputSource::TOUCHSCREEN.supports(InputSource::KEYBOARD));
        assert_eq!(InputSource::TOUCHSCREEN.0, 0x1002);
        assert_eq!(InputSource::KEYBOARD.0, 0x0101);
    }

    #[test]
    fn test_down_event_carries_button_and_pressure() {
        // Arrange
        let intent = MotionIntent::Down(PointerButton::Tertiary);

        // Act
        let ev = MotionEvent::from_intent(intent, DeviceId(7), 100, 200, 42);

        // Assert
        assert_eq!(ev.action, MotionAction::Down);
        assert_eq!(ev.button_state, 4);
        assert_eq!(ev.pressed_button(), Some(PointerButton::Tertiary));
        assert_eq!((ev.x, ev.y), (100.0, 200.0));
        assert_eq!(ev.pressure, 1.0);
        assert_eq!(ev.size, 1.0);
        assert_eq!(ev.device_id, DeviceId(7));
        assert_eq!(ev.source, InputSource::TOUCHSCREEN);
        assert_eq!(ev.down_time_ns, ev.event_time_ns);
    }

    #[test]
    fn test_up_event_releases_button() {
        let ev = MotionEvent::from_intent(MotionIntent::Up(PointerButton::Primary), DeviceId(1), 0, 0, 0);
        assert_eq!(ev.action, MotionAction::Up);
        assert_eq!(ev.action_button, 1);
        assert_eq!(ev.button_state, 0);
        assert_eq!(ev.pressure, 0.0);
    }

    #[test]
    fn test_scroll_event_sets_vscroll() {
        let ev = MotionEvent::from_intent(MotionIntent::ScrollDown, DeviceId(1), 3, 4, 0);
        assert_eq!(ev.action, MotionAction::Scroll);
        assert_eq!(ev.vscroll, -1.0);
        assert_eq!(ev.pressure, 0.0);
    }

    #[test]
    fn test_key_event_copies_intent() {
        let intent = KeyIntent {
            key_code: AndroidKeyCode::Enter,
            action: KeyAction::Up,
            meta_state: MetaState(MetaState::CTRL_ON),
        };

        let ev = KeyEvent::from_intent(intent, DeviceId(3), 9);

        assert_eq!(ev.key_code, AndroidKeyCode::Enter);
        assert_eq!(ev.action, KeyAction::Up);
        assert!(ev.meta_state.ctrl());
        assert_eq!(ev.source, InputSource::KEYBOARD);
        assert_eq!(InputEvent::Key(ev).device_id(), DeviceId(3));
    }

    #[test]
    fn test_monotonic_clock_never_goes_backwards() {
        let a = monotonic_now_ns();
        let b = monotonic_now_ns();
        assert!(b >= a);
    }
}
