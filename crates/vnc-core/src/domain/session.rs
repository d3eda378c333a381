//! Per-client session state.

use uuid::Uuid;

use crate::domain::pointer::{MotionIntent, PointerTranslator};
use crate::keymap::android::MetaState;

/// Opaque identifier for a connected viewer, derived from UUID v4.
pub type ClientHandle = Uuid;

/// RFB pointer button bitmask as sent in `PointerEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ButtonMask(pub u8);

impl ButtonMask {
    pub const LEFT: u8 = 1 << 0;
    pub const MIDDLE: u8 = 1 << 1;
    pub const RIGHT: u8 = 1 << 2;
    pub const WHEEL_UP: u8 = 1 << 3;
    pub const WHEEL_DOWN: u8 = 1 << 4;

    /// Left, middle, and right.
    pub const PRIMARY_BUTTONS: u8 = Self::LEFT | Self::MIDDLE | Self::RIGHT;
    /// Wheel up and wheel down.
    pub const WHEEL_BUTTONS: u8 = Self::WHEEL_UP | Self::WHEEL_DOWN;
    const KNOWN: u8 = Self::PRIMARY_BUTTONS | Self::WHEEL_BUTTONS;

    /// Returns `true` if no button is held.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if any of left, middle, or right is held.
    pub fn has_primary(&self) -> bool {
        self.0 & Self::PRIMARY_BUTTONS != 0
    }

    /// Returns `true` if either wheel bit is set.
    pub fn has_wheel(&self) -> bool {
        self.0 & Self::WHEEL_BUTTONS != 0
    }

    /// Returns `true` if every set bit is one of the five known buttons.
    pub fn is_recognized(&self) -> bool {
        self.0 & !Self::KNOWN == 0
    }

    /// Returns `true` if every bit of `flag` is set.
    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }
}

/// State kept for one connected viewer.
///
/// Created when the viewer connects and dropped when it disconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Button mask seen on the previous pointer event.
    pub button_mask: ButtonMask,
    pub last_x: u16,
    pub last_y: u16,
    /// Latched modifier keys plus inferred caps lock.
    pub meta_state: MetaState,
}

impl Session {
    /// Creates a session with no buttons held and no modifiers latched.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the pointer state machine for one RFB pointer event.
    ///
    /// The stored button mask is updated unconditionally.  The position is
    /// only recorded for recognized masks; anything else leaves the session
    /// untouched apart from the mask.
    pub fn apply_pointer(&mut self, mask: ButtonMask, x: u16, y: u16) -> Option<MotionIntent> {
        let intent = PointerTranslator::translate(mask, self.button_mask);
        self.button_mask = mask;
        if mask.is_recognized() {
            self.last_x = x;
            self.last_y = y;
        }
        intent
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pointer::PointerButton;

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert!(session.button_mask.is_empty());
        assert_eq!(session.meta_state, MetaState::default());
    }

    #[test]
    fn test_apply_pointer_updates_mask_and_position() {
        // Arrange
        let mut session = Session::new();

        // Act
        let intent = session.apply_pointer(ButtonMask(ButtonMask::LEFT), 10, 20);

        // Assert
        assert_eq!(intent, Some(MotionIntent::Down(PointerButton::Primary)));
        assert_eq!(session.button_mask, ButtonMask(1));
        assert_eq!((session.last_x, session.last_y), (10, 20));
    }

    #[test]
    fn test_unrecognized_mask_still_updates_stored_mask() {
        // Arrange
        let mut session = Session::new();
        session.apply_pointer(ButtonMask(ButtonMask::LEFT), 10, 20);
        session.meta_state = MetaState(MetaState::SHIFT_ON);

        // Act
        let intent = session.apply_pointer(ButtonMask(0x40), 99, 99);

        // Assert
        assert!(intent.is_none());
        assert_eq!(session.button_mask, ButtonMask(0x40));
        assert_eq!((session.last_x, session.last_y), (10, 20));
        assert_eq!(session.meta_state, MetaState(MetaState::SHIFT_ON));
    }

    #[test]
    fn test_button_mask_classification() {
        assert!(ButtonMask(ButtonMask::RIGHT).has_primary());
        assert!(!ButtonMask(ButtonMask::WHEEL_UP).has_primary());
        assert!(ButtonMask(ButtonMask::WHEEL_DOWN).has_wheel());
        assert!(ButtonMask(0x1F).is_recognized());
        assert!(!ButtonMask(0x20).is_recognized());
        assert!(!ButtonMask(0x81).is_recognized());
    }
}
