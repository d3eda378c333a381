//! Key translation for remote keyboard input.
//!
//! The viewer sends X11 KeySyms; the input service wants platform key codes
//! plus a meta-state bit set.  Translation is split in two:
//!
//! - [`keysym::keysym_to_keycode`] – a stateless lookup table.
//! - [`KeyTranslator`] – the stateful part: tracks Shift/Ctrl/Alt and the
//!   inferred caps-lock state in the client's [`Session`], swallows modifier
//!   keys, and stamps every real key event with the current meta state.

pub mod android;
pub mod keysym;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::domain::session::Session;

pub use android::{AndroidKeyCode, MetaState};
pub use keysym::{keysym_to_keycode, letter_case, LetterCase};

/// Press or release, with the platform's `ACTION_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum KeyAction {
    Down = 0,
    Up = 1,
}

impl KeyAction {
    /// Maps the RFB `down-flag` to an action.
    pub fn from_down_flag(down: bool) -> Self {
        if down {
            KeyAction::Down
        } else {
            KeyAction::Up
        }
    }
}

/// A key press or release ready to be turned into an injected key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyIntent {
    pub key_code: AndroidKeyCode,
    pub action: KeyAction,
    /// Session meta state at the time of the event.
    pub meta_state: MetaState,
}

/// Stateful keysym translator operating on a client [`Session`].
pub struct KeyTranslator;

impl KeyTranslator {
    /// Translates one RFB key event.
    ///
    /// Returns `None` for modifier keys (which only update
    /// `session.meta_state`) and for keysyms with no mapping.  Letter
    /// keysyms also update the inferred caps-lock bit: an uppercase letter
    /// without Shift held sets it, a lowercase letter clears it.
    pub fn translate(down: bool, keysym: u32, session: &mut Session) -> Option<KeyIntent> {
        match letter_case(keysym) {
            Some(LetterCase::Upper) if !session.meta_state.shift() => {
                session.meta_state.insert(MetaState::CAPS_LOCKED);
            }
            Some(LetterCase::Lower) => session.meta_state.remove(MetaState::CAPS_LOCKED),
            _ => {}
        }

        let key_code = keysym_to_keycode(keysym);
        if key_code == AndroidKeyCode::Unknown {
            warn!("unprocessed keysym {keysym:#06x}");
            return None;
        }

        if let Some(flag) = key_code.modifier_flag() {
            if down {
                session.meta_state.insert(flag);
            } else {
                session.meta_state.remove(flag);
            }
            trace!(?key_code, down, meta = session.meta_state.0, "modifier state updated");
            return None;
        }

        Some(KeyIntent {
            key_code,
            action: KeyAction::from_down_flag(down),
            meta_state: session.meta_state,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const XK_SHIFT_L: u32 = 0xFFE1;
    const XK_CONTROL_R: u32 = 0xFFE4;
    const XK_ISO_LEVEL3_SHIFT: u32 = 0xFE03;

    #[test]
    fn test_uppercase_without_shift_infers_caps_lock() {
        // Arrange
        let mut session = Session::new();

        // Act
        let intent = KeyTranslator::translate(true, 0x41, &mut session).expect("intent");

        // Assert
        assert_eq!(intent.key_code, AndroidKeyCode::A);
        assert_eq!(intent.action, KeyAction::Down);
        assert!(intent.meta_state.caps_locked());
        assert!(!intent.meta_state.shift());
    }

    #[test]
    fn test_lowercase_letter_clears_caps_lock() {
        let mut session = Session::new();
        KeyTranslator::translate(true, 'B' as u32, &mut session);

        let intent = KeyTranslator::translate(true, 'b' as u32, &mut session).expect("intent");

        assert_eq!(intent.key_code, AndroidKeyCode::B);
        assert!(!intent.meta_state.caps_locked());
    }

    #[test]
    fn test_shift_then_uppercase_carries_shift_not_caps() {
        // Arrange
        let mut session = Session::new();

        // Act
        let shift = KeyTranslator::translate(true, XK_SHIFT_L, &mut session);
        let letter = KeyTranslator::translate(true, 'Q' as u32, &mut session).expect("intent");

        // Assert
        assert!(shift.is_none(), "modifier keys are never injected");
        assert!(letter.meta_state.shift());
        assert!(!letter.meta_state.caps_locked());
    }

    #[test]
    fn test_shift_release_clears_shift_for_next_key() {
        let mut session = Session::new();
        KeyTranslator::translate(true, XK_SHIFT_L, &mut session);
        KeyTranslator::translate(false, XK_SHIFT_L, &mut session);

        let intent = KeyTranslator::translate(true, '1' as u32, &mut session).expect("intent");

        assert!(!intent.meta_state.shift());
        assert_eq!(session.meta_state.0, MetaState::NONE);
    }

    #[test]
    fn test_ctrl_and_alt_latch_independently() {
        let mut session = Session::new();
        KeyTranslator::translate(true, XK_CONTROL_R, &mut session);
        KeyTranslator::translate(true, XK_ISO_LEVEL3_SHIFT, &mut session);

        let intent = KeyTranslator::translate(true, 'c' as u32, &mut session).expect("intent");
        assert!(intent.meta_state.ctrl());
        assert!(intent.meta_state.alt());

        KeyTranslator::translate(false, XK_CONTROL_R, &mut session);
        assert!(!session.meta_state.ctrl());
        assert!(session.meta_state.alt());
    }

    #[test]
    fn test_key_release_produces_up_action() {
        let mut session = Session::new();
        let intent = KeyTranslator::translate(false, 0xFF0D, &mut session).expect("intent");
        assert_eq!(intent.key_code, AndroidKeyCode::Enter);
        assert_eq!(intent.action, KeyAction::Up);
    }

    #[test]
    fn test_unknown_keysym_produces_nothing_and_keeps_state() {
        let mut session = Session::new();
        session.meta_state.insert(MetaState::SHIFT_ON);

        let intent = KeyTranslator::translate(true, 0x20AC, &mut session); // XK_EuroSign

        assert!(intent.is_none());
        assert_eq!(session.meta_state.0, MetaState::SHIFT_ON);
    }

    #[test]
    fn test_same_keysym_is_deterministic() {
        let mut a = Session::new();
        let mut b = Session::new();
        let first = KeyTranslator::translate(true, 0xFF51, &mut a);
        let second = KeyTranslator::translate(true, 0xFF51, &mut b);
        assert_eq!(first, second);
    }
}
