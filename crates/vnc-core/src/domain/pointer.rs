//! Pointer state machine: RFB button masks to touch/mouse motion intents.
//!
//! An RFB viewer does not send "pressed" or "released" events.  It sends the
//! *complete* button mask on every pointer event, so the server has to diff
//! the new mask against the previous one to find out what happened:
//!
//! ```text
//! previous  current   intent
//! 0b00000   0b00001   Down(Primary)
//! 0b00001   0b00001   Move            (drag)
//! 0b00001   0b00000   Up(Primary)
//! 0b00000   0b01000   ScrollUp
//! 0b01000   0b00000   (nothing: wheel "release")
//! 0b00000   0b00000   (nothing: hover)
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::session::ButtonMask;

/// Pointer button reported in the injected event's button state.
///
/// Values are the platform's `BUTTON_*` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum PointerButton {
    Primary = 1,
    Secondary = 2,
    Tertiary = 4,
}

impl PointerButton {
    /// Picks the button for a mask holding at least one primary bit.
    ///
    /// Left wins over middle, middle wins over right.
    fn from_mask(mask: ButtonMask) -> Self {
        if mask.contains(ButtonMask::LEFT) {
            PointerButton::Primary
        } else if mask.contains(ButtonMask::MIDDLE) {
            PointerButton::Tertiary
        } else {
            PointerButton::Secondary
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// What a pointer event means once compared with the previous mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionIntent {
    Down(PointerButton),
    Move,
    Up(PointerButton),
    ScrollUp,
    ScrollDown,
}

impl MotionIntent {
    /// Vertical scroll axis value: `+1.0` up, `-1.0` down, `0.0` otherwise.
    pub fn vscroll(&self) -> f32 {
        match self {
            MotionIntent::ScrollUp => 1.0,
            MotionIntent::ScrollDown => -1.0,
            _ => 0.0,
        }
    }

    /// Contact pressure: held for Down and Move, released otherwise.
    pub fn pressure(&self) -> f32 {
        match self {
            MotionIntent::Down(_) | MotionIntent::Move => 1.0,
            _ => 0.0,
        }
    }
}

/// Stateless pointer translation; the caller owns the previous mask.
pub struct PointerTranslator;

impl PointerTranslator {
    /// Compares `mask` with `previous` and returns the resulting intent.
    ///
    /// Rules, in priority order:
    ///
    /// 1. A primary button is held: `Move` if a held primary button was
    ///    already held in `previous`, otherwise `Down`.
    /// 2. A wheel bit is set: `ScrollUp` or `ScrollDown`.
    /// 3. Nothing is held but `previous` held a primary button: `Up`.
    /// 4. Nothing is held and `previous` held only wheel bits: no intent.
    /// 5. Nothing held before or now (hover): no intent.
    ///
    /// A mask with bits outside the five known buttons yields no intent.
    pub fn translate(mask: ButtonMask, previous: ButtonMask) -> Option<MotionIntent> {
        if !mask.is_recognized() {
            warn!("unprocessed pointer button mask {:#04x}", mask.0);
            return None;
        }

        if mask.has_primary() {
            if previous.0 & mask.0 & ButtonMask::PRIMARY_BUTTONS != 0 {
                return Some(MotionIntent::Move);
            }
            return Some(MotionIntent::Down(PointerButton::from_mask(mask)));
        }

        if mask.has_wheel() {
            return if mask.contains(ButtonMask::WHEEL_UP) {
                Some(MotionIntent::ScrollUp)
            } else {
                Some(MotionIntent::ScrollDown)
            };
        }

        // Mask is empty from here on.
        if previous.has_primary() {
            return Some(MotionIntent::Up(PointerButton::from_mask(previous)));
        }
        if previous.has_wheel() {
            debug!("wheel release ignored");
        }
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
