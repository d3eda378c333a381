//! Platform key codes and meta-state flags understood by the input service.
//!
//! The numeric values match the device's `KeyEvent.KEYCODE_*` and
//! `KeyEvent.META_*` constants, so they can be placed directly in an
//! injected key event without further translation.
//!
//! # What is a key code? (for beginners)
//!
//! A VNC viewer sends *keysyms*: X11 symbols describing the character or
//! function a key produces (`0x0041` is uppercase 'A', `0xFF0D` is Return).
//! The device's input pipeline instead wants *key codes*: numbers naming a
//! physical key (`KEYCODE_A` = 29 is the A key, whatever case it types).
//! The case, and any Ctrl/Alt combination, is carried separately in the
//! event's *meta state* bit set.
//!
//! | Key          | Key code |
//! |--------------|----------|
//! | Home button  | 3        |
//! | Back button  | 4        |
//! | Letter A     | 29       |
//! | Enter        | 66       |
//!
//! # The `Unknown` sentinel
//!
//! [`AndroidKeyCode::Unknown`] (value 0) stands for any keysym with no
//! mapping.  Events carrying it are never injected.

use serde::{Deserialize, Serialize};

/// Platform key code for keyboard keys.
///
/// The numeric value of each variant is the device's `KEYCODE_*` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum AndroidKeyCode {
    /// Sentinel for keysyms with no key code mapping.
    Unknown = 0,

    // System buttons
    Home = 3,
    Back = 4,

    // Digits (7–16)
    Digit0 = 7,
    Digit1 = 8,
    Digit2 = 9,
    Digit3 = 10,
    Digit4 = 11,
    Digit5 = 12,
    Digit6 = 13,
    Digit7 = 14,
    Digit8 = 15,
    Digit9 = 16,

    // Directional pad
    DpadUp = 19,
    DpadDown = 20,
    DpadLeft = 21,
    DpadRight = 22,

    // Letters (29–54)
    A = 29,
    B = 30,
    C = 31,
    D = 32,
    E = 33,
    F = 34,
    G = 35,
    H = 36,
    I = 37,
    J = 38,
    K = 39,
    L = 40,
    M = 41,
    N = 42,
    O = 43,
    P = 44,
    Q = 45,
    R = 46,
    S = 47,
    T = 48,
    U = 49,
    V = 50,
    W = 51,
    X = 52,
    Y = 53,
    Z = 54,

    // Punctuation and modifiers
    Comma = 55,
    Period = 56,
    AltLeft = 57,
    AltRight = 58,
    ShiftLeft = 59,
    ShiftRight = 60,
    Tab = 61,
    Space = 62,
    Enter = 66,
    Del = 67,
    Grave = 68,
    Minus = 69,
    Equals = 70,
    LeftBracket = 71,
    RightBracket = 72,
    Backslash = 73,
    Semicolon = 74,
    Apostrophe = 75,
    Slash = 76,

    // Navigation cluster
    PageUp = 92,
    PageDown = 93,
    Escape = 111,
    ForwardDel = 112,
    CtrlLeft = 113,
    CtrlRight = 114,
    MoveHome = 122,
    MoveEnd = 123,
    Insert = 124,

    // Function keys (131–142)
    F1 = 131,
    F2 = 132,
    F3 = 133,
    F4 = 134,
    F5 = 135,
    F6 = 136,
    F7 = 137,
    F8 = 138,
    F9 = 139,
    F10 = 140,
    F11 = 141,
    F12 = 142,
}

const DIGITS: [AndroidKeyCode; 10] = [
    AndroidKeyCode::Digit0,
    AndroidKeyCode::Digit1,
    AndroidKeyCode::Digit2,
    AndroidKeyCode::Digit3,
    AndroidKeyCode::Digit4,
    AndroidKeyCode::Digit5,
    AndroidKeyCode::Digit6,
    AndroidKeyCode::Digit7,
    AndroidKeyCode::Digit8,
    AndroidKeyCode::Digit9,
];

const LETTERS: [AndroidKeyCode; 26] = [
    AndroidKeyCode::A,
    AndroidKeyCode::B,
    AndroidKeyCode::C,
    AndroidKeyCode::D,
    AndroidKeyCode::E,
    AndroidKeyCode::F,
    AndroidKeyCode::G,
    AndroidKeyCode::H,
    AndroidKeyCode::I,
    AndroidKeyCode::J,
    AndroidKeyCode::K,
    AndroidKeyCode::L,
    AndroidKeyCode::M,
    AndroidKeyCode::N,
    AndroidKeyCode::O,
    AndroidKeyCode::P,
    AndroidKeyCode::Q,
    AndroidKeyCode::R,
    AndroidKeyCode::S,
    AndroidKeyCode::T,
    AndroidKeyCode::U,
    AndroidKeyCode::V,
    AndroidKeyCode::W,
    AndroidKeyCode::X,
    AndroidKeyCode::Y,
    AndroidKeyCode::Z,
];

const FUNCTION_KEYS: [AndroidKeyCode; 12] = [
    AndroidKeyCode::F1,
    AndroidKeyCode::F2,
    AndroidKeyCode::F3,
    AndroidKeyCode::F4,
    AndroidKeyCode::F5,
    AndroidKeyCode::F6,
    AndroidKeyCode::F7,
    AndroidKeyCode::F8,
    AndroidKeyCode::F9,
    AndroidKeyCode::F10,
    AndroidKeyCode::F11,
    AndroidKeyCode::F12,
];

impl AndroidKeyCode {
    /// Returns the key code for digit `n` (0–9), or `Unknown` if out of range.
    pub fn digit(n: u32) -> Self {
        DIGITS.get(n as usize).copied().unwrap_or(Self::Unknown)
    }

    /// Returns the key code for the `n`-th letter (0 = A), or `Unknown`.
    pub fn letter(n: u32) -> Self {
        LETTERS.get(n as usize).copied().unwrap_or(Self::Unknown)
    }

    /// Returns the key code for function key F`n+1` (0 = F1), or `Unknown`.
    pub fn function(n: u32) -> Self {
        FUNCTION_KEYS.get(n as usize).copied().unwrap_or(Self::Unknown)
    }

    /// Returns the raw key code value placed on the wire.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Returns `true` for shift, ctrl, and alt keys.
    ///
    /// Modifier keys are never injected on their own; they only change the
    /// session's [`MetaState`].
    pub fn is_modifier(self) -> bool {
        self.modifier_flag().is_some()
    }

    /// Returns the meta-state bit latched while this modifier key is held.
    pub fn modifier_flag(self) -> Option<i32> {
        match self {
            AndroidKeyCode::ShiftLeft | AndroidKeyCode::ShiftRight => Some(MetaState::SHIFT_ON),
            AndroidKeyCode::CtrlLeft | AndroidKeyCode::CtrlRight => Some(MetaState::CTRL_ON),
            AndroidKeyCode::AltLeft | AndroidKeyCode::AltRight => Some(MetaState::ALT_ON),
            _ => None,
        }
    }
}

/// Bit set of modifier states carried on every key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MetaState(pub i32);

impl MetaState {
    pub const NONE: i32 = 0;
    pub const SHIFT_ON: i32 = 0x01;
    pub const ALT_ON: i32 = 0x02;
    pub const CAPS_LOCKED: i32 = 0x100;
    pub const CTRL_ON: i32 = 0x1000;

    /// Returns `true` if every bit of `flag` is set.
    pub fn contains(&self, flag: i32) -> bool {
        self.0 & flag == flag
    }

    /// Sets the bits of `flag`.
    pub fn insert(&mut self, flag: i32) {
        self.0 |= flag;
    }

    /// Clears the bits of `flag`.
    pub fn remove(&mut self, flag: i32) {
        self.0 &= !flag;
    }

    /// Returns `true` if Shift is held.
    pub fn shift(&self) -> bool {
        self.contains(Self::SHIFT_ON)
    }

    /// Returns `true` if Ctrl is held.
    pub fn ctrl(&self) -> bool {
        self.contains(Self::CTRL_ON)
    }

    /// Returns `true` if Alt is held.
    pub fn alt(&self) -> bool {
        self.contains(Self::ALT_ON)
    }

    /// Returns `true` if caps lock has been inferred from typed letters.
    pub fn caps_locked(&self) -> bool {
        self.contains(Self::CAPS_LOCKED)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
