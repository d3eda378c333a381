//! X11 KeySym to platform key code translation table.
//!
//! RFB `KeyEvent` messages carry X11 KeySym values as defined in
//! X11/keysymdef.h.
//! Reference: https://gitlab.freedesktop.org/xorg/proto/xorgproto/-/blob/master/include/X11/keysymdef.h
//!
//! # Shifted characters
//!
//! KeySyms name *characters*, so typing `!` on a US keyboard arrives as
//! `XK_exclam` (0x21) rather than "Shift + 1".  The device has no key for
//! `!`; it expects the `1` key with Shift held.  The viewer has already sent
//! a separate Shift key-down, so the table maps every shifted character to
//! its unshifted key and lets the session's meta state supply the Shift.
//!
//! Letters work the same way, with one twist: an uppercase letter typed
//! while Shift is *not* held means caps lock is on.  That inference lives in
//! [`super::KeyTranslator`], not here; this table is stateless.

use super::android::AndroidKeyCode;

/// Case of a letter keysym, used for caps-lock inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetterCase {
    Upper,
    Lower,
}

/// Returns the case of `keysym` if it is an ASCII letter.
pub fn letter_case(keysym: u32) -> Option<LetterCase> {
    match keysym {
        0x41..=0x5A => Some(LetterCase::Upper),
        0x61..=0x7A => Some(LetterCase::Lower),
        _ => None,
    }
}

const CURSOR_BLOCK: [AndroidKeyCode; 8] = [
    AndroidKeyCode::MoveHome,  // XK_Home
    AndroidKeyCode::DpadLeft,  // XK_Left
    AndroidKeyCode::DpadUp,    // XK_Up
    AndroidKeyCode::DpadRight, // XK_Right
    AndroidKeyCode::DpadDown,  // XK_Down
    AndroidKeyCode::PageUp,    // XK_Page_Up
    AndroidKeyCode::PageDown,  // XK_Page_Down
    AndroidKeyCode::MoveEnd,   // XK_End
];

const MODIFIER_BLOCK: [AndroidKeyCode; 4] = [
    AndroidKeyCode::ShiftLeft,  // XK_Shift_L
    AndroidKeyCode::ShiftRight, // XK_Shift_R
    AndroidKeyCode::CtrlLeft,   // XK_Control_L
    AndroidKeyCode::CtrlRight,  // XK_Control_R
];

/// Translates an X11 KeySym to a platform key code.
///
/// Returns [`AndroidKeyCode::Unknown`] if no mapping exists for `keysym`.
///
/// Two mappings are deliberate platform remaps rather than literal
/// translations: Escape produces Back, and 0xFFE9 (the "win" key)
/// produces Home.
pub fn keysym_to_keycode(keysym: u32) -> AndroidKeyCode {
    match keysym {
        0x30..=0x39 => AndroidKeyCode::digit(keysym - 0x30),
        0x41..=0x5A => AndroidKeyCode::letter(keysym - 0x41),
        0x61..=0x7A => AndroidKeyCode::letter(keysym - 0x61),
        0xFF50..=0xFF57 => CURSOR_BLOCK[(keysym - 0xFF50) as usize],
        0xFFBE..=0xFFC9 => AndroidKeyCode::function(keysym - 0xFFBE),
        0xFFE1..=0xFFE4 => MODIFIER_BLOCK[(keysym - 0xFFE1) as usize],

        // Printable punctuation (shifted characters map to their base key)
        0x0020 => AndroidKeyCode::Space,        // XK_space
        0x0021 => AndroidKeyCode::Digit1,       // XK_exclam
        0x0022 => AndroidKeyCode::Apostrophe,   // XK_quotedbl
        0x0023 => AndroidKeyCode::Digit2,       // XK_numbersign
        0x0024 => AndroidKeyCode::Digit4,       // XK_dollar
        0x0025 => AndroidKeyCode::Digit5,       // XK_percent
        0x0026 => AndroidKeyCode::Digit7,       // XK_ampersand
        0x0027 => AndroidKeyCode::Apostrophe,   // XK_apostrophe
        0x0028 => AndroidKeyCode::Digit9,       // XK_parenleft
        0x0029 => AndroidKeyCode::Digit0,       // XK_parenright
        0x002A => AndroidKeyCode::Digit8,       // XK_asterisk
        0x002B => AndroidKeyCode::Equals,       // XK_plus
        0x002C => AndroidKeyCode::Comma,        // XK_comma
        0x002D => AndroidKeyCode::Minus,        // XK_minus
        0x002E => AndroidKeyCode::Period,       // XK_period
        0x002F => AndroidKeyCode::Slash,        // XK_slash
        0x003A => AndroidKeyCode::Semicolon,    // XK_colon
        0x003B => AndroidKeyCode::Semicolon,    // XK_semicolon
        0x003C => AndroidKeyCode::Comma,        // XK_less
        0x003D => AndroidKeyCode::Equals,       // XK_equal
        0x003E => AndroidKeyCode::Period,       // XK_greater
        0x003F => AndroidKeyCode::Slash,        // XK_question
        0x0040 => AndroidKeyCode::Digit2,       // XK_at
        0x005B => AndroidKeyCode::LeftBracket,  // XK_bracketleft
        0x005C => AndroidKeyCode::Backslash,    // XK_backslash
        0x005D => AndroidKeyCode::RightBracket, // XK_bracketright
        0x005E => AndroidKeyCode::Digit6,       // XK_asciicircum
        0x005F => AndroidKeyCode::Minus,        // XK_underscore
        0x0060 => AndroidKeyCode::Grave,        // XK_grave
        0x007B => AndroidKeyCode::LeftBracket,  // XK_braceleft
        0x007C => AndroidKeyCode::Backslash,    // XK_bar
        0x007D => AndroidKeyCode::RightBracket, // XK_braceright
        0x007E => AndroidKeyCode::Grave,        // XK_asciitilde

        // Function and control keys
        0xFE03 => AndroidKeyCode::AltLeft,    // XK_ISO_Level3_Shift (AltGr)
        0xFF08 => AndroidKeyCode::Del,        // XK_BackSpace
        0xFF09 => AndroidKeyCode::Tab,        // XK_Tab
        0xFF0D => AndroidKeyCode::Enter,      // XK_Return
        0xFF1B => AndroidKeyCode::Back,       // XK_Escape
        0xFF6A => AndroidKeyCode::Insert,     // XK_Help
        0xFF7E => AndroidKeyCode::AltRight,   // XK_Mode_switch
        0xFFE9 => AndroidKeyCode::Home,       // XK_Alt_L, the "win" key on some viewers
        0xFFFF => AndroidKeyCode::ForwardDel, // XK_Delete

        _ => AndroidKeyCode::Unknown,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
