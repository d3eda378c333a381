//! # vnc-core
//!
//! Shared library for the ReDroid VNC server containing the RFB wire codec,
//! the session domain, and the translation tables that turn remote pointer
//! and keyboard events into platform input events.
//!
//! It has zero dependencies on sockets, GPU APIs, or the input service RPC
//! transport; everything here is pure and unit-testable.
//!
//! # Architecture overview (for beginners)
//!
//! A VNC viewer talks the RFB ("remote framebuffer") protocol.  It receives
//! pixels from the server and sends back two kinds of input: pointer events
//! (a button bitmask plus an x/y position) and key events (an X11 keysym plus
//! a down/up flag).  The device on the other end understands neither: it
//! wants touchscreen motion events and platform key codes.
//!
//! This crate is the translation layer in between:
//!
//! - **`protocol`** – How bytes travel over the RFB connection.  Client
//!   messages are decoded into typed Rust enums and server messages are
//!   encoded back, including pixel format translation for raw updates.
//!
//! - **`domain`** – Per-client `Session` state, the pointer state machine
//!   that turns button masks into Down/Move/Up/Scroll intents, and the
//!   display projection geometry used when mirroring the screen.
//!
//! - **`keymap`** – Platform key codes and meta-state flags, plus the
//!   keysym table and the modifier-tracking `KeyTranslator`.
//!
//! - **`input`** – Fully-populated key and motion events ready for the
//!   injection service, and the input device descriptions it reports.

pub mod domain;
pub mod input;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `vnc_core::Session` instead of `vnc_core::domain::session::Session`.
pub use domain::pointer::{MotionIntent, PointerButton, PointerTranslator};
pub use domain::projection::{DisplayInfo, DisplayProjection, Orientation, ProjectionError};
pub use domain::session::{ButtonMask, ClientHandle, Session};
pub use input::device::{InputDeviceInfo, MAX_INPUT_DEVICE_COUNT};
pub use input::events::{DeviceId, InjectMode, InputEvent, InputSource, KeyEvent, MotionEvent};
pub use keymap::android::{AndroidKeyCode, MetaState};
pub use keymap::{KeyAction, KeyIntent, KeyTranslator};
pub use protocol::codec::{decode_client_message, ProtocolError};
pub use protocol::messages::{ClientMessage, PixelFormat};
