//! Domain entities for the VNC server.
//!
//! This module contains pure logic with no infrastructure dependencies.
//!
//! # What lives here? (for beginners)
//!
//! - **`session`** – the state the server keeps for one connected viewer:
//!   which pointer buttons were held on the previous event, where the
//!   pointer was, and which modifier keys are latched.
//!
//! - **`pointer`** – the state machine that compares the current button
//!   mask with the previous one and decides whether the viewer pressed,
//!   dragged, released, or scrolled.
//!
//! - **`projection`** – the geometry that fits the device display into the
//!   served framebuffer, preserving aspect ratio and handling rotation.
//!
//! None of these types know about sockets or the input service; they can be
//! compiled and tested anywhere.

pub mod pointer;
pub mod projection;
pub mod session;
