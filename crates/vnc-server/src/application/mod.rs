//! Application layer: the capture and input use cases.
//!
//! # What lives here? (for beginners)
//!
//! This layer wires the pure translators from `vnc-core` to the outside
//! world through traits, without knowing which concrete implementation sits
//! behind each trait:
//!
//! - **`frame_capture`**  – Single-slot frame hand-off from the compositor
//!   callback to the publish loop, plus the shared framebuffer served to
//!   viewers.  The [`frame_capture::FrameRenderer`] trait hides the GPU.
//!
//! - **`inject_input`**   – Connection to the input service with death
//!   handling and lazy reconnect, and the device registry that picks
//!   touchscreen and keyboard ids.
//!
//! - **`remote_display`** – Session table and the per-viewer callbacks the
//!   protocol front-end invokes.
//!
//! - **`publish_loop`**   – The loop that requests frames and marks the
//!   framebuffer modified until the stop flag is cleared.
//!
//! Nothing in this layer opens sockets or touches the file system.

pub mod frame_capture;
pub mod inject_input;
pub mod publish_loop;
pub mod remote_display;
