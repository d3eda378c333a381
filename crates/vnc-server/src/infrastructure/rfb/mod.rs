//! RFB (VNC) front-end over TCP.
//!
//! Implements the passive server side of RFB 3.3/3.7/3.8 with security type
//! None and raw encoding.  Every viewer gets two halves:
//!
//! - a reader that decodes client messages and calls the
//!   [`RemoteDisplayServer`](crate::application::remote_display::RemoteDisplayServer)
//!   callbacks;
//! - a writer task that answers update requests from the shared framebuffer.

pub mod server;
pub mod session;

use thiserror::Error;
use vnc_core::ProtocolError;

pub use server::{bind_listener, serve};

/// Errors that end a single viewer session.
#[derive(Debug, Error)]
pub enum RfbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The viewer picked a security type other than None.
    #[error("viewer chose unsupported security type {0}")]
    UnsupportedSecurity(u8),

    #[error("update writer task failed: {0}")]
    WriterTask(#[from] tokio::task::JoinError),
}
