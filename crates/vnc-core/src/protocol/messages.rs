//! RFB protocol message definitions.
//!
//! Covers the passive server subset of RFC 6143: version and security
//! handshake, `ServerInit`, the six client-to-server messages, and raw
//! `FramebufferUpdate` rectangles.  All multi-byte integers on the wire are
//! big-endian.

use serde::{Deserialize, Serialize};

/// Version string the server announces (RFB 3.8).
pub const SERVER_PROTOCOL_VERSION: &[u8; 12] = b"RFB 003.008\n";

/// Length of a `ProtocolVersion` message.
pub const PROTOCOL_VERSION_LEN: usize = 12;

/// Length of a `PIXEL_FORMAT` structure.
pub const PIXEL_FORMAT_LEN: usize = 16;

/// Upper bound on accepted `ClientCutText` payloads.
pub const MAX_CUT_TEXT_LEN: usize = 1 << 20;

/// Security type identifiers.
pub mod security {
    pub const INVALID: u8 = 0;
    pub const NONE: u8 = 1;
    pub const VNC_AUTH: u8 = 2;

    /// `SecurityResult` value for success.
    pub const RESULT_OK: u32 = 0;
}

/// Encoding type identifiers.
pub mod encoding {
    pub const RAW: i32 = 0;
    pub const COPY_RECT: i32 = 1;
    pub const RRE: i32 = 2;
    pub const HEXTILE: i32 = 5;
    pub const ZRLE: i32 = 16;
    pub const CURSOR_PSEUDO: i32 = -239;
    pub const DESKTOP_SIZE_PSEUDO: i32 = -223;
}

/// Client-to-server message type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ClientMessageType {
    SetPixelFormat = 0,
    SetEncodings = 2,
    FramebufferUpdateRequest = 3,
    KeyEvent = 4,
    PointerEvent = 5,
    ClientCutText = 6,
}

impl TryFrom<u8> for ClientMessageType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ClientMessageType::SetPixelFormat),
            2 => Ok(ClientMessageType::SetEncodings),
            3 => Ok(ClientMessageType::FramebufferUpdateRequest),
            4 => Ok(ClientMessageType::KeyEvent),
            5 => Ok(ClientMessageType::PointerEvent),
            6 => Ok(ClientMessageType::ClientCutText),
            other => Err(other),
        }
    }
}

/// Server-to-client message type bytes.
pub mod server_message {
    pub const FRAMEBUFFER_UPDATE: u8 = 0;
    pub const SET_COLOUR_MAP_ENTRIES: u8 = 1;
    pub const BELL: u8 = 2;
    pub const SERVER_CUT_TEXT: u8 = 3;
}

/// Negotiated protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V3_3,
    V3_7,
    V3_8,
}

/// How pixel values are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub depth: u8,
    pub big_endian: bool,
    pub true_colour: bool,
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The server's native format: 32 bpp little-endian with red in the
    /// lowest byte, i.e. the RGBA8888 byte order of the capture buffer.
    pub const fn rgba8888() -> Self {
        Self {
            bits_per_pixel: 32,
            depth: 24,
            big_endian: false,
            true_colour: true,
            red_max: 255,
            green_max: 255,
            blue_max: 255,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        usize::from(self.bits_per_pixel / 8)
    }

    /// Serializes into the 16-byte `PIXEL_FORMAT` structure.
    pub fn to_bytes(&self) -> [u8; PIXEL_FORMAT_LEN] {
        let mut b = [0u8; PIXEL_FORMAT_LEN];
        b[0] = self.bits_per_pixel;
        b[1] = self.depth;
        b[2] = u8::from(self.big_endian);
        b[3] = u8::from(self.true_colour);
        b[4..6].copy_from_slice(&self.red_max.to_be_bytes());
        b[6..8].copy_from_slice(&self.green_max.to_be_bytes());
        b[8..10].copy_from_slice(&self.blue_max.to_be_bytes());
        b[10] = self.red_shift;
        b[11] = self.green_shift;
        b[12] = self.blue_shift;
        // b[13..16] is padding
        b
    }

    /// Parses the 16-byte `PIXEL_FORMAT` structure.
    pub fn from_bytes(b: &[u8; PIXEL_FORMAT_LEN]) -> Self {
        Self {
            bits_per_pixel: b[0],
            depth: b[1],
            big_endian: b[2] != 0,
            true_colour: b[3] != 0,
            red_max: u16::from_be_bytes([b[4], b[5]]),
            green_max: u16::from_be_bytes([b[6], b[7]]),
            blue_max: u16::from_be_bytes([b[8], b[9]]),
            red_shift: b[10],
            green_shift: b[11],
            blue_shift: b[12],
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        Self::rgba8888()
    }
}

/// Rectangle in framebuffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rectangle {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    pub fn full(width: u16, height: u16) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Clips the rectangle to a `width` × `height` framebuffer.
    ///
    /// Returns `None` if nothing of it lies inside.
    pub fn clip(&self, width: u16, height: u16) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let right = (u32::from(self.x) + u32::from(self.width)).min(u32::from(width));
        let bottom = (u32::from(self.y) + u32::from(self.height)).min(u32::from(height));
        let clipped = Self {
            x: self.x,
            y: self.y,
            width: (right - u32::from(self.x)) as u16,
            height: (bottom - u32::from(self.y)) as u16,
        };
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// `ServerInit`: sent once after `ClientInit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInit {
    pub width: u16,
    pub height: u16,
    pub pixel_format: PixelFormat,
    pub name: String,
}

/// A decoded client-to-server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    SetPixelFormat(PixelFormat),
    SetEncodings(Vec<i32>),
    FramebufferUpdateRequest {
        incremental: bool,
        region: Rectangle,
    },
    KeyEvent {
        down: bool,
        keysym: u32,
    },
    PointerEvent {
        button_mask: u8,
        x: u16,
        y: u16,
    },
    /// Latin-1 clipboard text; accepted and ignored by the server.
    ClientCutText(Vec<u8>),
}

impl ClientMessage {
    pub fn message_type(&self) -> ClientMessageType {
        match self {
            ClientMessage::SetPixelFormat(_) => ClientMessageType::SetPixelFormat,
            ClientMessage::SetEncodings(_) => ClientMessageType::SetEncodings,
            ClientMessage::FramebufferUpdateRequest { .. } => {
                ClientMessageType::FramebufferUpdateRequest
            }
            ClientMessage::KeyEvent { .. } => ClientMessageType::KeyEvent,
            ClientMessage::PointerEvent { .. } => ClientMessageType::PointerEvent,
            ClientMessage::ClientCutText(_) => ClientMessageType::ClientCutText,
        }
    }
}
