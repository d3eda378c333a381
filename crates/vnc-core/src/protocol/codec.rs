//! Binary codec for RFB handshake and session messages.
//!
//! Client messages are variable-length and not length-prefixed, so the
//! decoder works on a byte buffer that may hold a partial message:
//! [`decode_client_message`] either returns one message plus the number of
//! bytes it consumed, or [`ProtocolError::InsufficientData`] telling the
//! caller to read more.
//!
//! ```text
//! SetPixelFormat           [0][pad:3][pixel-format:16]
//! SetEncodings             [2][pad:1][count:2][encoding:4 × count]
//! FramebufferUpdateRequest [3][incremental:1][x:2][y:2][w:2][h:2]
//! KeyEvent                 [4][down:1][pad:2][keysym:4]
//! PointerEvent             [5][mask:1][x:2][y:2]
//! ClientCutText            [6][pad:3][length:4][text:length]
//! ```

use thiserror::Error;

use crate::protocol::messages::{
    encoding, server_message, ClientMessage, ClientMessageType, PixelFormat, ProtocolVersion,
    Rectangle, ServerInit, MAX_CUT_TEXT_LEN, PIXEL_FORMAT_LEN, PROTOCOL_VERSION_LEN,
};

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the message requires.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte is not a recognized client message.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// The `ProtocolVersion` string is malformed or not RFB 3.x.
    #[error("invalid protocol version: {0:?}")]
    InvalidVersion(String),

    /// The requested pixel format cannot be served.
    #[error("unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    /// A field value is out of range.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

fn require(bytes: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if bytes.len() < needed {
        return Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

// ── Handshake ─────────────────────────────────────────────────────────────────

/// Parses the 12-byte `ProtocolVersion` message sent by the viewer.
///
/// Minor versions 3.4–3.6 are treated as 3.3 and anything above 3.8 as 3.8.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidVersion`] for anything that is not
/// `"RFB 003.xxx\n"`.
pub fn parse_protocol_version(bytes: &[u8]) -> Result<ProtocolVersion, ProtocolError> {
    require(bytes, PROTOCOL_VERSION_LEN)?;
    let raw = &bytes[..PROTOCOL_VERSION_LEN];
    let invalid = || ProtocolError::InvalidVersion(String::from_utf8_lossy(raw).into_owned());

    if &raw[..4] != b"RFB " || raw[7] != b'.' || raw[11] != b'\n' {
        return Err(invalid());
    }
    let digits = |s: &[u8]| -> Option<u32> {
        std::str::from_utf8(s).ok().and_then(|t| t.parse::<u32>().ok())
    };
    let major = digits(&raw[4..7]).ok_or_else(invalid)?;
    let minor = digits(&raw[8..11]).ok_or_else(invalid)?;
    if major != 3 {
        return Err(invalid());
    }
    Ok(match minor {
        0..=6 => ProtocolVersion::V3_3,
        7 => ProtocolVersion::V3_7,
        _ => ProtocolVersion::V3_8,
    })
}

/// Encodes `version` as the 12-byte `ProtocolVersion` message.
pub fn encode_protocol_version(version: ProtocolVersion) -> [u8; PROTOCOL_VERSION_LEN] {
    match version {
        ProtocolVersion::V3_3 => *b"RFB 003.003\n",
        ProtocolVersion::V3_7 => *b"RFB 003.007\n",
        ProtocolVersion::V3_8 => *b"RFB 003.008\n",
    }
}

/// Encodes `ServerInit`.
pub fn encode_server_init(init: &ServerInit) -> Vec<u8> {
    let name = init.name.as_bytes();
    let mut buf = Vec::with_capacity(24 + name.len());
    buf.extend_from_slice(&init.width.to_be_bytes());
    buf.extend_from_slice(&init.height.to_be_bytes());
    buf.extend_from_slice(&init.pixel_format.to_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_be_bytes());
    buf.extend_from_slice(name);
    buf
}

/// Decodes `ServerInit`, returning it and the bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if `bytes` is incomplete.
pub fn decode_server_init(bytes: &[u8]) -> Result<(ServerInit, usize), ProtocolError> {
    require(bytes, 24)?;
    let name_len = be_u32(bytes, 20) as usize;
    require(bytes, 24 + name_len)?;
    let mut pf = [0u8; PIXEL_FORMAT_LEN];
    pf.copy_from_slice(&bytes[4..20]);
    let init = ServerInit {
        width: be_u16(bytes, 0),
        height: be_u16(bytes, 2),
        pixel_format: PixelFormat::from_bytes(&pf),
        name: String::from_utf8_lossy(&bytes[24..24 + name_len]).into_owned(),
    };
    Ok((init, 24 + name_len))
}

// ── Client messages ───────────────────────────────────────────────────────────

/// Decodes one [`ClientMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message and the number of bytes consumed, so the
/// caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] when `bytes` holds only part
/// of a message, and other [`ProtocolError`] variants for malformed input.
///
/// # Examples
///
/// ```rust
/// use vnc_core::protocol::{decode_client_message, ClientMessage};
///
/// let bytes = [5u8, 0x01, 0x00, 0x0A, 0x00, 0x14];
/// let (msg, n) = decode_client_message(&bytes).unwrap();
/// assert_eq!(msg, ClientMessage::PointerEvent { button_mask: 1, x: 10, y: 20 });
/// assert_eq!(n, 6);
/// ```
pub fn decode_client_message(bytes: &[u8]) -> Result<(ClientMessage, usize), ProtocolError> {
    require(bytes, 1)?;
    let msg_type =
        ClientMessageType::try_from(bytes[0]).map_err(ProtocolError::UnknownMessageType)?;

    match msg_type {
        ClientMessageType::SetPixelFormat => {
            require(bytes, 4 + PIXEL_FORMAT_LEN)?;
            let mut pf = [0u8; PIXEL_FORMAT_LEN];
            pf.copy_from_slice(&bytes[4..4 + PIXEL_FORMAT_LEN]);
            Ok((
                ClientMessage::SetPixelFormat(PixelFormat::from_bytes(&pf)),
                4 + PIXEL_FORMAT_LEN,
            ))
        }
        ClientMessageType::SetEncodings => {
            require(bytes, 4)?;
            let count = usize::from(be_u16(bytes, 2));
            let total = 4 + count * 4;
            require(bytes, total)?;
            let encodings = (0..count)
                .map(|i| be_u32(bytes, 4 + i * 4) as i32)
                .collect();
            Ok((ClientMessage::SetEncodings(encodings), total))
        }
        ClientMessageType::FramebufferUpdateRequest => {
            require(bytes, 10)?;
            Ok((
                ClientMessage::FramebufferUpdateRequest {
                    incremental: bytes[1] != 0,
                    region: Rectangle {
                        x: be_u16(bytes, 2),
                        y: be_u16(bytes, 4),
                        width: be_u16(bytes, 6),
                        height: be_u16(bytes, 8),
                    },
                },
                10,
            ))
        }
        ClientMessageType::KeyEvent => {
            require(bytes, 8)?;
            Ok((
                ClientMessage::KeyEvent {
                    down: bytes[1] != 0,
                    keysym: be_u32(bytes, 4),
                },
                8,
            ))
        }
        ClientMessageType::PointerEvent => {
            require(bytes, 6)?;
            Ok((
                ClientMessage::PointerEvent {
                    button_mask: bytes[1],
                    x: be_u16(bytes, 2),
                    y: be_u16(bytes, 4),
                },
                6,
            ))
        }
        ClientMessageType::ClientCutText => {
            require(bytes, 8)?;
            let len = be_u32(bytes, 4) as usize;
            if len > MAX_CUT_TEXT_LEN {
                return Err(ProtocolError::MalformedPayload(format!(
                    "cut text length {len} exceeds {MAX_CUT_TEXT_LEN}"
                )));
            }
            require(bytes, 8 + len)?;
            Ok((
                ClientMessage::ClientCutText(bytes[8..8 + len].to_vec()),
                8 + len,
            ))
        }
    }
}

/// Encodes a [`ClientMessage`] the way a viewer sends it.
pub fn encode_client_message(msg: &ClientMessage) -> Vec<u8> {
    let mut buf = vec![msg.message_type() as u8];
    match msg {
        ClientMessage::SetPixelFormat(pf) => {
            buf.extend_from_slice(&[0; 3]);
            buf.extend_from_slice(&pf.to_bytes());
        }
        ClientMessage::SetEncodings(encodings) => {
            buf.push(0);
            buf.extend_from_slice(&(encodings.len() as u16).to_be_bytes());
            for e in encodings {
                buf.extend_from_slice(&e.to_be_bytes());
            }
        }
        ClientMessage::FramebufferUpdateRequest {
            incremental,
            region,
        } => {
            buf.push(u8::from(*incremental));
            buf.extend_from_slice(&region.x.to_be_bytes());
            buf.extend_from_slice(&region.y.to_be_bytes());
            buf.extend_from_slice(&region.width.to_be_bytes());
            buf.extend_from_slice(&region.height.to_be_bytes());
        }
        ClientMessage::KeyEvent { down, keysym } => {
            buf.push(u8::from(*down));
            buf.extend_from_slice(&[0; 2]);
            buf.extend_from_slice(&keysym.to_be_bytes());
        }
        ClientMessage::PointerEvent { button_mask, x, y } => {
            buf.push(*button_mask);
            buf.extend_from_slice(&x.to_be_bytes());
            buf.extend_from_slice(&y.to_be_bytes());
        }
        ClientMessage::ClientCutText(text) => {
            buf.extend_from_slice(&[0; 3]);
            buf.extend_from_slice(&(text.len() as u32).to_be_bytes());
            buf.extend_from_slice(text);
        }
    }
    buf
}

// ── Server messages ───────────────────────────────────────────────────────────

/// Length of the `FramebufferUpdate` header plus one rectangle header.
pub const RAW_UPDATE_HEADER_LEN: usize = 4 + 12;

/// Encodes a `FramebufferUpdate` with a single raw-encoded rectangle.
///
/// `pixels` must already be in the client's pixel format.
pub fn encode_raw_update(region: Rectangle, pixels: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RAW_UPDATE_HEADER_LEN + pixels.len());
    buf.push(server_message::FRAMEBUFFER_UPDATE);
    buf.push(0); // padding
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&region.x.to_be_bytes());
    buf.extend_from_slice(&region.y.to_be_bytes());
    buf.extend_from_slice(&region.width.to_be_bytes());
    buf.extend_from_slice(&region.height.to_be_bytes());
    buf.extend_from_slice(&encoding::RAW.to_be_bytes());
    buf.extend_from_slice(pixels);
    buf
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::SERVER_PROTOCOL_VERSION;

    #[test]
    fn test_parse_protocol_version_3_8() {
        assert_eq!(
            parse_protocol_version(b"RFB 003.008\n"),
            Ok(ProtocolVersion::V3_8)
        );
    }

    #[test]
    fn test_parse_protocol_version_legacy_minors_fall_back_to_3_3() {
        assert_eq!(
            parse_protocol_version(b"RFB 003.005\n"),
            Ok(ProtocolVersion::V3_3)
        );
        assert_eq!(
            parse_protocol_version(b"RFB 003.007\n"),
            Ok(ProtocolVersion::V3_7)
        );
        // Apple Remote Desktop announces 3.889.
        assert_eq!(
            parse_protocol_version(b"RFB 003.889\n"),
            Ok(ProtocolVersion::V3_8)
        );
    }

    #[test]
    fn test_encoded_version_parses_back() {
        for version in [ProtocolVersion::V3_3, ProtocolVersion::V3_7, ProtocolVersion::V3_8] {
            assert_eq!(parse_protocol_version(&encode_protocol_version(version)), Ok(version));
        }
        assert_eq!(&encode_protocol_version(ProtocolVersion::V3_8), SERVER_PROTOCOL_VERSION);
    }

    #[test]
    fn test_parse_protocol_version_rejects_garbage() {
        assert!(matches!(
            parse_protocol_version(b"GET / HTTP/1"),
            Err(ProtocolError::InvalidVersion(_))
        ));
        assert!(matches!(
            parse_protocol_version(b"RFB 004.000\n"),
            Err(ProtocolError::InvalidVersion(_))
        ));
    }

    #[test]
    fn test_parse_protocol_version_short_input() {
        assert_eq!(
            parse_protocol_version(b"RFB 003"),
            Err(ProtocolError::InsufficientData {
                needed: 12,
                available: 7
            })
        );
    }

    #[test]
    fn test_server_init_layout() {
        // Arrange
        let init = ServerInit {
            width: 1280,
            height: 720,
            pixel_format: PixelFormat::rgba8888(),
            name: "ReDroid".to_string(),
        };

        // Act
        let bytes = encode_server_init(&init);

        // Assert
        assert_eq!(&bytes[0..4], &[0x05, 0x00, 0x02, 0xD0]);
        assert_eq!(bytes[4], 32); // bits-per-pixel
        assert_eq!(bytes[5], 24); // depth
        assert_eq!(bytes[6], 0); // little endian
        assert_eq!(bytes[7], 1); // true colour
        assert_eq!(&bytes[14..17], &[0, 8, 16]); // shifts
        assert_eq!(&bytes[20..24], &7u32.to_be_bytes());
        assert_eq!(&bytes[24..], b"ReDroid");

        let (decoded, n) = decode_server_init(&bytes).expect("decode");
        assert_eq!(decoded, init);
        assert_eq!(n, bytes.len());
    }

    #[test]
    fn test_decode_key_event() {
        let bytes = [4u8, 1, 0, 0, 0x00, 0x00, 0xFF, 0x0D];
        let (msg, n) = decode_client_message(&bytes).expect("decode");
        assert_eq!(
            msg,
            ClientMessage::KeyEvent {
                down: true,
                keysym: 0xFF0D
            }
        );
        assert_eq!(n, 8);
    }

    #[test]
    fn test_decode_update_request() {
        let bytes = [3u8, 1, 0, 10, 0, 20, 0x01, 0x00, 0x00, 0x80];
        let (msg, _) = decode_client_message(&bytes).expect("decode");
        assert_eq!(
            msg,
            ClientMessage::FramebufferUpdateRequest {
                incremental: true,
                region: Rectangle {
                    x: 10,
                    y: 20,
                    width: 256,
                    height: 128
                }
            }
        );
    }

    #[test]
    fn test_decode_set_encodings_with_negative_pseudo_encoding() {
        let msg = ClientMessage::SetEncodings(vec![encoding::RAW, encoding::DESKTOP_SIZE_PSEUDO]);
        let bytes = encode_client_message(&msg);
        assert_eq!(bytes.len(), 4 + 8);
        let (decoded, n) = decode_client_message(&bytes).expect("decode");
        assert_eq!(decoded, msg);
        assert_eq!(n, 12);
    }

    #[test]
    fn test_decode_partial_set_encodings_asks_for_more() {
        let msg = ClientMessage::SetEncodings(vec![0, 1, 5]);
        let bytes = encode_client_message(&msg);
        assert_eq!(
            decode_client_message(&bytes[..9]),
            Err(ProtocolError::InsufficientData {
                needed: 16,
                available: 9
            })
        );
    }

    #[test]
    fn test_decode_set_pixel_format() {
        let mut pf = PixelFormat::rgba8888();
        pf.bits_per_pixel = 16;
        pf.depth = 16;
        pf.red_max = 31;
        pf.green_max = 63;
        pf.blue_max = 31;
        pf.red_shift = 11;
        pf.green_shift = 5;
        pf.blue_shift = 0;
        let bytes = encode_client_message(&ClientMessage::SetPixelFormat(pf));
        assert_eq!(bytes.len(), 20);
        let (decoded, _) = decode_client_message(&bytes).expect("decode");
        assert_eq!(decoded, ClientMessage::SetPixelFormat(pf));
    }

    #[test]
    fn test_decode_cut_text() {
        let bytes = encode_client_message(&ClientMessage::ClientCutText(b"hi".to_vec()));
        let (decoded, n) = decode_client_message(&bytes).expect("decode");
        assert_eq!(decoded, ClientMessage::ClientCutText(b"hi".to_vec()));
        assert_eq!(n, 10);
    }

    #[test]
    fn test_decode_oversized_cut_text_is_rejected() {
        let mut bytes = vec![6u8, 0, 0, 0];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            decode_client_message(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        assert_eq!(
            decode_client_message(&[1u8, 0, 0]),
            Err(ProtocolError::UnknownMessageType(1))
        );
    }

    #[test]
    fn test_decode_empty_buffer() {
        assert_eq!(
            decode_client_message(&[]),
            Err(ProtocolError::InsufficientData {
                needed: 1,
                available: 0
            })
        );
    }

    #[test]
    fn test_raw_update_layout() {
        let region = Rectangle {
            x: 1,
            y: 2,
            width: 1,
            height: 1,
        };
        let bytes = encode_raw_update(region, &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 1, 0, 1, 0, 2, 0, 1, 0, 1, 0, 0, 0, 0, 0xAA, 0xBB, 0xCC, 0xDD]
        );
    }
}
