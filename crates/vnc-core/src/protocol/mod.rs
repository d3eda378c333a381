//! RFB protocol module containing message types, the binary codec, and
//! pixel format translation.

pub mod codec;
pub mod messages;
pub mod pixel;

pub use codec::{
    decode_client_message, decode_server_init, encode_client_message, encode_protocol_version,
    encode_raw_update, encode_server_init, parse_protocol_version, ProtocolError,
    RAW_UPDATE_HEADER_LEN,
};
pub use messages::*;
pub use pixel::{encode_region, validate_pixel_format};
