//! Infrastructure layer for the VNC server.
//!
//! Contains the outward-facing adapters: the RFB TCP front-end, the display
//! collaborators, the input service adapters, and config file storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `vnc_core`,
//! but MUST NOT be imported by the `application` layer outside its tests.

pub mod display;
pub mod input_service;
pub mod rfb;
pub mod storage;
