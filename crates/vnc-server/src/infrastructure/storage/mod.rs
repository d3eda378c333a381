//! Configuration file storage.

pub mod config;
