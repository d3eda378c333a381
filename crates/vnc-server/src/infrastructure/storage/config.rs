//! TOML-based configuration for the VNC server.
//!
//! Reads `ServerConfig` from the platform-appropriate config file:
//! - Linux:    `~/.config/redroid-vnc/config.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/ReDroidVNC/config.toml`
//! - Windows:  `%APPDATA%\ReDroidVNC\config.toml`
//!
//! Example:
//!
//! ```toml
//! [server]
//! desktop_name = "ReDroid"
//! port = 5900
//!
//! [display]
//! width = 720
//! height = 1280
//! rotate = false
//!
//! [input]
//! inject_mode = "async"
//! ```
//!
//! Every field has a `#[serde(default = ...)]`, so a missing file, a missing
//! section, or a missing key all fall back to the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vnc_core::InjectMode;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Failures while locating, reading or writing `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `XDG_CONFIG_HOME`/`HOME` (or the platform equivalent) is set.
    #[error("no config directory for redroid-vnc on this platform")]
    NoPlatformConfigDir,

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config.toml: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot encode server config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Sections ──────────────────────────────────────────────────────────────────

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub synthetic: SyntheticSection,
}

/// RFB listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// Name shown in the viewer's title bar.
    #[serde(default = "default_desktop_name")]
    pub desktop_name: String,
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Served framebuffer geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplaySection {
    /// Framebuffer width; 0 uses the display's native width.
    #[serde(default)]
    pub width: u32,
    /// Framebuffer height; 0 uses the display's native height.
    #[serde(default)]
    pub height: u32,
    /// Rotate the projected image by 90 degrees.
    #[serde(default)]
    pub rotate: bool,
    /// How long the publish loop waits for a frame before re-checking the
    /// stop flag.
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,
}

/// Input service settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSection {
    /// Name the input service is registered under.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub inject_mode: InjectMode,
}

/// Geometry of the synthetic display used when no compositor is present.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyntheticSection {
    #[serde(default = "default_synthetic_width")]
    pub width: u32,
    #[serde(default = "default_synthetic_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// 0, 90, 180 or 270.
    #[serde(default)]
    pub orientation: u32,
}

impl DisplaySection {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

fn default_desktop_name() -> String {
    "ReDroid".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5900
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_frame_timeout_ms() -> u64 {
    100
}
fn default_service_name() -> String {
    "input".to_string()
}
fn default_synthetic_width() -> u32 {
    1280
}
fn default_synthetic_height() -> u32 {
    720
}
fn default_fps() -> u32 {
    30
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            desktop_name: default_desktop_name(),
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            rotate: false,
            frame_timeout_ms: default_frame_timeout_ms(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            inject_mode: InjectMode::default(),
        }
    }
}

impl Default for SyntheticSection {
    fn default() -> Self {
        Self {
            width: default_synthetic_width(),
            height: default_synthetic_height(),
            fps: default_fps(),
            orientation: 0,
        }
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

/// Directory holding `config.toml`.
///
/// # Errors
///
/// [`ConfigError::NoPlatformConfigDir`] if the environment names no base
/// directory.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Default location of `config.toml`.
///
/// # Errors
///
/// See [`config_dir`].
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads the config from the default location.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `ServerConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// [`ConfigError::Io`] when the file exists but cannot be read;
/// [`ConfigError::Parse`] when it is not valid for [`ServerConfig`].
pub fn load_config_from(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// [`ConfigError::Io`] if the directory or file cannot be written.
pub fn save_config_to(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    let text = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ReDroidVNC"))
    }

    #[cfg(target_os = "linux")]
    {
        match std::env::var_os("XDG_CONFIG_HOME") {
            Some(xdg) => Some(PathBuf::from(xdg).join("redroid-vnc")),
            None => std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/redroid-vnc")),
        }
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(|h| PathBuf::from(h).join("Library").join("Application Support").join("ReDroidVNC"))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
