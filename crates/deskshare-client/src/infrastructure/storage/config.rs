//! TOML-based configuration for the screen-sharing client.
//!
//! Reads `ClientConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\DeskShare\config.toml`
//! - Linux:    `~/.config/deskshare/config.toml`
//! - macOS:    `~/Library/Application Support/DeskShare/config.toml`
//!
//! Example file:
//!
//! ```toml
//! log_level = "debug"
//!
//! [signaling]
//! url = "wss://signal.example.org/ws"
//! room = "222222"
//!
//! [capture]
//! video = true
//! audio = false
//!
//! [[ice_servers]]
//! urls = "turn:121.41.76.43:3478"
//! username = "huang"
//! credential = "123456"
//! ```
//!
//! Every field has a serde default, so a missing file, an empty file, and a
//! file written by an older version all load.

use std::path::{Path, PathBuf};

use deskshare_core::domain::config::DEFAULT_ROOM;
use deskshare_core::{CaptureConstraints, IceConfig, IceServer, OfferOptions, SessionConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub signaling: SignalingConfig,

    #[serde(default)]
    pub capture: CaptureConstraints,

    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<IceServer>,
}

/// Where the signaling server is and which room to join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalingConfig {
    /// WebSocket URL of the signaling server (`ws://` or `wss://`).
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_room")]
    pub room: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_url() -> String {
    "ws://127.0.0.1:3000".to_string()
}
fn default_room() -> String {
    DEFAULT_ROOM.to_string()
}
fn default_ice_servers() -> Vec<IceServer> {
    IceConfig::default().servers
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            room: default_room(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            signaling: SignalingConfig::default(),
            capture: CaptureConstraints::default(),
            ice_servers: default_ice_servers(),
        }
    }
}

impl ClientConfig {
    /// Builds the session configuration the controller runs with.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            room_id: self.signaling.room.clone(),
            ice: IceConfig::new(self.ice_servers.clone()),
            capture: self.capture,
            offer: OfferOptions::default(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)?
        .join("config.toml"))
}

/// Loads `ClientConfig` from `path`, returning the defaults if the file does
/// not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Loads `ClientConfig` from the platform default location.
///
/// Falls back to the defaults when no platform config directory exists.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(ConfigError::NoPlatformConfigDir) => Ok(ClientConfig::default()),
        Err(e) => Err(e),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config base directory including the `DeskShare`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("DeskShare"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("deskshare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DeskShare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
