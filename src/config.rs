//! Configuration file handling for asciiview.
//!
//! Loads configuration from `~/.config/asciiview/config.toml` or a
//! custom path.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ascii::DEFAULT_ROW_STRIDE;
use crate::source::SourceConfig;

/// Configuration file structure for asciiview.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub ascii: AsciiConfig,
}

#[derive(Debug, Deserialize)]
pub struct RenderConfig {
    /// Target render width in pixels
    #[serde(default = "default_width")]
    pub width: u32,
    /// Target render height in pixels
    #[serde(default = "default_height")]
    pub height: u32,
    /// Refresh cadence for motion sources
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CameraConfig {
    /// Camera device index
    #[serde(default)]
    pub device: u32,
    /// Mirror horizontally (selfie mode)
    #[serde(default = "default_true")]
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            mirror: true,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AsciiConfig {
    /// Vertical sampling stride; compensates for glyph cells being
    /// taller than wide. Tune per rendering font.
    #[serde(default = "default_row_stride")]
    pub row_stride: u32,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            row_stride: default_row_stride(),
        }
    }
}

fn default_width() -> u32 {
    400
}

fn default_height() -> u32 {
    300
}

fn default_fps() -> u32 {
    30
}

fn default_row_stride() -> u32 {
    DEFAULT_ROW_STRIDE
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// The source config implied by the render section.
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            width: self.render.width,
            height: self.render.height,
            locator: None,
            refresh_fps: self.render.fps,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    directories::ProjectDirs::from("com", "asciiview", "asciiview")
        .map(|d| d.config_dir().to_path_buf().join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/asciiview/config.toml")
        })
}
