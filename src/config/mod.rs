//! Application Configuration
//!
//! Scanner settings stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera settings
    pub camera: CameraSettings,
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// Overlay settings
    pub overlay: OverlaySettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Camera-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Frames come from a front-facing sensor and need mirroring
    pub front_facing: bool,
    /// Delay between frames when pacing a replayed source
    pub frame_interval_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            front_facing: false,
            frame_interval_ms: 33,
        }
    }
}

impl CameraSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// Text recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Threads in the recognition runtime
    pub worker_threads: usize,
    /// Maximum OCR requests in flight at once
    pub max_in_flight: usize,
    /// Per-request timeout in milliseconds (0 = no timeout)
    pub timeout_ms: u64,
    /// Accept plates whose box left the overlay before the result arrived
    pub accept_orphaned_plates: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            max_in_flight: 8,
            timeout_ms: 2000,
            accept_orphaned_plates: false,
        }
    }
}

impl RecognitionSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Overlay drawing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Padding around labels drawn above boxes, in display pixels
    pub label_padding: f32,
    /// Label text height, in display pixels
    pub label_text_height: f32,
    /// Stroke width of boxes in snapshots
    pub box_thickness: u32,
    /// TrueType/OpenType font for snapshot labels; labels are skipped without one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            label_padding: 12.0,
            label_text_height: 50.0,
            box_thickness: 4,
            font_path: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by RUST_LOG)
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default configuration file location
pub fn default_config_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "platescanner", "PlateScanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config {:?}", path))?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
