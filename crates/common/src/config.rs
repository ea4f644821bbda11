//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Default synthesis settings.
    pub synthesis: SynthesisDefaults,

    /// Default render settings.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default speech synthesis parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisDefaults {
    /// Default voice short name.
    pub voice: String,

    /// Pitch adjustment in Hz, integer in [-100, 100].
    pub pitch: i32,

    /// Rate adjustment in percent, [-100, 100].
    pub rate: f64,

    /// Volume adjustment in percent, integer in [-100, 100].
    pub volume: i32,

    /// Whether to write a caption sidecar by default.
    pub caption: bool,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderDefaults {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Directory rendered videos are written to.
    pub output_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "clipcast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            voice: "en-US-AnaNeural".to_string(),
            pitch: 0,
            rate: 0.0,
            volume: 0,
            caption: true,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            output_dir: dirs_default_videos(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("clipcast").join("config.json")
}

/// Default output directory for rendered videos.
fn dirs_default_videos() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join("Videos").join("clipcast")
}
