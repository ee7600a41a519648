//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Media engine binaries and scratch storage.
    pub engine: EngineConfig,

    /// Common encode profile every segment is normalized to.
    pub profile: NormalizeProfile,

    /// Transition defaults.
    pub transitions: TransitionDefaults,

    /// Segment media loading.
    pub loader: LoaderConfig,

    /// Progress reporting cadence.
    pub progress: ProgressConfig,

    /// Template content store.
    pub content_store: ContentStoreConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Media engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// ffmpeg executable (name on PATH or absolute path).
    pub ffmpeg_path: PathBuf,

    /// ffprobe executable (name on PATH or absolute path).
    pub ffprobe_path: PathBuf,

    /// Parent directory for per-job scratch file tables.
    /// `None` uses the system temp directory.
    pub scratch_dir: Option<PathBuf>,
}

/// Encode profile applied during the normalize pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeProfile {
    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Video encoder (e.g., "libx264").
    pub video_codec: String,

    /// Encoder preset.
    pub preset: String,

    /// Constant rate factor (0-51, lower is better).
    pub crf: u8,

    /// Audio encoder.
    pub audio_codec: String,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,
}

/// Transition defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionDefaults {
    /// Duration used when a segment's transition carries none.
    pub duration_secs: f64,
}

/// Segment media loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Origin that site-relative locators (`/default1.mp4`) resolve against.
    /// When unset they resolve against `asset_root` on disk.
    pub base_url: Option<String>,

    /// Directory that relative and site-relative locators resolve against.
    pub asset_root: PathBuf,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum number of segment loads in flight.
    pub max_concurrent_loads: usize,
}

/// Progress reporting cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Heuristic tick interval in milliseconds.
    pub tick_ms: u64,

    /// How long without any progress signal before the heuristic nudges.
    pub stall_window_ms: u64,

    /// Highest value reported before confirmed success.
    pub ceiling: u8,
}

/// Template content store (Sanity HTTP query API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreConfig {
    /// Project identifier.
    pub project_id: String,

    /// Dataset name.
    pub dataset: String,

    /// Dated API version.
    pub api_version: String,

    /// Query the CDN edge instead of the live API.
    pub use_cdn: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "anitemp=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            scratch_dir: None,
        }
    }
}

impl Default for NormalizeProfile {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1280,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            crf: 28,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 128,
        }
    }
}

impl Default for TransitionDefaults {
    fn default() -> Self {
        Self { duration_secs: 1.0 }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            asset_root: PathBuf::from("."),
            timeout_secs: 60,
            max_concurrent_loads: 4,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            stall_window_ms: 1500,
            ceiling: 99,
        }
    }
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            project_id: "3ouodvma".to_string(),
            dataset: "production".to_string(),
            api_version: "2025-02-08".to_string(),
            use_cdn: true,
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
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> crate::AnitempResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
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

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::AnitempResult<()> {
        let profile = &self.profile;
        if profile.width == 0 || profile.height == 0 || profile.fps == 0 {
            return Err(crate::AnitempError::config(
                "profile width, height and fps must be positive",
            ));
        }
        if profile.width % 2 != 0 || profile.height % 2 != 0 {
            return Err(crate::AnitempError::config(
                "profile width and height must be even for yuv420p",
            ));
        }
        if profile.crf > 51 {
            return Err(crate::AnitempError::config("profile crf must be in 0..=51"));
        }
        if !(self.transitions.duration_secs > 0.0) {
            return Err(crate::AnitempError::config(
                "default transition duration must be positive",
            ));
        }
        if self.loader.max_concurrent_loads == 0 {
            return Err(crate::AnitempError::config(
                "max_concurrent_loads must be at least 1",
            ));
        }
        // concat progress starts at 40
        if self.progress.ceiling <= 40 || self.progress.ceiling >= 100 {
            return Err(crate::AnitempError::config(
                "progress ceiling must be in 41..=99",
            ));
        }
        Ok(())
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
    base.join("anitemp").join("config.json")
}
