// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{app_info, camera, heart_rate, shutter, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which compositor renders brightness and contrast
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositorPreference {
    /// Probe at startup and use the native filter when available
    #[default]
    Auto,
    /// Always use the native filter path
    Native,
    /// Always use the multiply/screen/overlay approximation
    Manual,
}

/// Aperture → tone mapping
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BrightnessCurve {
    /// Log-space interpolation between 3.6 and 0.12, neutral saturation
    #[default]
    LogCurve,
    /// Gamma curve with aperture-dependent saturation
    PixelGamma,
}

/// BPM → exposure duration mapping
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutterPolicy {
    /// Shutter reads as 1/BPM seconds
    #[default]
    ReciprocalBpm,
    /// Power law anchored at 200 BPM, amplifies slow heart rates
    PowerLaw,
}

/// Aperture-driven blur
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlurMode {
    /// Blur radius inversely proportional to the aperture value
    #[default]
    DepthOfField,
    /// No aperture blur
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Flip front-camera frames so they match the rear camera orientation
    pub unmirror_front_camera: bool,
    /// Preview render rate (Hz)
    pub preview_fps: u32,
    /// Exposure loop rate (Hz), independent of the camera frame rate
    pub synthetic_frame_rate: u32,
    /// Heart-rate measurement window in seconds
    pub measurement_secs: u64,
    /// BPM stored when measurement fails or is skipped
    pub default_bpm: u32,
    /// Measured BPM is clamped into [bpm_clamp_min, bpm_clamp_max]
    pub bpm_clamp_min: u32,
    pub bpm_clamp_max: u32,
    /// Captures wider than this are scaled down
    pub max_capture_width: u32,
    pub compositor: CompositorPreference,
    pub brightness_curve: BrightnessCurve,
    pub shutter_policy: ShutterPolicy,
    /// Sensitivity of the power-law shutter policy (2.0 - 3.5)
    pub power_law_sensitivity: f64,
    pub blur: BlurMode,
    /// Append the exposure time (`_SS1-72`) to capture filenames
    pub shutter_suffix: bool,
    /// Default participant label for filenames
    pub participant: Option<String>,
    /// Default room label for filenames
    pub room: Option<String>,
    /// Override for the photo store directory
    pub photo_dir: Option<PathBuf>,
    /// Override for the download fallback directory
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unmirror_front_camera: true,
            preview_fps: timing::PREVIEW_FPS,
            synthetic_frame_rate: timing::SYNTHETIC_FRAME_RATE,
            measurement_secs: heart_rate::MEASUREMENT_SECS,
            default_bpm: heart_rate::DEFAULT_BPM,
            bpm_clamp_min: heart_rate::CLAMP_MIN_BPM,
            bpm_clamp_max: heart_rate::CLAMP_MAX_BPM,
            max_capture_width: camera::MAX_CAPTURE_WIDTH,
            compositor: CompositorPreference::default(),
            brightness_curve: BrightnessCurve::default(),
            shutter_policy: ShutterPolicy::default(),
            power_law_sensitivity: shutter::POWER_LAW_SENSITIVITY_MIN,
            blur: BlurMode::default(),
            shutter_suffix: false,
            participant: None,
            room: None,
            photo_dir: None,
            download_dir: None,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/kokoro-camera/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app_info::APP_DIR_NAME).join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this system, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file gives defaults, an invalid one is logged
    pub fn load_from(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
                return Self::default();
            }
        };

        match serde_json::from_str::<Config>(&text) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, text)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Clamp band for measured BPM, with the bounds in order
    pub fn bpm_band(&self) -> (u32, u32) {
        let low = self.bpm_clamp_min.min(self.bpm_clamp_max);
        let high = self.bpm_clamp_min.max(self.bpm_clamp_max);
        (low, high)
    }

    /// Directory of the persistent photo store, if the platform has one
    pub fn photo_directory(&self) -> Option<PathBuf> {
        self.photo_dir.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join(app_info::APP_DIR_NAME).join("photos"))
        })
    }

    /// Directory the download fallback writes into
    pub fn download_directory(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
