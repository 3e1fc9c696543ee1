// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Aperture (f-number) range exposed to the user
pub mod aperture {
    /// Widest aperture, brightest and most blurred
    pub const MIN: u8 = 1;

    /// Narrowest aperture, darkest and sharpest
    pub const MAX: u8 = 32;

    /// Aperture a new session starts with
    pub const DEFAULT: u8 = 32;
}

/// Brightness curve constants
pub mod brightness {
    /// Brightness gain at the narrowest aperture
    pub const MIN_GAIN: f64 = 0.12;

    /// Brightness gain at the widest aperture
    pub const MAX_GAIN: f64 = 3.6;

    /// Power applied to the normalised aperture before log interpolation
    pub const CURVE_STRENGTH: f64 = 1.35;

    /// Contrast gain that always accompanies brightness
    pub const CONTRAST_GAIN: f64 = 1.10;

    /// Gamma range of the pixel-gamma policy (wide → narrow aperture)
    pub const GAMMA_MIN: f64 = 0.55;
    pub const GAMMA_MAX: f64 = 1.8;

    /// Saturation bounds of the pixel-gamma policy
    pub const SATURATION_MIN: f64 = 0.6;
    pub const SATURATION_MAX: f64 = 1.4;
}

/// Exposure duration and trail constants
pub mod shutter {
    /// Shortest simulated exposure (1/2000 s)
    pub const MIN_DURATION_SECS: f64 = 1.0 / 2000.0;

    /// Longest exposure of the reciprocal-BPM policy
    pub const MAX_DURATION_SECS: f64 = 2.0;

    /// Longest exposure of the power-law policy
    pub const POWER_LAW_MAX_DURATION_SECS: f64 = 3.5;

    /// Power-law anchor: this BPM maps to 1/BPM seconds
    pub const POWER_LAW_ANCHOR_BPM: f64 = 200.0;

    /// Allowed sensitivity range of the power-law policy
    pub const POWER_LAW_SENSITIVITY_MIN: f64 = 2.0;
    pub const POWER_LAW_SENSITIVITY_MAX: f64 = 3.5;

    /// Trail fade at or below the slow end of the BPM band
    pub const TRAIL_FADE_SLOW: f64 = 0.06;

    /// Trail fade at or above the fast end of the BPM band
    pub const TRAIL_FADE_FAST: f64 = 0.20;

    /// BPM band the trail fade interpolates over
    pub const TRAIL_BPM_LOW: f64 = 60.0;
    pub const TRAIL_BPM_HIGH: f64 = 200.0;

    /// Overall trail fade clamp
    pub const TRAIL_FADE_MIN: f64 = 0.04;
    pub const TRAIL_FADE_MAX: f64 = 0.24;
}

/// Depth-of-field blur constants
pub mod blur {
    /// Blur radius numerator: radius = BASE * SCALE / aperture
    pub const APERTURE_BLUR_BASE: f64 = 18.0;
    pub const APERTURE_BLUR_SCALE: f64 = 1.2;

    /// Extra blur applied to every layer of a multi-frame exposure
    pub const MOTION_BLUR_RADIUS_PX: u32 = 2;
}

/// Heart-rate measurement constants
pub mod heart_rate {
    /// BPM stored when measurement fails or is skipped
    pub const DEFAULT_BPM: u32 = 60;

    /// Band measured values are clamped into before being stored
    pub const CLAMP_MIN_BPM: u32 = 60;
    pub const CLAMP_MAX_BPM: u32 = 100;

    /// Estimates at or outside these bounds are rejected
    pub const REJECT_BELOW_BPM: f64 = 20.0;
    pub const REJECT_ABOVE_BPM: f64 = 220.0;

    /// Half window of the moving-average smoother
    pub const SMOOTHING_HALF_WINDOW: usize = 4;

    /// Default measurement window
    pub const MEASUREMENT_SECS: u64 = 15;

    /// Size of the centred region sampled for red intensity
    pub const SAMPLE_REGION_WIDTH: u32 = 160;
    pub const SAMPLE_REGION_HEIGHT: u32 = 120;
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Interval of a display refresh tick (~60 Hz)
    pub const DISPLAY_REFRESH: Duration = Duration::from_micros(16_667);

    /// Target preview render rate
    pub const PREVIEW_FPS: u32 = 15;

    /// Synthetic frame rate of the exposure loop, independent of the camera
    pub const SYNTHETIC_FRAME_RATE: u32 = 40;
}

/// Camera request constants
pub mod camera {
    /// Ideal resolution of the main booth view
    pub const MAIN_WIDTH: u32 = 1280;
    pub const MAIN_HEIGHT: u32 = 720;

    /// Ideal resolution of the measurement view
    pub const MEASURE_WIDTH: u32 = 640;
    pub const MEASURE_HEIGHT: u32 = 480;

    /// Captures wider than this are scaled down
    pub const MAX_CAPTURE_WIDTH: u32 = 1600;

    /// Playback rate of image-sequence sources
    pub const SEQUENCE_FPS: f64 = 15.0;

    /// Pulse rate of the synthetic source when none is given
    pub const SYNTHETIC_PULSE_BPM: f64 = 72.0;
}

/// Naming constants
pub mod naming {
    /// Prefix of shutter filenames
    pub const CAPTURE_PREFIX: &str = "cocoro";

    /// Prefix of gallery export filenames
    pub const GALLERY_PREFIX: &str = "kokoro";

    /// Labels used when participant or room are blank
    pub const DEFAULT_ROOM: &str = "room";
    pub const DEFAULT_WHO: &str = "anon";
}

/// Supported file formats for file-backed frame sources
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Application name used for config and data directories
    pub const APP_DIR_NAME: &str = "kokoro-camera";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
