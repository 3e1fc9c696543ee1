// SPDX-License-Identifier: GPL-3.0-only

//! Aperture and heart rate → rendering parameters
//!
//! Everything here is a pure function of its inputs. The brightness curve and
//! the exposure-duration formula are swappable policies; [`ExposureMapper`]
//! bundles one of each with a blur policy and produces an [`ExposureRecipe`].

use crate::config::{BlurMode, BrightnessCurve, Config, ShutterPolicy};
use crate::constants::{aperture, blur, brightness, shutter};
use crate::session::ApertureValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Per-channel tone adjustment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneGains {
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
}

impl ToneGains {
    pub const NEUTRAL: ToneGains = ToneGains {
        brightness: 1.0,
        contrast: 1.0,
        saturation: 1.0,
    };
}

/// Maps an aperture to tone gains
pub trait BrightnessPolicy: fmt::Debug + Send + Sync {
    fn tone(&self, aperture: ApertureValue) -> ToneGains;
}

/// Maps a heart rate to an exposure duration in seconds
pub trait DurationPolicy: fmt::Debug + Send + Sync {
    fn duration_secs(&self, bpm: u32) -> f64;
}

/// Aperture normalised to [0, 1] (F1 → 0, F32 → 1)
fn normalized_aperture(value: ApertureValue) -> f64 {
    let span = (aperture::MAX - aperture::MIN) as f64;
    ((value.as_f64() - aperture::MIN as f64) / span).clamp(0.0, 1.0)
}

/// Log-space brightness curve, neutral saturation
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCurve;

impl LogCurve {
    pub fn brightness(value: ApertureValue) -> f64 {
        let t = normalized_aperture(value).powf(brightness::CURVE_STRENGTH);
        let ln_max = brightness::MAX_GAIN.ln();
        let ln_min = brightness::MIN_GAIN.ln();
        (ln_max + (ln_min - ln_max) * t).exp()
    }
}

impl BrightnessPolicy for LogCurve {
    fn tone(&self, aperture: ApertureValue) -> ToneGains {
        ToneGains {
            brightness: Self::brightness(aperture),
            contrast: brightness::CONTRAST_GAIN,
            saturation: 1.0,
        }
    }
}

/// Gamma curve; narrow apertures also lose saturation
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelGamma;

impl PixelGamma {
    pub fn gamma(value: ApertureValue) -> f64 {
        let t = normalized_aperture(value);
        brightness::GAMMA_MIN + (brightness::GAMMA_MAX - brightness::GAMMA_MIN) * t
    }
}

impl BrightnessPolicy for PixelGamma {
    fn tone(&self, aperture: ApertureValue) -> ToneGains {
        let gamma = Self::gamma(aperture);
        ToneGains {
            // Gain mid-grey receives under v^gamma
            brightness: 0.5f64.powf(gamma - 1.0),
            contrast: brightness::CONTRAST_GAIN,
            saturation: (1.0 / gamma).clamp(brightness::SATURATION_MIN, brightness::SATURATION_MAX),
        }
    }
}

/// Shutter reads as 1/BPM seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct ReciprocalBpm;

impl DurationPolicy for ReciprocalBpm {
    fn duration_secs(&self, bpm: u32) -> f64 {
        (1.0 / bpm.max(1) as f64).clamp(shutter::MIN_DURATION_SECS, shutter::MAX_DURATION_SECS)
    }
}

/// Power law anchored at 200 BPM → 1/200 s
#[derive(Debug, Clone, Copy)]
pub struct PowerLaw {
    sensitivity: f64,
}

impl PowerLaw {
    /// `sensitivity` is clamped into [2.0, 3.5]
    pub fn new(sensitivity: f64) -> Self {
        let sensitivity = if sensitivity.is_finite() {
            sensitivity.clamp(
                shutter::POWER_LAW_SENSITIVITY_MIN,
                shutter::POWER_LAW_SENSITIVITY_MAX,
            )
        } else {
            shutter::POWER_LAW_SENSITIVITY_MIN
        };
        Self { sensitivity }
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    pub fn exponent(&self) -> f64 {
        (shutter::POWER_LAW_ANCHOR_BPM.ln() / 4f64.ln()) * self.sensitivity
            / shutter::POWER_LAW_SENSITIVITY_MIN
    }
}

impl Default for PowerLaw {
    fn default() -> Self {
        Self::new(shutter::POWER_LAW_SENSITIVITY_MIN)
    }
}

impl DurationPolicy for PowerLaw {
    fn duration_secs(&self, bpm: u32) -> f64 {
        let anchor = shutter::POWER_LAW_ANCHOR_BPM;
        let bpm = bpm.max(1) as f64;
        let secs = (1.0 / anchor) * (anchor / bpm).powf(self.exponent());
        if secs.is_finite() {
            secs.clamp(shutter::MIN_DURATION_SECS, shutter::POWER_LAW_MAX_DURATION_SECS)
        } else {
            shutter::POWER_LAW_MAX_DURATION_SECS
        }
    }
}

/// Whether the aperture drives a depth-of-field blur
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlurPolicy {
    #[default]
    DepthOfField,
    None,
}

impl BlurPolicy {
    pub fn radius(self, aperture: ApertureValue) -> u32 {
        match self {
            BlurPolicy::DepthOfField => blur_radius_from_aperture(aperture),
            BlurPolicy::None => 0,
        }
    }
}

/// Per-frame alpha of the black fade painted between exposure steps
///
/// 0.06 at 60 BPM rising linearly to 0.20 at 200 BPM.
pub fn trail_fade_from_bpm(bpm: u32) -> f64 {
    let bpm = bpm.max(1) as f64;
    let t = ((bpm - shutter::TRAIL_BPM_LOW) / (shutter::TRAIL_BPM_HIGH - shutter::TRAIL_BPM_LOW))
        .clamp(0.0, 1.0);
    let fade = shutter::TRAIL_FADE_SLOW + (shutter::TRAIL_FADE_FAST - shutter::TRAIL_FADE_SLOW) * t;
    fade.clamp(shutter::TRAIL_FADE_MIN, shutter::TRAIL_FADE_MAX)
}

/// Depth-of-field blur radius in pixels, strongest at F1
pub fn blur_radius_from_aperture(aperture: ApertureValue) -> u32 {
    let radius = (blur::APERTURE_BLUR_BASE * blur::APERTURE_BLUR_SCALE / aperture.as_f64()).round();
    radius.max(0.0) as u32
}

/// Number of synthetic frames for an exposure, never zero
pub fn frame_count(duration_secs: f64, frame_rate: u32) -> u32 {
    let frames = (duration_secs * frame_rate as f64).round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u32
    } else {
        1
    }
}

/// HUD shutter text, e.g. `1/72s`
pub fn display_shutter_label(bpm: u32) -> String {
    format!("1/{}s", bpm.max(1))
}

/// Rendering parameters for one aperture/BPM pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecipe {
    pub brightness_gain: f64,
    pub contrast_gain: f64,
    pub saturation_gain: f64,
    pub blur_radius_px: u32,
    pub exposure_duration_secs: f64,
    pub trail_fade_alpha: f64,
}

impl ExposureRecipe {
    pub fn tone(&self) -> ToneGains {
        ToneGains {
            brightness: self.brightness_gain,
            contrast: self.contrast_gain,
            saturation: self.saturation_gain,
        }
    }

    pub fn frame_count(&self, frame_rate: u32) -> u32 {
        frame_count(self.exposure_duration_secs, frame_rate)
    }
}

/// Combines one brightness policy, one duration policy and a blur policy
#[derive(Debug, Clone)]
pub struct ExposureMapper {
    brightness: Arc<dyn BrightnessPolicy>,
    duration: Arc<dyn DurationPolicy>,
    blur: BlurPolicy,
}

impl ExposureMapper {
    pub fn new(
        brightness: Arc<dyn BrightnessPolicy>,
        duration: Arc<dyn DurationPolicy>,
        blur: BlurPolicy,
    ) -> Self {
        Self {
            brightness,
            duration,
            blur,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let brightness: Arc<dyn BrightnessPolicy> = match config.brightness_curve {
            BrightnessCurve::LogCurve => Arc::new(LogCurve),
            BrightnessCurve::PixelGamma => Arc::new(PixelGamma),
        };
        let duration: Arc<dyn DurationPolicy> = match config.shutter_policy {
            ShutterPolicy::ReciprocalBpm => Arc::new(ReciprocalBpm),
            ShutterPolicy::PowerLaw => Arc::new(PowerLaw::new(config.power_law_sensitivity)),
        };
        let blur = match config.blur {
            BlurMode::DepthOfField => BlurPolicy::DepthOfField,
            BlurMode::None => BlurPolicy::None,
        };
        Self::new(brightness, duration, blur)
    }

    pub fn recipe(&self, aperture: ApertureValue, bpm: u32) -> ExposureRecipe {
        let tone = self.brightness.tone(aperture);
        ExposureRecipe {
            brightness_gain: tone.brightness,
            contrast_gain: tone.contrast,
            saturation_gain: tone.saturation,
            blur_radius_px: self.blur.radius(aperture),
            exposure_duration_secs: self.duration.duration_secs(bpm),
            trail_fade_alpha: trail_fade_from_bpm(bpm),
        }
    }
}

impl Default for ExposureMapper {
    fn default() -> Self {
        Self::new(Arc::new(LogCurve), Arc::new(ReciprocalBpm), BlurPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(value: u8) -> ApertureValue {
        ApertureValue::new(value).unwrap()
    }

    #[test]
    fn test_log_curve_endpoints_and_monotonic() {
        assert!((LogCurve::brightness(f(1)) - 3.6).abs() < 1e-9);
        assert!((LogCurve::brightness(f(32)) - 0.12).abs() < 1e-9);

        let mut previous = f64::INFINITY;
        for value in 1..=32 {
            let b = LogCurve::brightness(f(value));
            assert!(b <= previous, "F{} brightened to {}", value, b);
            previous = b;
        }
    }

    #[test]
    fn test_pixel_gamma_policy() {
        let open = PixelGamma.tone(f(1));
        assert!((PixelGamma::gamma(f(1)) - 0.55).abs() < 1e-9);
        assert!(open.brightness > 1.0);
        assert_eq!(open.saturation, 1.4);

        let closed = PixelGamma.tone(f(32));
        assert!((PixelGamma::gamma(f(32)) - 1.8).abs() < 1e-9);
        assert!(closed.brightness < 1.0);
        // 1/1.8 falls below the saturation floor
        assert_eq!(closed.saturation, 0.6);
        assert_eq!(closed.contrast, 1.10);
    }

    #[test]
    fn test_reciprocal_duration_bounds() {
        let policy = ReciprocalBpm;
        assert!((policy.duration_secs(60) - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(policy.duration_secs(0), 1.0);
        assert_eq!(policy.duration_secs(5000), 1.0 / 2000.0);
        for bpm in 1..=400 {
            let secs = policy.duration_secs(bpm);
            assert!((1.0 / 2000.0..=2.0).contains(&secs));
        }
    }

    #[test]
    fn test_power_law_anchor_and_range() {
        let policy = PowerLaw::new(2.0);
        assert!((policy.duration_secs(200) - 1.0 / 200.0).abs() < 1e-12);
        assert!(policy.duration_secs(60) > ReciprocalBpm.duration_secs(60));
        assert_eq!(policy.duration_secs(1), 3.5);
        assert_eq!(PowerLaw::new(9.0).sensitivity(), 3.5);
        assert_eq!(PowerLaw::new(f64::NAN).sensitivity(), 2.0);

        let steeper = PowerLaw::new(3.5);
        assert!(steeper.duration_secs(60) > policy.duration_secs(60));
    }

    #[test]
    fn test_trail_fade_monotonic_and_bounded() {
        let mut previous = 0.0;
        for bpm in 60..=200 {
            let fade = trail_fade_from_bpm(bpm);
            assert!(fade >= previous);
            assert!((0.04..=0.24).contains(&fade));
            previous = fade;
        }
        assert!((trail_fade_from_bpm(0) - 0.06).abs() < 1e-12);
        assert!((trail_fade_from_bpm(400) - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_blur_radius() {
        assert_eq!(blur_radius_from_aperture(f(1)), 22);
        assert_eq!(blur_radius_from_aperture(f(8)), 3);
        assert_eq!(blur_radius_from_aperture(f(32)), 1);
        assert_eq!(BlurPolicy::None.radius(f(1)), 0);
    }

    #[test]
    fn test_frame_count_never_zero() {
        assert_eq!(frame_count(1.0 / 60.0, 40), 1);
        assert_eq!(frame_count(1.0 / 2000.0, 40), 1);
        assert_eq!(frame_count(0.5, 40), 20);
        assert_eq!(frame_count(2.0, 40), 80);
        assert_eq!(frame_count(f64::NAN, 40), 1);
    }

    #[test]
    fn test_scenario_wide_open_at_rest() {
        let recipe = ExposureMapper::default().recipe(f(1), 60);
        assert!((recipe.brightness_gain - 3.6).abs() < 1e-9);
        assert!((recipe.exposure_duration_secs - 0.0167).abs() < 1e-3);
        assert_eq!(recipe.frame_count(40), 1);
    }

    #[test]
    fn test_scenario_closed_and_racing() {
        let recipe = ExposureMapper::default().recipe(f(32), 200);
        assert!((recipe.brightness_gain - 0.12).abs() < 1e-9);
        assert!((recipe.trail_fade_alpha - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_mapper_is_deterministic() {
        let mapper = ExposureMapper::from_config(&Config::default());
        for value in [1, 5, 16, 32] {
            for bpm in [1, 60, 72, 150, 220] {
                assert_eq!(mapper.recipe(f(value), bpm), mapper.recipe(f(value), bpm));
            }
        }
    }

    #[test]
    fn test_mapper_from_config_selects_policies() {
        let config = Config {
            brightness_curve: BrightnessCurve::PixelGamma,
            shutter_policy: ShutterPolicy::PowerLaw,
            blur: BlurMode::None,
            ..Config::default()
        };
        let recipe = ExposureMapper::from_config(&config).recipe(f(1), 200);
        assert_eq!(recipe.saturation_gain, 1.4);
        assert!((recipe.exposure_duration_secs - 1.0 / 200.0).abs() < 1e-12);
        assert_eq!(recipe.blur_radius_px, 0);
    }

    #[test]
    fn test_display_shutter_label() {
        assert_eq!(display_shutter_label(72), "1/72s");
        assert_eq!(display_shutter_label(0), "1/1s");
    }
}
