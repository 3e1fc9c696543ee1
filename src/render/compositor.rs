// SPDX-License-Identifier: GPL-3.0-only

//! Brightness/contrast compositors
//!
//! Two ways to apply the same tone gains. [`NativeFilter`] evaluates the
//! brightness, contrast and saturate filter functions directly.
//! [`ManualBlend`] approximates them with the blend modes a bare drawing
//! surface has: multiply or screen with a flat layer, then a grey overlay.
//! The two agree exactly for darkening with neutral contrast and approximately
//! everywhere else.

use crate::config::CompositorPreference;
use crate::exposure::ToneGains;
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Grey level of the contrast overlay layer
const OVERLAY_GREY: f64 = 127.0;

/// Contrast gains closer to 1 than this are treated as neutral
const CONTRAST_EPSILON: f64 = 1e-3;

/// Applies tone gains to a layer in place
pub trait FrameCompositor: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a blur primitive is available on this path
    fn supports_blur(&self) -> bool;

    fn apply_tone(&self, layer: &mut RgbaImage, tone: ToneGains);
}

/// Pick the compositor once at startup
pub fn probe(preference: CompositorPreference) -> Arc<dyn FrameCompositor> {
    let compositor: Arc<dyn FrameCompositor> = match preference {
        CompositorPreference::Auto | CompositorPreference::Native => Arc::new(NativeFilter),
        CompositorPreference::Manual => Arc::new(ManualBlend),
    };
    info!(
        ?preference,
        compositor = compositor.name(),
        blur = compositor.supports_blur(),
        "Compositor selected"
    );
    compositor
}

fn to_u8(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Filter-function semantics, values in the 0-255 domain
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeFilter;

impl NativeFilter {
    /// brightness then contrast for one channel
    fn channel(value: f64, tone: &ToneGains) -> f64 {
        let v = (value * tone.brightness).clamp(0.0, 255.0);
        if (tone.contrast - 1.0).abs() > CONTRAST_EPSILON {
            ((v - 127.5) * tone.contrast + 127.5).clamp(0.0, 255.0)
        } else {
            v
        }
    }

    /// saturate() colour matrix
    fn saturate(rgb: [f64; 3], s: f64) -> [f64; 3] {
        let [r, g, b] = rgb;
        [
            (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * b,
            (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * b,
        ]
    }
}

impl FrameCompositor for NativeFilter {
    fn name(&self) -> &'static str {
        "native-filter"
    }

    fn supports_blur(&self) -> bool {
        true
    }

    fn apply_tone(&self, layer: &mut RgbaImage, tone: ToneGains) {
        let lut: Vec<f64> = (0..=255u16)
            .map(|v| Self::channel(v as f64, &tone))
            .collect();
        let neutral_saturation = (tone.saturation - 1.0).abs() < 1e-6;

        for pixel in layer.pixels_mut() {
            let rgb = [
                lut[pixel[0] as usize],
                lut[pixel[1] as usize],
                lut[pixel[2] as usize],
            ];
            let rgb = if neutral_saturation {
                rgb
            } else {
                Self::saturate(rgb, tone.saturation)
            };
            pixel[0] = to_u8(rgb[0]);
            pixel[1] = to_u8(rgb[1]);
            pixel[2] = to_u8(rgb[2]);
        }
    }
}

/// Blend-mode approximation; ignores saturation and has no blur
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualBlend;

impl ManualBlend {
    fn channel(value: f64, tone: &ToneGains) -> f64 {
        let b = tone.brightness;
        let mut v = value;

        if b < 1.0 {
            // multiply with black
            let alpha = (1.0 - b).max(0.0);
            v *= 1.0 - alpha;
        } else if b > 1.0 {
            // screen with white
            let alpha = (1.0 - 1.0 / b).max(0.0);
            v = v * (1.0 - alpha) + 255.0 * alpha;
        }

        if (tone.contrast - 1.0).abs() > CONTRAST_EPSILON {
            let alpha = ((tone.contrast - 1.0) * 0.6).min(0.5);
            let overlay = if v <= 127.5 {
                2.0 * v * OVERLAY_GREY / 255.0
            } else {
                255.0 - 2.0 * (255.0 - v) * (255.0 - OVERLAY_GREY) / 255.0
            };
            v = v * (1.0 - alpha) + overlay * alpha;
        }

        v
    }
}

impl FrameCompositor for ManualBlend {
    fn name(&self) -> &'static str {
        "manual-blend"
    }

    fn supports_blur(&self) -> bool {
        false
    }

    fn apply_tone(&self, layer: &mut RgbaImage, tone: ToneGains) {
        let lut: Vec<u8> = (0..=255u16)
            .map(|v| to_u8(Self::channel(v as f64, &tone)))
            .collect();

        for pixel in layer.pixels_mut() {
            pixel[0] = lut[pixel[0] as usize];
            pixel[1] = lut[pixel[1] as usize];
            pixel[2] = lut[pixel[2] as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::{BrightnessPolicy, LogCurve};
    use crate::session::ApertureValue;
    use image::Rgba;

    fn grey(level: u8) -> RgbaImage {
        RgbaImage::from_pixel(4, 4, Rgba([level, level, level, 255]))
    }

    fn apply(compositor: &dyn FrameCompositor, level: u8, tone: ToneGains) -> u8 {
        let mut layer = grey(level);
        compositor.apply_tone(&mut layer, tone);
        layer.get_pixel(0, 0)[0]
    }

    #[test]
    fn test_neutral_tone_is_identity() {
        for level in [0, 17, 128, 255] {
            assert_eq!(apply(&NativeFilter, level, ToneGains::NEUTRAL), level);
            assert_eq!(apply(&ManualBlend, level, ToneGains::NEUTRAL), level);
        }
    }

    #[test]
    fn test_exact_agreement_when_darkening_without_contrast() {
        for value in 17..=32 {
            let mut tone = LogCurve.tone(ApertureValue::new(value).unwrap());
            assert!(tone.brightness < 1.0);
            tone.contrast = 1.0;
            for level in 0..=255u8 {
                assert_eq!(
                    apply(&NativeFilter, level, tone),
                    apply(&ManualBlend, level, tone),
                    "F{} level {}",
                    value,
                    level
                );
            }
        }
    }

    #[test]
    fn test_darkening_agrees_across_tones() {
        // Contrast on: the grey overlay only approximates the contrast filter
        for value in 17..=32 {
            let tone = LogCurve.tone(ApertureValue::new(value).unwrap());
            assert!(tone.brightness < 1.0);
            for level in (16..=240u8).step_by(16) {
                let native = apply(&NativeFilter, level, tone) as i32;
                let manual = apply(&ManualBlend, level, tone) as i32;
                assert!(
                    (native - manual).abs() <= 12,
                    "F{} level {}: native {} manual {}",
                    value,
                    level,
                    native,
                    manual
                );
            }
        }
    }

    #[test]
    fn test_wider_aperture_is_never_darker() {
        let compositors: [&dyn FrameCompositor; 2] = [&NativeFilter, &ManualBlend];
        for compositor in compositors {
            for level in (0..=240u8).step_by(16) {
                let levels: Vec<u8> = (1..=32)
                    .map(|value| {
                        apply(compositor, level, LogCurve.tone(ApertureValue::new(value).unwrap()))
                    })
                    .collect();
                assert!(
                    levels.windows(2).all(|pair| pair[0] >= pair[1]),
                    "{} level {}: {:?}",
                    compositor.name(),
                    level,
                    levels
                );
            }
        }
    }

    #[test]
    fn test_alpha_is_preserved() {
        let mut layer = RgbaImage::from_pixel(2, 2, Rgba([100, 100, 100, 40]));
        NativeFilter.apply_tone(&mut layer, LogCurve.tone(ApertureValue::WIDEST));
        assert_eq!(layer.get_pixel(1, 1)[3], 40);
    }

    #[test]
    fn test_saturation_only_on_native_path() {
        let tone = ToneGains {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 0.0,
        };
        let mut native = RgbaImage::from_pixel(1, 1, Rgba([200, 40, 40, 255]));
        NativeFilter.apply_tone(&mut native, tone);
        let p = native.get_pixel(0, 0);
        assert_eq!(p[0], p[1]);
        assert_eq!(p[1], p[2]);

        let mut manual = RgbaImage::from_pixel(1, 1, Rgba([200, 40, 40, 255]));
        ManualBlend.apply_tone(&mut manual, tone);
        assert_eq!(manual.get_pixel(0, 0)[0], 200);
    }

    #[test]
    fn test_probe_respects_preference() {
        assert_eq!(probe(CompositorPreference::Auto).name(), "native-filter");
        assert_eq!(probe(CompositorPreference::Manual).name(), "manual-blend");
        assert!(!probe(CompositorPreference::Manual).supports_blur());
    }
}
