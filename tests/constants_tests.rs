// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use kokoro_camera::constants::{aperture, heart_rate, shutter, timing};

#[test]
fn test_aperture_range() {
    // Default aperture is the narrowest stop
    assert!(aperture::MIN < aperture::MAX);
    assert_eq!(aperture::DEFAULT, aperture::MAX);
}

#[test]
fn test_heart_rate_band_inside_rejection_band() {
    // Clamped values must never be values the estimator rejects
    assert!(heart_rate::REJECT_BELOW_BPM < heart_rate::CLAMP_MIN_BPM as f64);
    assert!(heart_rate::REJECT_ABOVE_BPM > heart_rate::CLAMP_MAX_BPM as f64);
    assert!(
        (heart_rate::CLAMP_MIN_BPM..=heart_rate::CLAMP_MAX_BPM).contains(&heart_rate::DEFAULT_BPM)
    );
}

#[test]
fn test_trail_fade_bounds() {
    assert!(shutter::TRAIL_FADE_MIN <= shutter::TRAIL_FADE_SLOW);
    assert!(shutter::TRAIL_FADE_SLOW < shutter::TRAIL_FADE_FAST);
    assert!(shutter::TRAIL_FADE_FAST <= shutter::TRAIL_FADE_MAX);
}

#[test]
fn test_preview_slower_than_display() {
    let preview_interval = 1.0 / timing::PREVIEW_FPS as f64;
    assert!(timing::DISPLAY_REFRESH.as_secs_f64() < preview_interval);
}
