// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for camera frame sources

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Frame dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &RgbaImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Scale down (never up) so the width does not exceed `max_width`
    ///
    /// The aspect ratio is kept and neither side drops below one pixel.
    pub fn fit_width(self, max_width: u32) -> Self {
        if self.width <= max_width || self.width == 0 || max_width == 0 {
            return self;
        }
        let scale = max_width as f64 / self.width as f64;
        let height = ((self.height as f64 * scale).round() as u32).max(1);
        Self::new(max_width, height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single RGBA frame from a source
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub image: Arc<RgbaImage>,
    /// Clock time at which the frame was produced
    pub captured_at: Duration,
}

impl CameraFrame {
    pub fn new(image: Arc<RgbaImage>, captured_at: Duration) -> Self {
        Self { image, captured_at }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_width_scales_down_only() {
        let full = Resolution::new(3200, 1800);
        assert_eq!(full.fit_width(1600), Resolution::new(1600, 900));

        let small = Resolution::new(640, 480);
        assert_eq!(small.fit_width(1600), small);
    }

    #[test]
    fn test_fit_width_keeps_one_pixel() {
        assert_eq!(
            Resolution::new(10_000, 1).fit_width(100),
            Resolution::new(100, 1)
        );
    }
}
