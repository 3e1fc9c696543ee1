// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame rendering shared by the live preview and the capture loop
//!
//! [`RenderPipeline::compose_layer`] is the single code path that turns a
//! camera frame into a rendered layer:
//!
//! 1. horizontal flip for an un-mirrored front camera
//! 2. scale to the destination size
//! 3. brightness/contrast through the selected [`FrameCompositor`]
//! 4. aperture blur (plus motion blur during multi-frame exposures)
//!
//! The preview copies that layer onto its surface; the capture loop fades
//! its accumulation buffer and deposits the layer on top.

pub mod blur;
pub mod compositor;
pub mod preview;

pub use compositor::{FrameCompositor, ManualBlend, NativeFilter, probe};
pub use preview::PreviewRenderer;

use crate::backends::camera::Resolution;
use crate::constants::blur as blur_constants;
use crate::exposure::ExposureRecipe;
use image::{RgbaImage, imageops};
use std::sync::Arc;
use tracing::debug;

/// Shared rendering path
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    compositor: Arc<dyn FrameCompositor>,
}

impl RenderPipeline {
    pub fn new(compositor: Arc<dyn FrameCompositor>) -> Self {
        Self { compositor }
    }

    pub fn compositor(&self) -> &dyn FrameCompositor {
        self.compositor.as_ref()
    }

    /// Blur radius actually applied for `recipe`
    pub fn effective_blur_radius(&self, recipe: &ExposureRecipe, motion: bool) -> u32 {
        if !self.compositor.supports_blur() {
            return 0;
        }
        let motion_radius = if motion {
            blur_constants::MOTION_BLUR_RADIUS_PX
        } else {
            0
        };
        recipe.blur_radius_px + motion_radius
    }

    /// Render one layer of `frame` at `size`
    pub fn compose_layer(
        &self,
        frame: &RgbaImage,
        size: Resolution,
        recipe: &ExposureRecipe,
        flip_horizontal: bool,
        motion: bool,
    ) -> RgbaImage {
        let flipped;
        let oriented = if flip_horizontal {
            flipped = imageops::flip_horizontal(frame);
            &flipped
        } else {
            frame
        };

        let mut layer = if Resolution::of(oriented) == size {
            oriented.clone()
        } else {
            imageops::resize(
                oriented,
                size.width,
                size.height,
                imageops::FilterType::Triangle,
            )
        };

        self.compositor.apply_tone(&mut layer, recipe.tone());

        let radius = self.effective_blur_radius(recipe, motion);
        if radius > 0 {
            blur::box_blur(&mut layer, radius);
        }
        layer
    }

    /// Render a single still frame onto a cleared surface
    pub fn render_still(
        &self,
        frame: &RgbaImage,
        size: Resolution,
        recipe: &ExposureRecipe,
        flip_horizontal: bool,
    ) -> RgbaImage {
        let mut layer = self.compose_layer(frame, size, recipe, flip_horizontal, false);
        // Cleared surface: the layer lands opaque
        for pixel in layer.pixels_mut() {
            pixel[3] = 255;
        }
        layer
    }

    /// Add one step of a multi-frame exposure to `buffer`
    pub fn render_exposure_step(
        &self,
        buffer: &mut AccumulationBuffer,
        frame: &RgbaImage,
        recipe: &ExposureRecipe,
        flip_horizontal: bool,
        motion: bool,
    ) {
        let layer = self.compose_layer(frame, buffer.size(), recipe, flip_horizontal, motion);
        buffer.deposit(&layer, recipe.trail_fade_alpha);
    }
}

/// Floating-point buffer a multi-frame exposure accumulates into
///
/// The first deposit copies the layer. Every later deposit first fades the
/// buffer towards black by `alpha`, then adds the layer weighted by `alpha`,
/// so a static scene keeps its brightness and motion leaves a decaying trail.
#[derive(Debug, Clone)]
pub struct AccumulationBuffer {
    size: Resolution,
    data: Vec<f32>,
    steps: u32,
}

impl AccumulationBuffer {
    pub fn new(size: Resolution) -> Self {
        Self {
            size,
            data: vec![0.0; size.width as usize * size.height as usize * 3],
            steps: 0,
        }
    }

    pub fn size(&self) -> Resolution {
        self.size
    }

    /// Number of layers deposited so far
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn deposit(&mut self, layer: &RgbaImage, alpha: f64) {
        debug_assert_eq!(Resolution::of(layer), self.size);
        let alpha = alpha.clamp(0.0, 1.0) as f32;
        let first = self.steps == 0;

        for (dst, pixel) in self.data.chunks_exact_mut(3).zip(layer.pixels()) {
            for channel in 0..3 {
                let value = pixel[channel] as f32;
                dst[channel] = if first {
                    value
                } else {
                    dst[channel] * (1.0 - alpha) + value * alpha
                };
            }
        }

        self.steps += 1;
        debug!(step = self.steps, alpha, "Exposure step accumulated");
    }

    /// Opaque image of the current accumulation
    pub fn to_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.size.width, self.size.height);
        for (pixel, src) in image.pixels_mut().zip(self.data.chunks_exact(3)) {
            pixel.0 = [
                src[0].round().clamp(0.0, 255.0) as u8,
                src[1].round().clamp(0.0, 255.0) as u8,
                src[2].round().clamp(0.0, 255.0) as u8,
                255,
            ];
        }
        image
    }
}
