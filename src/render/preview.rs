// SPDX-License-Identifier: GPL-3.0-only

//! Throttled live preview

use super::RenderPipeline;
use crate::backends::camera::{FrameSource, Resolution};
use crate::exposure::ExposureRecipe;
use crate::timing::RateLimiter;
use image::RgbaImage;
use std::time::Duration;
use tracing::trace;

/// Renders the live view at most `fps` times per second
///
/// [`tick`](Self::tick) is meant to be called on every display refresh; the
/// rate limiter drops the ticks in between.
pub struct PreviewRenderer {
    pipeline: RenderPipeline,
    limiter: RateLimiter,
    surface: Option<RgbaImage>,
    rendered: u64,
}

impl PreviewRenderer {
    pub fn new(pipeline: RenderPipeline, fps: u32) -> Self {
        Self {
            pipeline,
            limiter: RateLimiter::per_second(fps),
            surface: None,
            rendered: 0,
        }
    }

    /// Returns true when a new preview frame was rendered
    pub fn tick(
        &mut self,
        now: Duration,
        source: &dyn FrameSource,
        recipe: &ExposureRecipe,
        flip_horizontal: bool,
        size: Resolution,
    ) -> bool {
        if !self.limiter.ready(now) {
            return false;
        }
        let Some(frame) = source.latest_frame() else {
            return false;
        };
        if size.is_empty() || frame.resolution().is_empty() {
            return false;
        }

        let surface = self
            .pipeline
            .render_still(&frame.image, size, recipe, flip_horizontal);
        self.surface = Some(surface);
        self.rendered += 1;
        trace!(rendered = self.rendered, "Preview frame rendered");
        true
    }

    /// Redraw on the next tick regardless of the rate limit
    pub fn invalidate(&mut self) {
        self.limiter.reset();
    }

    pub fn surface(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }
}
