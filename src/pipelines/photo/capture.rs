// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic long exposure
//!
//! The shutter samples the live source at a fixed synthetic rate for as long
//! as the recipe's exposure lasts, rendering each sample into an
//! accumulation buffer that only this future owns:
//!
//! ```text
//! for i in 0..frame_count:
//!     latest frame ─► render step (fade, draw, tone, blur) ─► buffer
//!     sleep 1/rate
//! buffer ─► PNG ─► CapturedArtifact
//! ```

use super::encoding::{CaptureMetadata, CapturedArtifact, PhotoEncoder};
use crate::backends::camera::FrameSource;
use crate::config::Config;
use crate::errors::PhotoError;
use crate::exposure::ExposureRecipe;
use crate::render::{AccumulationBuffer, RenderPipeline};
use crate::session::Session;
use crate::timing::{CancelFlag, Clock};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runs exposures and encodes the result
#[derive(Clone)]
pub struct CaptureOrchestrator {
    pipeline: RenderPipeline,
    encoder: PhotoEncoder,
    clock: Arc<dyn Clock>,
    frame_rate: u32,
    max_width: u32,
    shutter_suffix: bool,
}

impl CaptureOrchestrator {
    pub fn new(
        pipeline: RenderPipeline,
        encoder: PhotoEncoder,
        clock: Arc<dyn Clock>,
        frame_rate: u32,
        max_width: u32,
    ) -> Self {
        Self {
            pipeline,
            encoder,
            clock,
            frame_rate: frame_rate.max(1),
            max_width,
            shutter_suffix: false,
        }
    }

    /// Name captures with their exposure time
    pub fn with_shutter_suffix(mut self, enabled: bool) -> Self {
        self.shutter_suffix = enabled;
        self
    }

    pub fn from_config(config: &Config, pipeline: RenderPipeline, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            pipeline,
            PhotoEncoder::new(),
            clock,
            config.synthetic_frame_rate,
            config.max_capture_width,
        )
        .with_shutter_suffix(config.shutter_suffix)
    }

    /// Pipeline shared with the live preview
    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    /// Pause between synthetic frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.frame_rate as u64)
    }

    /// Run the exposure loop and return the accumulated image
    ///
    /// Ok(None) when the source has no frame at the start. The buffer is
    /// dropped if `cancel` fires mid-exposure.
    pub async fn expose(
        &self,
        source: &dyn FrameSource,
        recipe: &ExposureRecipe,
        flip_horizontal: bool,
        cancel: &CancelFlag,
    ) -> Result<Option<RgbaImage>, PhotoError> {
        let Some(first) = source.latest_frame() else {
            warn!(source = source.name(), "Shutter pressed before the camera produced a frame");
            return Ok(None);
        };
        if first.resolution().is_empty() {
            warn!(source = source.name(), "Camera frame has no dimensions");
            return Ok(None);
        }

        let size = first.resolution().fit_width(self.max_width);
        let frame_count = recipe.frame_count(self.frame_rate);
        let motion = frame_count > 1;
        info!(
            %size,
            frame_count,
            duration_secs = recipe.exposure_duration_secs,
            trail_fade = recipe.trail_fade_alpha,
            "Exposure started"
        );

        let mut buffer = AccumulationBuffer::new(size);
        let interval = self.frame_interval();

        for step in 0..frame_count {
            if cancel.is_cancelled() {
                info!(step, frame_count, "Exposure cancelled");
                return Err(PhotoError::Cancelled);
            }

            match source.latest_frame() {
                Some(frame) if !frame.resolution().is_empty() => {
                    self.pipeline.render_exposure_step(
                        &mut buffer,
                        &frame.image,
                        recipe,
                        flip_horizontal,
                        motion,
                    );
                }
                _ => debug!(step, "No frame for exposure step, skipping"),
            }

            self.clock.sleep(interval).await;
        }

        if buffer.steps() == 0 {
            warn!("Every exposure step was skipped");
            return Ok(None);
        }
        Ok(Some(buffer.to_image()))
    }

    /// Expose with the session's inputs, then encode into an artifact
    pub async fn capture(
        &self,
        source: &dyn FrameSource,
        session: &Session,
        recipe: &ExposureRecipe,
        cancel: &CancelFlag,
    ) -> Result<Option<CapturedArtifact>, PhotoError> {
        let taken_at = chrono::Local::now();
        let Some(image) = self
            .expose(source, recipe, session.flip_horizontal(), cancel)
            .await?
        else {
            return Ok(None);
        };

        let (width, height) = image.dimensions();
        let bytes = self.encoder.encode(image).await?;
        let metadata = CaptureMetadata {
            aperture: session.aperture,
            bpm: session.heart_rate.bpm,
            heart_rate_source: session.heart_rate.source,
            exposure_duration_secs: recipe.exposure_duration_secs,
            frame_count: recipe.frame_count(self.frame_rate),
            taken_at,
            participant: session.participant.clone(),
            room: session.room.clone(),
        };

        info!(width, height, size = bytes.len(), "Capture encoded");
        Ok(Some(CapturedArtifact::new(
            bytes,
            width,
            height,
            self.encoder.extension(),
            metadata,
        )
        .with_shutter_suffix(self.shutter_suffix)))
    }
}
