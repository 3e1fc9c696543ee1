// SPDX-License-Identifier: GPL-3.0-only

//! File-backed and synthetic frame sources
//!
//! Frames are selected by clock time, so a source never needs its own thread:
//! whoever asks for the latest frame gets the one that would be on screen now.

use super::types::{CameraFrame, Resolution};
use super::FrameSource;
use crate::constants::{camera, file_formats};
use crate::errors::CameraError;
use crate::session::CameraFacing;
use crate::timing::Clock;
use image::{Rgba, RgbaImage};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Load an image file as an RGBA frame
pub fn load_image(path: &Path) -> Result<RgbaImage, CameraError> {
    debug!(path = %path.display(), "Loading image file");
    let img = image::open(path).map_err(|e| {
        CameraError::InvalidSource(format!("failed to load '{}': {}", path.display(), e))
    })?;
    let rgba = img.to_rgba8();
    info!(width = rgba.width(), height = rgba.height(), "Image loaded");
    Ok(rgba)
}

/// Image files of `dir`, sorted by name
pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_to_camera_error(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(file_formats::is_image_extension)
        })
        .collect();
    files.sort();
    Ok(files)
}

pub(crate) fn io_to_camera_error(path: &Path, err: std::io::Error) -> CameraError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        _ => CameraError::Unavailable(format!("{}: {}", path.display(), err)),
    }
}

/// Serves one image forever
pub struct StillFrameSource {
    name: String,
    image: Arc<RgbaImage>,
    facing: CameraFacing,
    clock: Arc<dyn Clock>,
}

impl StillFrameSource {
    pub fn new(
        name: impl Into<String>,
        image: RgbaImage,
        facing: CameraFacing,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            image: Arc::new(image),
            facing,
            clock,
        }
    }

    pub fn open(path: &Path, facing: CameraFacing, clock: Arc<dyn Clock>) -> Result<Self, CameraError> {
        let image = load_image(path)?;
        Ok(Self::new(path.display().to_string(), image, facing, clock))
    }
}

impl FrameSource for StillFrameSource {
    fn latest_frame(&self) -> Option<CameraFrame> {
        Some(CameraFrame::new(Arc::clone(&self.image), self.clock.now()))
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Loops over a list of images at a fixed rate
pub struct SequenceFrameSource {
    name: String,
    frames: Vec<Arc<RgbaImage>>,
    fps: f64,
    start: Duration,
    facing: CameraFacing,
    clock: Arc<dyn Clock>,
}

impl SequenceFrameSource {
    /// Returns InvalidSource if `frames` is empty
    pub fn new(
        name: impl Into<String>,
        frames: Vec<RgbaImage>,
        fps: f64,
        facing: CameraFacing,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CameraError> {
        let name = name.into();
        if frames.is_empty() {
            return Err(CameraError::InvalidSource(format!("{}: no frames", name)));
        }
        let fps = if fps.is_finite() && fps > 0.0 {
            fps
        } else {
            camera::SEQUENCE_FPS
        };
        Ok(Self {
            name,
            frames: frames.into_iter().map(Arc::new).collect(),
            fps,
            start: clock.now(),
            facing,
            clock,
        })
    }

    /// Load every image file of `dir` in name order
    pub fn open_dir(
        dir: &Path,
        fps: f64,
        facing: CameraFacing,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CameraError> {
        let files = list_image_files(dir)?;
        info!(dir = %dir.display(), count = files.len(), "Loading image sequence");
        let frames = files
            .iter()
            .map(|path| load_image(path))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dir.display().to_string(), frames, fps, facing, clock)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for SequenceFrameSource {
    fn latest_frame(&self) -> Option<CameraFrame> {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.start).as_secs_f64();
        let index = (elapsed * self.fps).floor() as usize % self.frames.len();
        Some(CameraFrame::new(Arc::clone(&self.frames[index]), now))
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Generated fingertip-style frames whose red level pulses at a fixed rate
///
/// A white marker sweeps across the top band of the frame so captures show
/// motion trails. The marker stays clear of the centre region used for
/// heart-rate sampling.
pub struct SyntheticPulseSource {
    name: String,
    bpm: f64,
    resolution: Resolution,
    base: f64,
    amplitude: f64,
    available_after: Duration,
    start: Duration,
    facing: CameraFacing,
    clock: Arc<dyn Clock>,
}

impl SyntheticPulseSource {
    pub fn new(bpm: f64, resolution: Resolution, facing: CameraFacing, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: format!("synthetic:{}", bpm),
            bpm,
            resolution,
            base: 128.0,
            amplitude: 100.0,
            available_after: Duration::ZERO,
            start: clock.now(),
            facing,
            clock,
        }
    }

    /// Pulse amplitude around the mid level (0 gives a flat signal)
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 127.0);
        self
    }

    /// No frames until `delay` has passed, like a camera still starting up
    pub fn with_warmup(mut self, delay: Duration) -> Self {
        self.available_after = delay;
        self
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    fn render(&self, elapsed_secs: f64) -> RgbaImage {
        let Resolution { width, height } = self.resolution;
        let phase = 2.0 * PI * self.bpm / 60.0 * elapsed_secs;
        let red = (self.base + self.amplitude * phase.sin()).round().clamp(0.0, 255.0) as u8;

        let marker = (height / 8).max(1);
        let band_top = height / 32;
        let travel = width.saturating_add(marker) as f64;
        let marker_x = ((elapsed_secs * width as f64 / 2.0) % travel) as i64 - marker as i64;

        RgbaImage::from_fn(width, height, |x, y| {
            let in_band = y >= band_top && y < band_top + marker;
            let dx = x as i64 - marker_x;
            if height >= 4 * marker && in_band && (0..marker as i64).contains(&dx) {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([red, 24, 32, 255])
            }
        })
    }
}

impl FrameSource for SyntheticPulseSource {
    fn latest_frame(&self) -> Option<CameraFrame> {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.start);
        if elapsed < self.available_after || self.resolution.is_empty() {
            return None;
        }
        let image = self.render(elapsed.as_secs_f64());
        Some(CameraFrame::new(Arc::new(image), now))
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }

    fn name(&self) -> &str {
        &self.name
    }
}
