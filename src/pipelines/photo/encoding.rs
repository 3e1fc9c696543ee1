// SPDX-License-Identifier: GPL-3.0-only

//! Lossless still encoding and the captured artifact
//!
//! Encoding runs on the blocking pool so the preview keeps ticking while a
//! large exposure is compressed.

use crate::errors::PhotoError;
use crate::naming::CaptureName;
use crate::session::{ApertureValue, HeartRateSource};
use chrono::{DateTime, Local};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Turns the finished accumulation into file bytes
pub trait StillEncoder: Send + Sync {
    /// File extension without the dot
    fn extension(&self) -> &'static str;

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, PhotoError>;
}

/// PNG via the image crate
#[derive(Debug, Clone, Copy, Default)]
pub struct PngEncoder;

impl StillEncoder for PngEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, image: &RgbaImage) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| PhotoError::EncodingFailed(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer)
    }
}

/// Async front-end over a [`StillEncoder`]
#[derive(Clone)]
pub struct PhotoEncoder {
    backend: Arc<dyn StillEncoder>,
}

impl PhotoEncoder {
    /// PNG encoder
    pub fn new() -> Self {
        Self::with_backend(Arc::new(PngEncoder))
    }

    pub fn with_backend(backend: Arc<dyn StillEncoder>) -> Self {
        Self { backend }
    }

    pub fn extension(&self) -> &'static str {
        self.backend.extension()
    }

    /// Encode on the blocking pool
    pub async fn encode(&self, image: RgbaImage) -> Result<Vec<u8>, PhotoError> {
        let (width, height) = image.dimensions();
        info!(width, height, format = self.backend.extension(), "Starting encoding");

        let backend = Arc::clone(&self.backend);
        let data = tokio::task::spawn_blocking(move || backend.encode(&image))
            .await
            .map_err(|e| PhotoError::EncodingFailed(format!("Encoding task error: {}", e)))??;

        debug!(size = data.len(), "Encoding complete");
        Ok(data)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything known about a shot at the moment it was taken
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub aperture: ApertureValue,
    pub bpm: u32,
    pub heart_rate_source: HeartRateSource,
    pub exposure_duration_secs: f64,
    pub frame_count: u32,
    pub taken_at: DateTime<Local>,
    pub participant: Option<String>,
    pub room: Option<String>,
}

/// Encoded capture plus its metadata; created once per shutter press
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    bytes: Arc<[u8]>,
    width: u32,
    height: u32,
    extension: &'static str,
    metadata: CaptureMetadata,
    shutter_suffix: bool,
}

impl CapturedArtifact {
    pub fn new(
        bytes: Vec<u8>,
        width: u32,
        height: u32,
        extension: &'static str,
        metadata: CaptureMetadata,
    ) -> Self {
        Self {
            bytes: Arc::from(bytes.into_boxed_slice()),
            width,
            height,
            extension,
            metadata,
            shutter_suffix: false,
        }
    }

    /// Append the exposure time (`_SS{label}`) to the filename
    pub fn with_shutter_suffix(mut self, enabled: bool) -> Self {
        self.shutter_suffix = enabled;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the encoded bytes
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extension(&self) -> &'static str {
        self.extension
    }

    pub fn metadata(&self) -> &CaptureMetadata {
        &self.metadata
    }

    /// Shutter filename for this artifact
    pub fn filename(&self) -> String {
        let meta = &self.metadata;
        let name = CaptureName {
            taken_at: meta.taken_at.naive_local(),
            room: meta.room.as_deref(),
            who: meta.participant.as_deref(),
            aperture: meta.aperture,
            bpm: Some(meta.bpm),
            shutter_secs: self.shutter_suffix.then_some(meta.exposure_duration_secs),
        }
        .to_filename();

        if self.extension == "png" {
            name
        } else {
            format!("{}.{}", name.trim_end_matches(".png"), self.extension)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    #[tokio::test]
    async fn test_png_encoding_roundtrips_pixels() {
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let bytes = PhotoEncoder::new().encode(image.clone()).await.unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    fn metadata() -> CaptureMetadata {
        CaptureMetadata {
            aperture: ApertureValue::new(8).unwrap(),
            bpm: 72,
            heart_rate_source: HeartRateSource::Measured,
            exposure_duration_secs: 1.0 / 72.0,
            frame_count: 1,
            taken_at: Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            participant: None,
            room: Some("studio".to_string()),
        }
    }

    #[test]
    fn test_artifact_filename_uses_metadata() {
        let artifact = CapturedArtifact::new(vec![1, 2, 3], 4, 4, "png", metadata());
        assert_eq!(
            artifact.filename(),
            "cocoro_2024-01-01_00-00-00_studio_anon_F8-0_BPM72.png"
        );
        assert_eq!(artifact.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_shutter_suffix_adds_exposure_label() {
        let artifact =
            CapturedArtifact::new(vec![1], 4, 4, "png", metadata()).with_shutter_suffix(true);
        assert_eq!(
            artifact.filename(),
            "cocoro_2024-01-01_00-00-00_studio_anon_F8-0_BPM72_SS1-72.png"
        );
    }
}
