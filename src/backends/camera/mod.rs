// SPDX-License-Identifier: GPL-3.0-only

//! Camera abstraction
//!
//! The booth never talks to a device directly. A [`CameraProvider`] opens a
//! [`FrameSource`] for the requested facing, and everything downstream (preview,
//! heart-rate meter, capture) only asks the source for its latest frame.
//!
//! ```text
//! ┌──────────────────┐   open(facing, resolution)   ┌──────────────────┐
//! │  CameraProvider  │ ───────────────────────────► │   FrameSource    │
//! └──────────────────┘                              └────────┬─────────┘
//!                                                            │ latest_frame()
//!                                 ┌──────────────────────────┼────────────────┐
//!                                 ▼                          ▼                ▼
//!                              preview              heart-rate meter       capture
//! ```

pub mod sources;
pub mod types;

pub use sources::{SequenceFrameSource, StillFrameSource, SyntheticPulseSource};
pub use types::*;

use crate::constants::camera;
use crate::errors::CameraError;
use crate::session::CameraFacing;
use crate::timing::Clock;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Anything that can hand out the frame currently "on screen"
pub trait FrameSource: Send + Sync {
    /// Latest frame, or None while the source has no dimensions yet
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Which way the camera behind this source faces
    fn facing(&self) -> CameraFacing;

    /// Human-readable source name for logs and the status bar
    fn name(&self) -> &str;
}

/// Opens frame sources for a camera facing
pub trait CameraProvider: Send + Sync {
    /// Open a source; `ideal` is a hint that sources may ignore
    fn open(
        &self,
        facing: CameraFacing,
        ideal: Resolution,
    ) -> Result<Arc<dyn FrameSource>, CameraError>;
}

/// Resolution requested for the main booth view
pub const MAIN_VIEW: Resolution = Resolution::new(camera::MAIN_WIDTH, camera::MAIN_HEIGHT);

/// Resolution requested for the heart-rate view
pub const MEASURE_VIEW: Resolution =
    Resolution::new(camera::MEASURE_WIDTH, camera::MEASURE_HEIGHT);

/// Where frames come from
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// Generated pulse pattern at the given BPM
    Synthetic { bpm: f64 },
    /// Image file (still) or directory of images (sequence)
    Path(PathBuf),
}

impl Default for SourceSpec {
    fn default() -> Self {
        SourceSpec::Synthetic {
            bpm: camera::SYNTHETIC_PULSE_BPM,
        }
    }
}

impl FromStr for SourceSpec {
    type Err = CameraError;

    /// `synthetic`, `synthetic:<bpm>` or a filesystem path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CameraError::InvalidSource("empty source".to_string()));
        }
        if s == "synthetic" {
            return Ok(SourceSpec::default());
        }
        if let Some(rate) = s.strip_prefix("synthetic:") {
            let bpm: f64 = rate
                .parse()
                .map_err(|_| CameraError::InvalidSource(format!("invalid pulse rate '{}'", rate)))?;
            if !(bpm.is_finite() && bpm > 0.0) {
                return Err(CameraError::InvalidSource(format!(
                    "pulse rate must be positive, got {}",
                    bpm
                )));
            }
            return Ok(SourceSpec::Synthetic { bpm });
        }
        Ok(SourceSpec::Path(PathBuf::from(s)))
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Synthetic { bpm } => write!(f, "synthetic:{}", bpm),
            SourceSpec::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Provider backed by files or synthetic frames
///
/// The front camera uses its own spec when one is given, otherwise the rear
/// spec.
pub struct FileCameraProvider {
    rear: SourceSpec,
    front: Option<SourceSpec>,
    sequence_fps: f64,
    clock: Arc<dyn Clock>,
}

impl FileCameraProvider {
    pub fn new(rear: SourceSpec, front: Option<SourceSpec>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rear,
            front,
            sequence_fps: camera::SEQUENCE_FPS,
            clock,
        }
    }

    pub fn with_sequence_fps(mut self, fps: f64) -> Self {
        self.sequence_fps = fps;
        self
    }

    fn spec_for(&self, facing: CameraFacing) -> &SourceSpec {
        match facing {
            CameraFacing::User => self.front.as_ref().unwrap_or(&self.rear),
            CameraFacing::Environment => &self.rear,
        }
    }
}

impl CameraProvider for FileCameraProvider {
    fn open(
        &self,
        facing: CameraFacing,
        ideal: Resolution,
    ) -> Result<Arc<dyn FrameSource>, CameraError> {
        let spec = self.spec_for(facing);
        info!(%spec, facing = facing.label(), %ideal, "Opening camera source");

        let clock = Arc::clone(&self.clock);
        let source: Arc<dyn FrameSource> = match spec {
            SourceSpec::Synthetic { bpm } => {
                Arc::new(SyntheticPulseSource::new(*bpm, ideal, facing, clock))
            }
            SourceSpec::Path(path) => {
                let metadata =
                    std::fs::metadata(path).map_err(|e| sources::io_to_camera_error(path, e))?;
                if metadata.is_dir() {
                    Arc::new(SequenceFrameSource::open_dir(
                        path,
                        self.sequence_fps,
                        facing,
                        clock,
                    )?)
                } else {
                    Arc::new(StillFrameSource::open(path, facing, clock)?)
                }
            }
        };
        Ok(source)
    }
}

/// Open a source, keeping `current` when the new one fails
pub fn reopen_or_keep(
    provider: &dyn CameraProvider,
    current: Arc<dyn FrameSource>,
    facing: CameraFacing,
    ideal: Resolution,
) -> (Arc<dyn FrameSource>, Option<CameraError>) {
    match provider.open(facing, ideal) {
        Ok(source) => (source, None),
        Err(e) => {
            warn!(error = %e, source = current.name(), "Camera switch failed, keeping current source");
            (current, Some(e))
        }
    }
}
