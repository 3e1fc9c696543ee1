// SPDX-License-Identifier: GPL-3.0-only

//! Per-session booth state
//!
//! Holds the user's aperture choice, the current heart rate, the camera facing
//! and the optional participant/room labels. The preview and the capture both
//! read from one `Session` so they cannot disagree about their inputs.

use crate::config::Config;
use crate::constants::{aperture, naming};
use crate::exposure::{ExposureMapper, ExposureRecipe};
use crate::signal::Measurement;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// User-selected aperture (f-number), always within [1, 32]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ApertureValue(u8);

impl ApertureValue {
    pub const WIDEST: ApertureValue = ApertureValue(aperture::MIN);
    pub const NARROWEST: ApertureValue = ApertureValue(aperture::MAX);

    /// Returns None outside [1, 32]
    pub fn new(value: u8) -> Option<Self> {
        (aperture::MIN..=aperture::MAX)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Round and clamp an arbitrary value into range
    pub fn clamped(value: f64) -> Self {
        if !value.is_finite() {
            return Self::default();
        }
        let rounded = value.round().clamp(aperture::MIN as f64, aperture::MAX as f64);
        Self(rounded as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }

    /// One stop more open (smaller number)
    pub fn wider(self) -> Self {
        Self(self.0.saturating_sub(1).max(aperture::MIN))
    }

    /// One stop more closed (larger number)
    pub fn narrower(self) -> Self {
        Self((self.0 + 1).min(aperture::MAX))
    }
}

impl Default for ApertureValue {
    fn default() -> Self {
        Self(aperture::DEFAULT)
    }
}

impl TryFrom<u8> for ApertureValue {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!(
                "aperture {} outside [{}, {}]",
                value,
                aperture::MIN,
                aperture::MAX
            )
        })
    }
}

impl From<ApertureValue> for u8 {
    fn from(value: ApertureValue) -> Self {
        value.0
    }
}

impl fmt::Display for ApertureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

/// Which way the active camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraFacing {
    /// Front camera, delivers mirrored frames
    User,
    /// Rear camera
    #[default]
    Environment,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::User => CameraFacing::Environment,
            CameraFacing::Environment => CameraFacing::User,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CameraFacing::User => "front",
            CameraFacing::Environment => "rear",
        }
    }
}

/// Where the current heart rate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeartRateSource {
    /// Estimated from a completed measurement
    Measured,
    /// Measurement skipped or failed
    Default,
}

/// Heart rate held by the session until the next measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRate {
    pub bpm: u32,
    pub source: HeartRateSource,
}

impl HeartRate {
    pub fn measured(bpm: u32) -> Self {
        Self {
            bpm,
            source: HeartRateSource::Measured,
        }
    }

    pub fn fallback(bpm: u32) -> Self {
        Self {
            bpm,
            source: HeartRateSource::Default,
        }
    }
}

/// Mutable state of one booth session
#[derive(Debug, Clone)]
pub struct Session {
    pub aperture: ApertureValue,
    pub heart_rate: HeartRate,
    pub facing: CameraFacing,
    /// Flip front-camera frames so they are saved unmirrored
    pub unmirror_front: bool,
    pub participant: Option<String>,
    pub room: Option<String>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            aperture: ApertureValue::default(),
            heart_rate: HeartRate::fallback(config.default_bpm),
            facing: CameraFacing::default(),
            unmirror_front: config.unmirror_front_camera,
            participant: config.participant.clone(),
            room: config.room.clone(),
        }
    }

    pub fn set_aperture(&mut self, aperture: ApertureValue) {
        debug!(aperture = aperture.get(), "Aperture changed");
        self.aperture = aperture;
    }

    /// Store the outcome of a measurement (measured or fallback)
    pub fn apply_measurement(&mut self, measurement: &Measurement) {
        self.heart_rate = measurement.heart_rate();
        info!(
            bpm = self.heart_rate.bpm,
            source = ?self.heart_rate.source,
            samples = measurement.samples.len(),
            "Heart rate stored"
        );
    }

    /// Measurement skipped: fall back to the default heart rate
    pub fn skip_measurement(&mut self, default_bpm: u32) {
        self.heart_rate = Measurement::skipped(default_bpm).heart_rate();
        info!(bpm = self.heart_rate.bpm, "Heart rate measurement skipped");
    }

    pub fn switch_camera(&mut self) -> CameraFacing {
        self.facing = self.facing.toggled();
        self.facing
    }

    /// Whether frames from the active camera need a horizontal flip
    pub fn flip_horizontal(&self) -> bool {
        self.facing == CameraFacing::User && self.unmirror_front
    }

    /// Recipe for the current aperture and heart rate
    pub fn recipe(&self, mapper: &ExposureMapper) -> ExposureRecipe {
        mapper.recipe(self.aperture, self.heart_rate.bpm)
    }

    /// Participant label, `anon` when blank
    pub fn who(&self) -> &str {
        non_blank(self.participant.as_deref()).unwrap_or(naming::DEFAULT_WHO)
    }

    /// Room label, `room` when blank
    pub fn room_label(&self) -> &str {
        non_blank(self.room.as_deref()).unwrap_or(naming::DEFAULT_ROOM)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
