// SPDX-License-Identifier: GPL-3.0-only

//! Kokoro Camera - a heart-rate and aperture driven photo booth
//!
//! The booth measures a pulse from the camera, lets the user pick an aperture
//! and turns both into a simulated exposure: brightness and depth of field
//! from the aperture, shutter time and light-trail fade from the heart rate.
//!
//! # Architecture
//!
//! - [`signal`]: red-channel series to BPM, timed measurement
//! - [`exposure`]: aperture and BPM to an [`ExposureRecipe`]
//! - [`render`]: the per-frame compositing shared by preview and capture
//! - [`pipelines`]: synthetic long exposure, encoding, export and storage
//! - [`backends`]: camera provider and frame sources
//! - [`session`]: booth state (aperture, heart rate, camera facing)
//! - [`storage`], [`export`], [`naming`]: what happens to a finished photo
//! - [`config`]: user configuration
//! - [`terminal`]: interactive booth rendered in the terminal
//!
//! # Example
//!
//! ```
//! use kokoro_camera::{ApertureValue, ExposureMapper};
//!
//! let recipe = ExposureMapper::default().recipe(ApertureValue::new(8).unwrap(), 72);
//! assert!(recipe.brightness_gain > 1.0);
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod export;
pub mod exposure;
pub mod naming;
pub mod pipelines;
pub mod render;
pub mod session;
pub mod signal;
pub mod storage;
pub mod terminal;
pub mod timing;

// Re-export commonly used types
pub use config::Config;
pub use errors::{AppError, AppResult, CameraError, PhotoError, StorageError};
pub use exposure::{ExposureMapper, ExposureRecipe};
pub use pipelines::photo::{PhotoBooth, ShotReport};
pub use session::{ApertureValue, CameraFacing, HeartRate, HeartRateSource, Session};
pub use signal::{HeartRateMeter, Measurement};
