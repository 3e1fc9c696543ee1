// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer
//!
//! Physical camera acquisition lives outside this crate. The booth only sees
//! a [`camera::CameraProvider`] that opens [`camera::FrameSource`]s for a
//! camera facing:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │       Booth / CLI / capture pipeline      │
//! └────────────────────┬─────────────────────┘
//!                      │ latest_frame()
//! ┌────────────────────┴─────────────────────┐
//! │             CameraProvider                │
//! │  ┌───────────┐ ┌───────────┐ ┌─────────┐ │
//! │  │   Still   │ │ Sequence  │ │Synthetic│ │
//! │  │  (file)   │ │   (dir)   │ │ (pulse) │ │
//! │  └───────────┘ └───────────┘ └─────────┘ │
//! └──────────────────────────────────────────┘
//! ```

pub mod camera;
