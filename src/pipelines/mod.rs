// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! - [`photo`]: synthetic long exposure, PNG encoding and hand-off to export
//!   and storage

pub mod photo;
