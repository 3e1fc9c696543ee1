// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the photo booth

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Photo capture errors
    Photo(PhotoError),
    /// Storage errors
    Storage(StorageError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera acquisition errors
///
/// All of these leave the previously opened source (if any) untouched.
#[derive(Debug, Clone)]
pub enum CameraError {
    /// Access to the device was refused
    PermissionDenied,
    /// No device or source could be opened
    Unavailable(String),
    /// The source exists but cannot be decoded
    InvalidSource(String),
}

/// Photo capture errors
#[derive(Debug, Clone)]
pub enum PhotoError {
    /// No frame available for capture
    NoFrameAvailable,
    /// Capture was cancelled before the exposure finished
    Cancelled,
    /// Encoding failed
    EncodingFailed(String),
    /// Export (share or download) failed
    ExportFailed(String),
}

/// Photo store errors
#[derive(Debug, Clone)]
pub enum StorageError {
    /// Persistent storage is not usable in this environment
    Unavailable(String),
    /// No record with this id
    NotFound(String),
    /// Record exists but its metadata cannot be read
    Corrupt(String),
    /// Filesystem error
    Io(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Photo(e) => write!(f, "Photo error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied => {
                write!(f, "Camera access denied, allow camera permission and retry")
            }
            CameraError::Unavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            CameraError::InvalidSource(msg) => write!(f, "Invalid camera source: {}", msg),
        }
    }
}

impl fmt::Display for PhotoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhotoError::NoFrameAvailable => write!(f, "No frame available for capture"),
            PhotoError::Cancelled => write!(f, "Capture cancelled"),
            PhotoError::EncodingFailed(msg) => write!(f, "Encoding failed: {}", msg),
            PhotoError::ExportFailed(msg) => write!(f, "Export failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            StorageError::NotFound(id) => write!(f, "No photo with id {}", id),
            StorageError::Corrupt(msg) => write!(f, "Corrupt record: {}", msg),
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PhotoError {}
impl std::error::Error for StorageError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        AppError::Photo(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Corrupt(err.to_string())
    }
}

impl From<image::ImageError> for CameraError {
    fn from(err: image::ImageError) -> Self {
        CameraError::InvalidSource(err.to_string())
    }
}
