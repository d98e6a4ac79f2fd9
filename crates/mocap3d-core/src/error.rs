use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or using a calibration.
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("failed to read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse calibration file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to write calibration file: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("calibration contains no cameras")]
    NoCameras,
    #[error("camera `{camera}`: {reason}")]
    InvalidCamera { camera: String, reason: String },
    #[error("observations cover {actual} cameras, calibration has {expected}")]
    CameraCountMismatch { expected: usize, actual: usize },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}
