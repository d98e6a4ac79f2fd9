use mocap3d_core::CalibrationError;
use thiserror::Error;

/// Fatal errors of the reconstruction pipeline.
///
/// High reprojection error is never an error: the filter repairs or rejects
/// those frames. Cancellation is reported through
/// [`Completion::Cancelled`](mocap3d_core::Completion).
#[derive(Debug, Error)]
pub enum ReconstructionError {
    #[error("observations must have 2 coordinates per point, got {0}")]
    InvalidAxisCount(usize),
    #[error("observations cover {actual} cameras, calibration has {expected}")]
    CameraCountMismatch { expected: usize, actual: usize },
    #[error("invalid frame range {start}..{end} for {frames} frames")]
    InvalidFrameRange {
        start: usize,
        end: usize,
        frames: usize,
    },
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Calibration(CalibrationError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("joint {joint} out of range (0..{limit})")]
    InvalidJoint { joint: usize, limit: usize },
    #[error("camera {camera} out of range (0..{limit})")]
    InvalidCamera { camera: usize, limit: usize },
}

impl From<CalibrationError> for ReconstructionError {
    fn from(err: CalibrationError) -> Self {
        match err {
            CalibrationError::CameraCountMismatch { expected, actual } => {
                Self::CameraCountMismatch { expected, actual }
            }
            other => Self::Calibration(other),
        }
    }
}
