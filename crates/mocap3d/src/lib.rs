//! High-level entry crate for `mocap3d`: multi-camera 2D keypoints to 3D
//! trajectories.
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # let observations = unimplemented!();
//! use mocap3d::prelude::*;
//!
//! let rig = load_calibration_toml("calibration.toml")?;
//! let mut session = ReconstructionSession::new(rig);
//! session.set_input(observations);
//! run_reconstruction(&mut session, None)?;
//!
//! let output = session.require_output()?;
//! println!("outcome: {:?}", output.report.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`core`] - math types, camera models, calibration providers, triangulation
//! - [`pipeline`] - triangulator, reprojection filter, orchestrator and sessions
//! - [`session`] - session state container and step functions
//! - [`synthetic`] - synthetic rigs and tracks for testing
//!
//! # Pipeline
//!
//! 1. Drop observations below the confidence threshold.
//! 2. Triangulate the frame range with the [`CalibrationProvider`].
//! 3. Re-triangulate frames whose mean reprojection error exceeds the
//!    threshold with growing sets of cameras excluded; reject the frames that
//!    never recover.

/// Session state container and step functions.
pub mod session {
    pub use mocap3d_pipeline::session::{
        LogEntry, ReconstructionSession, ReconstructionState, current_timestamp,
        reconstruct_range, run_reconstruction, step_filter, step_triangulate,
    };
}

/// Deterministic synthetic rigs, tracks and pixel noise.
pub mod synthetic {
    pub use mocap3d_core::synthetic::*;
}

/// Math types, camera models, calibration providers and triangulation.
pub mod core {
    pub use mocap3d_core::*;
}

/// Triangulation, filtering and reconstruction.
pub mod pipeline {
    pub use mocap3d_pipeline::*;
}

pub use mocap3d_core::{
    CalibrationError, CalibrationProvider, CameraModel, CameraRig, CancelToken, Completion,
    Real, RigCamera, TriangulateOptions, load_calibration_toml, parse_calibration_toml,
};
pub use mocap3d_pipeline::{
    ErrorReporter, FilterOptions, FilterOutcome, FilterReport, FrameRange, LogReporter,
    NoopReporter, ObservationEditor, Observations2d, ReconstructionConfig, ReconstructionError,
    ReconstructionOutput, SeriesRecorder, filter_by_reprojection_error, reconstruct,
    reconstruct_from_file, triangulate_observations,
};

/// Prelude for convenient imports.
///
/// ```no_run
/// use mocap3d::prelude::*;
/// ```
pub mod prelude {
    pub use crate::session::{ReconstructionSession, run_reconstruction};

    pub use crate::{
        CameraRig, CancelToken, Completion, FrameRange, LogReporter, Observations2d,
        ReconstructionConfig, load_calibration_toml, reconstruct,
    };
}
