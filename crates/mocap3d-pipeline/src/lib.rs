//! Reconstruction pipeline: multi-camera 2D keypoints to 3D trajectories.
//!
//! Two APIs are provided:
//!
//! ## Function API
//!
//! ```no_run
//! use mocap3d_core::{CancelToken, load_calibration_toml};
//! use mocap3d_pipeline::{FrameRange, LogReporter, Observations2d, ReconstructionConfig, reconstruct};
//! # fn main() -> anyhow::Result<()> {
//! # let observations: Observations2d = unimplemented!();
//! let rig = load_calibration_toml("calibration.toml")?;
//! let result = reconstruct(
//!     &observations,
//!     &rig,
//!     &ReconstructionConfig::default(),
//!     FrameRange::all(),
//!     &mut LogReporter,
//!     &CancelToken::new(),
//! )?;
//! if let Some(output) = result.completed() {
//!     println!("{:?}", output.report.outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Session API
//!
//! [`session::ReconstructionSession`] stores config, input, intermediate
//! triangulation and output; [`session::step_triangulate`] and
//! [`session::step_filter`] advance it, [`session::run_reconstruction`] runs
//! both.

mod combinations;
mod config;
mod editor;
mod error;
mod filter;
mod reconstruct;
mod report;
pub mod session;
mod triangulator;

pub use combinations::exclusion_combinations;
pub use config::{FrameRange, ReconstructionConfig};
pub use editor::{DISPLAYED_JOINTS, ObservationEditor};
pub use error::ReconstructionError;
pub use filter::{
    FilterOptions, FilterOutcome, FilterReport, filter_by_reprojection_error,
    frames_above_threshold, mean_error_per_frame,
};
pub use reconstruct::{
    Observations2d, ReconstructionOutput, apply_confidence_threshold, reconstruct,
    reconstruct_from_file,
};
pub use report::{ErrorReporter, FilterStage, LogReporter, NoopReporter, SeriesRecorder};
pub use session::{
    LogEntry, ReconstructionSession, ReconstructionState, reconstruct_range, run_reconstruction,
    step_filter, step_triangulate,
};
pub use triangulator::{TriangulatedData, triangulate_observations};
