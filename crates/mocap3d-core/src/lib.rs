//! Camera models, calibration providers and multi-view triangulation.
//!
//! This crate holds the geometric half of `mocap3d`:
//!
//! - linear algebra type aliases (`Real`, `Pt3`, `Mat34`, and friends),
//! - a pinhole camera with Brown-Conrady distortion,
//! - the [`CalibrationProvider`] capability the reconstruction pipeline
//!   consumes, implemented by [`CameraRig`],
//! - DLT and RANSAC triangulation of single points,
//! - a loader for anipose-style calibration TOML files,
//! - cooperative cancellation shared by every long-running call.
//!
//! # Example
//!
//! ```no_run
//! use mocap3d_core::{CalibrationProvider, CancelToken, TriangulateOptions, load_calibration_toml};
//! use ndarray::Array3;
//!
//! let rig = load_calibration_toml("calibration.toml").unwrap();
//! let obs = Array3::<f64>::from_elem((rig.num_cameras(), 10, 2), f64::NAN);
//! let pts = rig
//!     .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
//!     .unwrap();
//! assert!(pts.is_completed());
//! ```

/// Loading and writing calibration TOML files.
mod calibration_file;
/// Pinhole camera model with Brown-Conrady distortion.
mod camera;
mod cancel;
mod error;
/// Linear algebra type aliases and helpers.
mod math;
mod provider;
/// Generic RANSAC engine and traits.
mod ransac;
mod rig;
/// Deterministic synthetic rigs and tracks for tests and demos.
pub mod synthetic;
mod triangulation;

pub use calibration_file::*;
pub use camera::*;
pub use cancel::*;
pub use error::*;
pub use math::*;
pub use provider::*;
pub use ransac::*;
pub use rig::*;
pub use triangulation::*;
