//! Deterministic synthetic rigs and keypoint tracks.
//!
//! Used by the workspace tests and demos to build reconstruction problems
//! with known ground truth.

pub mod noise;
mod scene;

pub use noise::UniformPixelNoise;
pub use scene::{RingRigSpec, observe, ring_rig, skeleton_tracks};
