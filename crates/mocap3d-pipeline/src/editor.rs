//! Manual removal of unreliable joints before reconstruction.

use mocap3d_core::Real;
use ndarray::{Array4, ArrayView2, ArrayView4, Axis, s};

use crate::error::ReconstructionError;
use crate::reconstruct::Observations2d;

/// Number of leading joints exposed by [`ObservationEditor::joints`].
pub const DISPLAYED_JOINTS: usize = 33;

/// Keeps the loaded `[camera, frame, joint, 2]` observations next to a
/// working copy in which single joints can be hidden per camera and
/// restored later.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationEditor {
    original: Array4<Real>,
    working: Array4<Real>,
}

impl ObservationEditor {
    pub fn new(observations: Array4<Real>) -> Self {
        Self {
            working: observations.clone(),
            original: observations,
        }
    }

    fn check(&self, camera: usize, joint: usize) -> Result<(), ReconstructionError> {
        let (cameras, _, joints, _) = self.working.dim();
        if joint >= joints {
            return Err(ReconstructionError::InvalidJoint {
                joint,
                limit: joints,
            });
        }
        if camera >= cameras {
            return Err(ReconstructionError::InvalidCamera {
                camera,
                limit: cameras,
            });
        }
        Ok(())
    }

    /// The first [`DISPLAYED_JOINTS`] joints of one camera and frame, `[joint, 2]`.
    pub fn joints(&self, camera: usize, frame: usize) -> Result<ArrayView2<'_, Real>, ReconstructionError> {
        let (cameras, frames, joints, _) = self.working.dim();
        if camera >= cameras {
            return Err(ReconstructionError::InvalidCamera {
                camera,
                limit: cameras,
            });
        }
        if frame >= frames {
            return Err(ReconstructionError::InvalidFrameRange {
                start: frame,
                end: frame + 1,
                frames,
            });
        }
        Ok(self
            .working
            .slice(s![camera, frame, ..joints.min(DISPLAYED_JOINTS), ..]))
    }

    /// Treat `joint` as unobserved by `camera` in every frame.
    pub fn remove_joint(&mut self, camera: usize, joint: usize) -> Result<(), ReconstructionError> {
        self.check(camera, joint)?;
        self.working
            .slice_mut(s![camera, .., joint, ..])
            .fill(Real::NAN);
        Ok(())
    }

    /// Restore the loaded values of `joint` for `camera`.
    pub fn reinstate_joint(&mut self, camera: usize, joint: usize) -> Result<(), ReconstructionError> {
        self.check(camera, joint)?;
        self.working
            .slice_mut(s![camera, .., joint, ..])
            .assign(&self.original.slice(s![camera, .., joint, ..]));
        Ok(())
    }

    /// The working observations.
    pub fn observations(&self) -> ArrayView4<'_, Real> {
        self.working.view()
    }

    pub fn original(&self) -> ArrayView4<'_, Real> {
        self.original.view()
    }

    /// `true` when `camera` has no finite value of `joint` left.
    pub fn is_removed(&self, camera: usize, joint: usize) -> bool {
        camera < self.working.len_of(Axis(0))
            && joint < self.working.len_of(Axis(2))
            && self
                .working
                .slice(s![camera, .., joint, ..])
                .iter()
                .all(|v| v.is_nan())
    }

    /// Working observations ready for [`reconstruct`](crate::reconstruct).
    pub fn to_observations(&self) -> Observations2d {
        Observations2d::new(self.working.clone())
    }
}
