//! Calibrated multi-camera rig implementing [`CalibrationProvider`].

use log::debug;
use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::camera::CameraModel;
use crate::cancel::{CancelToken, Completion};
use crate::error::CalibrationError;
use crate::math::{Pt2, Pt3, Real};
use crate::provider::{CalibrationProvider, TriangulateOptions};
use crate::triangulation::{
    PointObservation, triangulate_observations_linear, triangulate_observations_ransac,
};

/// Samples triangulated between two polls of the cancellation token.
const CANCEL_POLL_INTERVAL: usize = 256;

/// One camera of a rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigCamera {
    pub name: String,
    /// Image size `(width, height)` in pixels, when known.
    pub image_size: Option<(u32, u32)>,
    pub model: CameraModel,
}

impl RigCamera {
    pub fn new(name: impl Into<String>, model: CameraModel) -> Self {
        Self {
            name: name.into(),
            image_size: None,
            model,
        }
    }
}

/// Immutable set of calibrated cameras sharing one world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRig {
    cameras: Vec<RigCamera>,
}

fn finite_pixel(points_2d: &ArrayView3<'_, Real>, cam: usize, sample: usize) -> Option<Pt2> {
    let x = points_2d[[cam, sample, 0]];
    let y = points_2d[[cam, sample, 1]];
    (x.is_finite() && y.is_finite()).then(|| Pt2::new(x, y))
}

fn finite_point(points_3d: &ArrayView2<'_, Real>, sample: usize) -> Option<Pt3> {
    let row = points_3d.row(sample);
    row.iter()
        .all(|v| v.is_finite())
        .then(|| Pt3::new(row[0], row[1], row[2]))
}

impl CameraRig {
    pub fn new(cameras: Vec<RigCamera>) -> Result<Self, CalibrationError> {
        if cameras.is_empty() {
            return Err(CalibrationError::NoCameras);
        }
        for cam in &cameras {
            if !cam.model.k.is_valid() {
                return Err(CalibrationError::InvalidCamera {
                    camera: cam.name.clone(),
                    reason: "intrinsics must be finite with non-zero focal lengths".to_string(),
                });
            }
        }
        Ok(Self { cameras })
    }

    pub fn num_cameras(&self) -> usize {
        self.cameras.len()
    }

    pub fn cameras(&self) -> &[RigCamera] {
        &self.cameras
    }

    pub fn camera(&self, idx: usize) -> Option<&RigCamera> {
        self.cameras.get(idx)
    }

    fn check_observations(&self, points_2d: &ArrayView3<'_, Real>) -> Result<(), CalibrationError> {
        let (cams, _, axes) = points_2d.dim();
        if cams != self.cameras.len() {
            return Err(CalibrationError::CameraCountMismatch {
                expected: self.cameras.len(),
                actual: cams,
            });
        }
        if axes != 2 {
            return Err(CalibrationError::ShapeMismatch(format!(
                "2D observations need 2 coordinates per point, got {axes}"
            )));
        }
        Ok(())
    }

    /// Observations of one sample by every camera that saw it.
    fn observations_of(
        &self,
        points_2d: &ArrayView3<'_, Real>,
        sample: usize,
    ) -> Vec<PointObservation> {
        self.cameras
            .iter()
            .enumerate()
            .filter_map(|(cam_idx, cam)| {
                finite_pixel(points_2d, cam_idx, sample)
                    .map(|px| PointObservation::new(cam.model, px))
            })
            .collect()
    }

    /// Triangulate one sample; `None` when fewer than two cameras agree.
    pub fn triangulate_sample(
        &self,
        points_2d: &ArrayView3<'_, Real>,
        sample: usize,
        opts: &TriangulateOptions,
    ) -> Option<Pt3> {
        let obs = self.observations_of(points_2d, sample);
        if obs.len() < 2 {
            return None;
        }
        if opts.use_ransac {
            triangulate_observations_ransac(&obs, &opts.ransac)
        } else {
            triangulate_observations_linear(&obs).ok()
        }
    }

    /// Project `[sample, 3]` world points into every camera: `[camera, sample, 2]`.
    ///
    /// `NaN` for points that are `NaN` or behind the camera.
    pub fn project(&self, points_3d: ArrayView2<'_, Real>) -> Array3<Real> {
        let n = points_3d.nrows();
        let mut out = Array3::from_elem((self.cameras.len(), n, 2), Real::NAN);
        for sample in 0..n {
            let Some(p) = finite_point(&points_3d, sample) else {
                continue;
            };
            for (cam_idx, cam) in self.cameras.iter().enumerate() {
                if let Some(px) = cam.model.project_world(&p) {
                    out[[cam_idx, sample, 0]] = px.x;
                    out[[cam_idx, sample, 1]] = px.y;
                }
            }
        }
        out
    }

    /// Reprojection error of every sample in every camera: `[camera, sample]`.
    ///
    /// `NaN` where the camera has no observation, the point is `NaN`, or the
    /// point is behind the camera.
    pub fn reprojection_errors_per_camera(
        &self,
        points_3d: ArrayView2<'_, Real>,
        points_2d: ArrayView3<'_, Real>,
    ) -> Result<Array2<Real>, CalibrationError> {
        self.check_observations(&points_2d)?;
        let n = points_2d.len_of(Axis(1));
        if points_3d.dim() != (n, 3) {
            return Err(CalibrationError::ShapeMismatch(format!(
                "expected 3D points of shape ({n}, 3), got {:?}",
                points_3d.dim()
            )));
        }

        let mut errors = Array2::from_elem((self.cameras.len(), n), Real::NAN);
        for sample in 0..n {
            let Some(p) = finite_point(&points_3d, sample) else {
                continue;
            };
            for (cam_idx, cam) in self.cameras.iter().enumerate() {
                let Some(px) = finite_pixel(&points_2d, cam_idx, sample) else {
                    continue;
                };
                if let Some(proj) = cam.model.project_world(&p) {
                    errors[[cam_idx, sample]] = (proj - px).norm();
                }
            }
        }
        Ok(errors)
    }
}

impl CalibrationProvider for CameraRig {
    fn triangulate(
        &self,
        points_2d: ArrayView3<'_, Real>,
        opts: &TriangulateOptions,
        cancel: &CancelToken,
    ) -> Result<Completion<Array2<Real>>, CalibrationError> {
        self.check_observations(&points_2d)?;
        let n = points_2d.len_of(Axis(1));
        debug!(
            "triangulating {} samples from {} cameras (ransac: {})",
            n,
            self.cameras.len(),
            opts.use_ransac
        );

        let mut out = Array2::from_elem((n, 3), Real::NAN);
        for sample in 0..n {
            if sample % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
                debug!("triangulation cancelled at sample {}", sample);
                return Ok(Completion::Cancelled);
            }
            if let Some(p) = self.triangulate_sample(&points_2d, sample, opts) {
                out[[sample, 0]] = p.x;
                out[[sample, 1]] = p.y;
                out[[sample, 2]] = p.z;
            }
        }
        Ok(Completion::Completed(out))
    }

    fn reprojection_error(
        &self,
        points_3d: ArrayView2<'_, Real>,
        points_2d: ArrayView3<'_, Real>,
    ) -> Result<Array1<Real>, CalibrationError> {
        let per_camera = self.reprojection_errors_per_camera(points_3d, points_2d)?;
        Ok(per_camera
            .axis_iter(Axis(1))
            .map(|errs| {
                let (sum, count) = errs
                    .iter()
                    .filter(|e| e.is_finite())
                    .fold((0.0, 0usize), |(s, c), &e| (s + e, c + 1));
                if count == 0 { Real::NAN } else { sum / count as Real }
            })
            .collect())
    }
}
