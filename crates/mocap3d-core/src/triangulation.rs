//! Linear and RANSAC triangulation of a single 3D point from multiple views.
//!
//! Observations are expressed in undistorted normalized image coordinates and
//! paired with the `[R | t]` of their camera, so the DLT system does not
//! depend on the intrinsics.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::CameraModel;
use crate::math::{Mat34, Pt2, Pt3, Real, Vec2};
use crate::ransac::{Estimator, RansacOptions, ransac};

#[derive(Debug, Error, PartialEq)]
pub enum TriangulationError {
    #[error("need at least 2 views, got {0}")]
    NotEnoughViews(usize),
    #[error("mismatched number of poses ({poses}) and points ({points})")]
    Mismatch { poses: usize, points: usize },
    #[error("svd failed during triangulation")]
    SvdFailed,
    #[error("triangulated point is at infinity")]
    PointAtInfinity,
}

/// Linear triangulation from multiple views using DLT.
///
/// `poses` are the `[R | t]` matrices of the observing cameras and `points`
/// the matching undistorted normalized coordinates.
pub fn triangulate_point_linear(poses: &[Mat34], points: &[Vec2]) -> Result<Pt3, TriangulationError> {
    if poses.len() != points.len() {
        return Err(TriangulationError::Mismatch {
            poses: poses.len(),
            points: points.len(),
        });
    }
    if poses.len() < 2 {
        return Err(TriangulationError::NotEnoughViews(poses.len()));
    }

    let mut a = DMatrix::<Real>::zeros(2 * poses.len(), 4);
    for (i, (p, pose)) in points.iter().zip(poses.iter()).enumerate() {
        let row0 = pose.row(0);
        let row1 = pose.row(1);
        let row2 = pose.row(2);

        a.row_mut(2 * i).copy_from(&(p.x * row2 - row0));
        a.row_mut(2 * i + 1).copy_from(&(p.y * row2 - row1));
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(TriangulationError::SvdFailed)?;
    let x_h = v_t.row(v_t.nrows() - 1);

    let w = x_h[3];
    if w.abs() <= Real::EPSILON {
        return Err(TriangulationError::PointAtInfinity);
    }
    Ok(Pt3::new(x_h[0] / w, x_h[1] / w, x_h[2] / w))
}

/// One camera's view of the point being triangulated.
#[derive(Debug, Clone, Copy)]
pub struct PointObservation {
    pub camera: CameraModel,
    /// Observed pixel.
    pub pixel: Pt2,
    /// `pixel` undistorted onto the z = 1 plane.
    pub normalized: Vec2,
}

impl PointObservation {
    pub fn new(camera: CameraModel, pixel: Pt2) -> Self {
        let normalized = camera.normalize_pixel(&pixel);
        Self {
            camera,
            pixel,
            normalized,
        }
    }

    /// Pixel distance between the observation and the reprojection of `p`.
    ///
    /// Infinite when `p` projects behind the camera.
    pub fn reprojection_error(&self, p: &Pt3) -> Real {
        self.camera
            .project_world(p)
            .map(|proj| (proj - self.pixel).norm())
            .unwrap_or(Real::INFINITY)
    }
}

/// DLT over a set of observations.
pub fn triangulate_observations_linear(
    observations: &[PointObservation],
) -> Result<Pt3, TriangulationError> {
    let poses: Vec<Mat34> = observations.iter().map(|o| o.camera.pose_matrix()).collect();
    let points: Vec<Vec2> = observations.iter().map(|o| o.normalized).collect();
    triangulate_point_linear(&poses, &points)
}

/// Options for RANSAC triangulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacTriangulationOptions {
    /// Reprojection error (pixels) under which a camera counts as an inlier.
    pub inlier_threshold_px: Real,
    /// Maximum number of two-view samples per point.
    pub max_iters: usize,
    /// Seed for the sampling RNG.
    pub seed: u64,
}

impl Default for RansacTriangulationOptions {
    fn default() -> Self {
        Self {
            inlier_threshold_px: 20.0,
            max_iters: 100,
            seed: 1_234_567,
        }
    }
}

impl RansacTriangulationOptions {
    fn ransac_opts(&self) -> RansacOptions {
        RansacOptions {
            max_iters: self.max_iters,
            thresh: self.inlier_threshold_px,
            min_inliers: 2,
            confidence: 0.999,
            seed: self.seed,
            refit_on_inliers: true,
        }
    }
}

struct PointEstimator;

impl Estimator for PointEstimator {
    type Datum = PointObservation;
    type Model = Pt3;

    const MIN_SAMPLES: usize = 2;

    fn fit(data: &[PointObservation], sample_indices: &[usize]) -> Option<Pt3> {
        let subset: Vec<PointObservation> = sample_indices.iter().map(|&i| data[i]).collect();
        triangulate_observations_linear(&subset).ok()
    }

    fn residual(model: &Pt3, datum: &PointObservation) -> f64 {
        datum.reprojection_error(model)
    }

    fn refit(data: &[PointObservation], inliers: &[usize]) -> Option<Pt3> {
        Self::fit(data, inliers)
    }
}

/// Robust triangulation: the largest camera subset consistent within
/// `inlier_threshold_px` is refit with DLT.
///
/// Returns `None` when no two cameras agree.
pub fn triangulate_observations_ransac(
    observations: &[PointObservation],
    opts: &RansacTriangulationOptions,
) -> Option<Pt3> {
    ransac::<PointEstimator>(observations, &opts.ransac_opts()).model
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector4;

    fn project(pose: &Mat34, p: &Pt3) -> Vec2 {
        let x = pose * Vector4::new(p.x, p.y, p.z, 1.0);
        Vec2::new(x.x / x.z, x.y / x.z)
    }

    #[test]
    fn two_views_recover_point() {
        let pose1 = Mat34::new(1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let pose2 = Mat34::new(1.0, 0.0, 0.0, -0.2, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0);

        let pw = Pt3::new(0.1, -0.05, 2.0);
        let est = triangulate_point_linear(
            &[pose1, pose2],
            &[project(&pose1, &pw), project(&pose2, &pw)],
        )
        .unwrap();

        let err = (est - pw).norm();
        assert!(err < 1e-9, "triangulation error too large: {}", err);
    }

    #[test]
    fn single_view_is_rejected() {
        let pose = Mat34::identity();
        assert_eq!(
            triangulate_point_linear(&[pose], &[Vec2::zeros()]),
            Err(TriangulationError::NotEnoughViews(1))
        );
        assert_eq!(
            triangulate_point_linear(&[pose, pose], &[Vec2::zeros()]),
            Err(TriangulationError::Mismatch { poses: 2, points: 1 })
        );
    }

    #[test]
    fn ransac_options_fill_defaults_from_json() {
        let opts: RansacTriangulationOptions =
            serde_json::from_str(r#"{"inlier_threshold_px": 8.0}"#).unwrap();
        assert_eq!(opts.inlier_threshold_px, 8.0);
        assert_eq!(opts.max_iters, 100);
        assert_eq!(opts.seed, RansacTriangulationOptions::default().seed);
    }
}
