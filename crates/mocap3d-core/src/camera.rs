//! Pinhole camera model with Brown-Conrady distortion.
//!
//! Camera pipeline (world point to pixel):
//! `pixel = intrinsics(distortion(normalize(cam_se3_world * p_world)))`

use serde::{Deserialize, Serialize};

use crate::math::{Iso3, Mat3, Mat34, Pt2, Pt3, Real, Vec2, pose_matrix};

/// Standard pinhole intrinsics with optional skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length in pixels along X.
    pub fx: Real,
    /// Focal length in pixels along Y.
    pub fy: Real,
    /// Principal point X coordinate in pixels.
    pub cx: Real,
    /// Principal point Y coordinate in pixels.
    pub cy: Real,
    /// Skew term (typically 0).
    pub skew: Real,
}

impl Intrinsics {
    /// Build intrinsics from a 3x3 camera matrix `K`.
    pub fn from_k_matrix(k: &Mat3) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
            skew: k[(0, 1)],
        }
    }

    /// Return the 3x3 camera intrinsics matrix K.
    pub fn k_matrix(&self) -> Mat3 {
        Mat3::new(
            self.fx, self.skew, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0,
        )
    }

    /// Convert normalized (distorted) coordinates into pixel coordinates.
    pub fn sensor_to_pixel(&self, n: &Vec2) -> Pt2 {
        Pt2::new(
            self.fx * n.x + self.skew * n.y + self.cx,
            self.fy * n.y + self.cy,
        )
    }

    /// Convert pixel coordinates into normalized (distorted) coordinates.
    pub fn pixel_to_sensor(&self, px: &Pt2) -> Vec2 {
        let sy = (px.y - self.cy) / self.fy;
        let sx = (px.x - self.cx - self.skew * sy) / self.fx;
        Vec2::new(sx, sy)
    }

    /// True when both focal lengths are finite and non-zero.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.skew.is_finite()
            && self.fx.abs() > Real::EPSILON
            && self.fy.abs() > Real::EPSILON
    }
}

/// Brown-Conrady distortion with three radial and two tangential terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownConrady5 {
    pub k1: Real,
    pub k2: Real,
    pub k3: Real,
    pub p1: Real,
    pub p2: Real,
    /// Fixed-point iterations used by [`BrownConrady5::undistort`] (0 = default of 10).
    pub iters: u32,
}

impl BrownConrady5 {
    /// Build from an OpenCV coefficient vector `[k1, k2, p1, p2, k3]`.
    ///
    /// Shorter vectors (0, 1, 2 or 4 entries) leave the missing terms at
    /// zero. Returns `None` for any other length.
    pub fn from_opencv(coeffs: &[Real]) -> Option<Self> {
        let get = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        match coeffs.len() {
            0 | 1 | 2 | 4 | 5 => Some(Self {
                k1: get(0),
                k2: get(1),
                p1: get(2),
                p2: get(3),
                k3: get(4),
                iters: 0,
            }),
            _ => None,
        }
    }

    /// True when every coefficient is zero.
    pub fn is_identity(&self) -> bool {
        self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0 && self.p1 == 0.0 && self.p2 == 0.0
    }

    fn distort_impl(&self, x: Real, y: Real) -> (Real, Real) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let radial = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;

        let x_tan = 2.0 * self.p1 * x * y + self.p2 * (r2 + 2.0 * x * x);
        let y_tan = self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * x * y;

        (x * radial + x_tan, y * radial + y_tan)
    }

    /// Apply distortion to undistorted normalized coordinates.
    pub fn distort(&self, n_undist: &Vec2) -> Vec2 {
        let (xd, yd) = self.distort_impl(n_undist.x, n_undist.y);
        Vec2::new(xd, yd)
    }

    /// Remove distortion by fixed-point iteration.
    pub fn undistort(&self, n_dist: &Vec2) -> Vec2 {
        if self.is_identity() {
            return *n_dist;
        }
        let mut x = n_dist.x;
        let mut y = n_dist.y;

        let iters = if self.iters == 0 { 10 } else { self.iters };
        for _ in 0..iters {
            let (xd, yd) = self.distort_impl(x, y);
            x -= xd - n_dist.x;
            y -= yd - n_dist.y;
        }
        Vec2::new(x, y)
    }
}

/// A calibrated camera: intrinsics, distortion and the world -> camera pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Intrinsics (K).
    pub k: Intrinsics,
    /// Lens distortion.
    pub dist: BrownConrady5,
    /// Rigid transform mapping world points into the camera frame.
    pub cam_se3_world: Iso3,
}

impl CameraModel {
    pub fn new(k: Intrinsics, dist: BrownConrady5, cam_se3_world: Iso3) -> Self {
        Self {
            k,
            dist,
            cam_se3_world,
        }
    }

    /// Project a world point into pixel coordinates.
    ///
    /// Returns `None` if the point is behind the camera.
    pub fn project_world(&self, p_w: &Pt3) -> Option<Pt2> {
        let p_c = self.cam_se3_world * p_w;
        if p_c.z <= 0.0 {
            return None;
        }
        let n_u = Vec2::new(p_c.x / p_c.z, p_c.y / p_c.z);
        let n_d = self.dist.distort(&n_u);
        Some(self.k.sensor_to_pixel(&n_d))
    }

    /// Map a pixel to undistorted normalized coordinates on the z = 1 plane.
    pub fn normalize_pixel(&self, px: &Pt2) -> Vec2 {
        let n_d = self.k.pixel_to_sensor(px);
        self.dist.undistort(&n_d)
    }

    /// `[R | t]` for use with normalized image coordinates.
    pub fn pose_matrix(&self) -> Mat34 {
        pose_matrix(&self.cam_se3_world)
    }

    /// Full projection matrix `K [R | t]` (distortion ignored).
    pub fn projection_matrix(&self) -> Mat34 {
        self.k.k_matrix() * self.pose_matrix()
    }
}
