//! Mathematical utilities and type definitions.
//!
//! This module provides the scalar and linear algebra aliases used across
//! the workspace, plus a few pose helpers for the Rodrigues rotation format
//! used by calibration files.

use nalgebra::{
    Isometry3, Matrix3, Matrix3x4, Point2, Point3, Rotation3, Translation3, UnitQuaternion,
    Vector2, Vector3,
};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 2D point with [`Real`] coordinates.
pub type Pt2 = Point2<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;
/// 3×4 projection matrix `P = [R | t]` (or `K [R | t]`).
pub type Mat34 = Matrix3x4<Real>;
/// 3D rigid transform (SE(3)) using [`Real`].
pub type Iso3 = Isometry3<Real>;

/// Build a world -> camera transform from a Rodrigues rotation vector and a
/// translation.
///
/// The rotation vector is an axis scaled by the rotation angle in radians,
/// the convention used by OpenCV and anipose calibration files.
pub fn iso_from_rodrigues(rvec: &Vec3, tvec: &Vec3) -> Iso3 {
    let rot = Rotation3::new(*rvec);
    Iso3::from_parts(
        Translation3::from(*tvec),
        UnitQuaternion::from_rotation_matrix(&rot),
    )
}

/// Inverse of [`iso_from_rodrigues`]: returns `(rvec, tvec)`.
pub fn rodrigues_from_iso(iso: &Iso3) -> (Vec3, Vec3) {
    (iso.rotation.scaled_axis(), iso.translation.vector)
}

/// The `[R | t]` part of a rigid transform as a 3x4 matrix.
pub fn pose_matrix(iso: &Iso3) -> Mat34 {
    iso.to_homogeneous().fixed_view::<3, 4>(0, 0).into_owned()
}
