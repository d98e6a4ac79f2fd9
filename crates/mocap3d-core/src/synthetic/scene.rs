use ndarray::{Array3, Array4, Axis};

use crate::camera::{BrownConrady5, CameraModel, Intrinsics};
use crate::error::CalibrationError;
use crate::math::{Iso3, Pt3, Real, Vec3};
use crate::rig::{CameraRig, RigCamera};

use super::noise::unit_from_key;

/// Cameras evenly spaced on a horizontal circle, all aimed at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingRigSpec {
    pub num_cameras: usize,
    /// Circle radius in world units (millimeters).
    pub radius: Real,
    /// Height of the cameras above the world origin.
    pub height: Real,
    pub intrinsics: Intrinsics,
    pub distortion: BrownConrady5,
}

impl Default for RingRigSpec {
    fn default() -> Self {
        Self {
            num_cameras: 4,
            radius: 3000.0,
            height: 200.0,
            intrinsics: Intrinsics {
                fx: 1000.0,
                fy: 1000.0,
                cx: 640.0,
                cy: 360.0,
                skew: 0.0,
            },
            distortion: BrownConrady5::default(),
        }
    }
}

/// Build the rig described by `spec`.
pub fn ring_rig(spec: &RingRigSpec) -> Result<CameraRig, CalibrationError> {
    let cameras = (0..spec.num_cameras)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as Real / spec.num_cameras as Real;
            let eye = Pt3::new(
                spec.radius * angle.cos(),
                spec.radius * angle.sin(),
                spec.height,
            );
            // local +z looks at the origin; its inverse maps world -> camera
            let world_se3_cam = Iso3::face_towards(&eye, &Pt3::origin(), &Vec3::z());
            let mut cam = RigCamera::new(
                format!("cam_{i}"),
                CameraModel::new(spec.intrinsics, spec.distortion, world_se3_cam.inverse()),
            );
            cam.image_size = Some((
                (2.0 * spec.intrinsics.cx) as u32,
                (2.0 * spec.intrinsics.cy) as u32,
            ));
            cam
        })
        .collect();
    CameraRig::new(cameras)
}

/// Pseudo-random `[frame, point, 3]` tracks inside a box of half-width
/// `extent` around the origin.
///
/// Each point drifts smoothly from frame to frame so tracks look like
/// motion rather than independent noise.
pub fn skeleton_tracks(frames: usize, points: usize, extent: Real, seed: u64) -> Array3<Real> {
    let mut out = Array3::zeros((frames, points, 3));
    for point in 0..points {
        let base: Vec<Real> = (0..3)
            .map(|axis| (unit_from_key(seed, point, axis) - 0.5) * 1.6 * extent)
            .collect();
        let phase = unit_from_key(seed ^ 0xA5A5, point, 7) * std::f64::consts::TAU;
        for frame in 0..frames {
            let t = frame as Real * 0.1 + phase;
            let wobble = [t.sin(), t.cos(), (0.5 * t).sin()];
            for axis in 0..3 {
                out[[frame, point, axis]] = base[axis] + 0.2 * extent * wobble[axis];
            }
        }
    }
    out
}

/// Project `[frame, point, 3]` tracks into every rig camera:
/// `[camera, frame, point, 2]`, `NaN` where a point is behind a camera.
pub fn observe(rig: &CameraRig, tracks: &Array3<Real>) -> Array4<Real> {
    let (frames, points, _) = tracks.dim();
    let mut out = Array4::from_elem((rig.num_cameras(), frames, points, 2), Real::NAN);
    for (frame, per_frame) in tracks.axis_iter(Axis(0)).enumerate() {
        for (point, xyz) in per_frame.axis_iter(Axis(0)).enumerate() {
            let p = Pt3::new(xyz[0], xyz[1], xyz[2]);
            for (cam_idx, cam) in rig.cameras().iter().enumerate() {
                if let Some(px) = cam.model.project_world(&p) {
                    out[[cam_idx, frame, point, 0]] = px.x;
                    out[[cam_idx, frame, point, 1]] = px.y;
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_cameras_see_the_origin_at_the_principal_point() {
        let spec = RingRigSpec {
            height: 0.0,
            ..Default::default()
        };
        let rig = ring_rig(&spec).unwrap();
        assert_eq!(rig.num_cameras(), 4);
        for cam in rig.cameras() {
            let px = cam.model.project_world(&Pt3::origin()).unwrap();
            assert!((px.x - 640.0).abs() < 1e-9 && (px.y - 360.0).abs() < 1e-9);
        }
    }

    #[test]
    fn tracks_stay_inside_the_box() {
        let tracks = skeleton_tracks(20, 5, 400.0, 3);
        assert_eq!(tracks.dim(), (20, 5, 3));
        assert!(tracks.iter().all(|v| v.abs() <= 400.0));
    }

    #[test]
    fn observe_projects_every_point() {
        let rig = ring_rig(&RingRigSpec::default()).unwrap();
        let obs = observe(&rig, &skeleton_tracks(3, 2, 300.0, 1));
        assert_eq!(obs.dim(), (4, 3, 2, 2));
        assert!(obs.iter().all(|v| v.is_finite()));
    }
}
