//! Loading camera rigs from anipose-style calibration TOML files.
//!
//! Each camera is a table named `cam_<index>`:
//!
//! ```toml
//! [cam_0]
//! name = "cam_0"
//! size = [1280, 720]
//! matrix = [[900.0, 0.0, 640.0], [0.0, 900.0, 360.0], [0.0, 0.0, 1.0]]
//! distortions = [-0.1, 0.01, 0.0, 0.0, 0.0]
//! rotation = [0.0, 0.1, 0.0]
//! translation = [-100.0, 0.0, 3000.0]
//! ```
//!
//! `distortions` uses OpenCV order `[k1, k2, p1, p2, k3]`, `rotation` is a
//! Rodrigues vector and together with `translation` maps world points into
//! the camera frame. Other top-level tables (e.g. `[metadata]`) are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::camera::{BrownConrady5, CameraModel, Intrinsics};
use crate::error::CalibrationError;
use crate::math::{Mat3, Real, Vec3, iso_from_rodrigues, rodrigues_from_iso};
use crate::rig::{CameraRig, RigCamera};

const CAMERA_TABLE_PREFIX: &str = "cam_";

#[derive(Debug, Serialize, Deserialize)]
struct CameraEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<[u32; 2]>,
    matrix: [[Real; 3]; 3],
    #[serde(default)]
    distortions: Vec<Real>,
    rotation: [Real; 3],
    translation: [Real; 3],
}

impl CameraEntry {
    fn into_camera(self, key: &str) -> Result<RigCamera, CalibrationError> {
        let name = self.name.unwrap_or_else(|| key.to_string());
        let invalid = |reason: String| CalibrationError::InvalidCamera {
            camera: name.clone(),
            reason,
        };

        let m = self.matrix;
        let k = Intrinsics::from_k_matrix(&Mat3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ));
        if !k.is_valid() {
            return Err(invalid("camera matrix has a zero or non-finite focal length".into()));
        }
        let dist = BrownConrady5::from_opencv(&self.distortions).ok_or_else(|| {
            invalid(format!(
                "expected 0, 1, 2, 4 or 5 distortion coefficients, got {}",
                self.distortions.len()
            ))
        })?;
        if self
            .rotation
            .iter()
            .chain(self.translation.iter())
            .any(|v| !v.is_finite())
        {
            return Err(invalid("extrinsics must be finite".into()));
        }
        let pose = iso_from_rodrigues(&Vec3::from(self.rotation), &Vec3::from(self.translation));

        Ok(RigCamera {
            image_size: self.size.map(|[w, h]| (w, h)),
            model: CameraModel::new(k, dist, pose),
            name,
        })
    }
}

/// Parse a calibration TOML document into a [`CameraRig`].
///
/// Cameras are ordered by the numeric suffix of their `cam_<index>` key.
pub fn parse_calibration_toml(text: &str) -> Result<CameraRig, CalibrationError> {
    let table: toml::Table = toml::from_str(text)?;

    let mut entries = Vec::new();
    for (key, value) in table {
        let Some(index) = key
            .strip_prefix(CAMERA_TABLE_PREFIX)
            .and_then(|suffix| suffix.parse::<usize>().ok())
        else {
            continue;
        };
        let entry: CameraEntry = value.try_into()?;
        entries.push((index, key, entry));
    }
    entries.sort_by_key(|(index, _, _)| *index);

    let cameras = entries
        .into_iter()
        .map(|(_, key, entry)| entry.into_camera(&key))
        .collect::<Result<Vec<_>, _>>()?;
    CameraRig::new(cameras)
}

/// Load a calibration TOML file from disk.
pub fn load_calibration_toml(path: impl AsRef<Path>) -> Result<CameraRig, CalibrationError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rig = parse_calibration_toml(&text)?;
    info!(
        "loaded calibration with {} cameras from {}",
        rig.num_cameras(),
        path.display()
    );
    Ok(rig)
}

impl CameraEntry {
    fn from_camera(cam: &RigCamera) -> Self {
        let k = cam.model.k;
        let d = cam.model.dist;
        let (r, t) = rodrigues_from_iso(&cam.model.cam_se3_world);
        Self {
            name: Some(cam.name.clone()),
            size: cam.image_size.map(|(w, h)| [w, h]),
            matrix: [[k.fx, k.skew, k.cx], [0.0, k.fy, k.cy], [0.0, 0.0, 1.0]],
            distortions: vec![d.k1, d.k2, d.p1, d.p2, d.k3],
            rotation: [r.x, r.y, r.z],
            translation: [t.x, t.y, t.z],
        }
    }
}

/// Render a rig back into the calibration TOML layout.
pub fn to_calibration_toml(rig: &CameraRig) -> Result<String, CalibrationError> {
    let tables: BTreeMap<String, CameraEntry> = rig
        .cameras()
        .iter()
        .enumerate()
        .map(|(idx, cam)| (format!("{CAMERA_TABLE_PREFIX}{idx}"), CameraEntry::from_camera(cam)))
        .collect();
    Ok(toml::to_string(&tables)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_CAMERAS: &str = r#"
[cam_1]
name = "right"
size = [1280, 720]
matrix = [[1000.0, 0.0, 640.0], [0.0, 1000.0, 360.0], [0.0, 0.0, 1.0]]
distortions = [-0.1, 0.01, 0.0, 0.0, 0.0]
rotation = [0.0, -0.2, 0.0]
translation = [500.0, 0.0, 3000.0]

[cam_0]
name = "left"
size = [1280, 720]
matrix = [[1000.0, 0.0, 640.0], [0.0, 1000.0, 360.0], [0.0, 0.0, 1.0]]
distortions = [-0.1]
rotation = [0.0, 0.2, 0.0]
translation = [-500.0, 0.0, 3000.0]

[metadata]
adjusted = false
"#;

    #[test]
    fn cameras_are_ordered_by_index() {
        let rig = parse_calibration_toml(TWO_CAMERAS).unwrap();
        assert_eq!(rig.num_cameras(), 2);
        assert_eq!(rig.cameras()[0].name, "left");
        assert_eq!(rig.cameras()[1].name, "right");
        assert_eq!(rig.cameras()[0].image_size, Some((1280, 720)));
        assert_eq!(rig.cameras()[0].model.dist.k1, -0.1);
        assert_eq!(rig.cameras()[1].model.k.fx, 1000.0);
    }

    #[test]
    fn rendered_toml_parses_back() {
        let rig = parse_calibration_toml(TWO_CAMERAS).unwrap();
        let again = parse_calibration_toml(&to_calibration_toml(&rig).unwrap()).unwrap();
        for (a, b) in rig.cameras().iter().zip(again.cameras()) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.model.k, b.model.k);
            assert!((a.model.cam_se3_world.translation.vector
                - b.model.cam_se3_world.translation.vector)
                .norm()
                < 1e-9);
        }
    }

    #[test]
    fn names_with_control_characters_survive_rendering() {
        let mut rig = parse_calibration_toml(TWO_CAMERAS).unwrap();
        let mut cameras = rig.cameras().to_vec();
        cameras[0].name = "a\u{1}b \"quoted\"".to_string();
        cameras[1].image_size = None;
        rig = CameraRig::new(cameras).unwrap();

        let again = parse_calibration_toml(&to_calibration_toml(&rig).unwrap()).unwrap();
        assert_eq!(again.cameras()[0].name, "a\u{1}b \"quoted\"");
        assert_eq!(again.cameras()[1].image_size, None);
        assert_eq!(again.cameras()[0].model.dist, rig.cameras()[0].model.dist);
    }

    #[test]
    fn negative_image_size_is_a_parse_error() {
        let text = TWO_CAMERAS.replacen("size = [1280, 720]", "size = [-1280, 720]", 1);
        assert!(matches!(
            parse_calibration_toml(&text),
            Err(CalibrationError::Toml(_))
        ));
        let text = TWO_CAMERAS.replacen("size = [1280, 720]", "size = [1280.5, 720]", 1);
        assert!(matches!(
            parse_calibration_toml(&text),
            Err(CalibrationError::Toml(_))
        ));
    }

    #[test]
    fn file_without_cameras_is_rejected() {
        let err = parse_calibration_toml("[metadata]\nadjusted = true\n").unwrap_err();
        assert!(matches!(err, CalibrationError::NoCameras));
    }

    #[test]
    fn bad_distortion_length_is_rejected() {
        let text = TWO_CAMERAS.replace("distortions = [-0.1]", "distortions = [0.0, 0.0, 0.0]");
        let err = parse_calibration_toml(&text).unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidCamera { ref camera, .. } if camera == "left"));
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let err = parse_calibration_toml("[cam_0]\nname = \"a\"\n").unwrap_err();
        assert!(matches!(err, CalibrationError::Toml(_)));
    }
}
