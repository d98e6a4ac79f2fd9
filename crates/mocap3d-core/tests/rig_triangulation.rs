use mocap3d_core::synthetic::{RingRigSpec, observe, ring_rig, skeleton_tracks};
use mocap3d_core::{
    BrownConrady5, CalibrationError, CalibrationProvider, CancelToken, Completion, Real,
    TriangulateOptions, load_calibration_toml, to_calibration_toml,
};
use ndarray::{Array3, Array4, Axis, s};

fn flatten(obs: &Array4<Real>) -> Array3<Real> {
    let (c, f, p, _) = obs.dim();
    obs.clone().into_shape_with_order((c, f * p, 2)).unwrap()
}

fn distorted_spec(num_cameras: usize) -> RingRigSpec {
    RingRigSpec {
        num_cameras,
        distortion: BrownConrady5 {
            k1: -0.05,
            k2: 0.01,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn linear_triangulation_recovers_tracks() {
    let rig = ring_rig(&distorted_spec(4)).unwrap();
    let tracks = skeleton_tracks(5, 6, 400.0, 11);
    let obs = flatten(&observe(&rig, &tracks));

    let pts = rig
        .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
        .unwrap()
        .completed()
        .expect("not cancelled");
    assert_eq!(pts.dim(), (30, 3));

    let truth = tracks.into_shape_with_order((30, 3)).unwrap();
    for (est, gt) in pts.axis_iter(Axis(0)).zip(truth.axis_iter(Axis(0))) {
        let d = (&est - &gt).mapv(|v| v * v).sum().sqrt();
        assert!(d < 1e-6, "point off by {d} mm");
    }

    let errors = rig.reprojection_error(pts.view(), obs.view()).unwrap();
    assert!(errors.iter().all(|&e| e < 1e-6));
}

#[test]
fn samples_seen_by_one_camera_stay_nan() {
    let rig = ring_rig(&RingRigSpec::default()).unwrap();
    let mut obs = flatten(&observe(&rig, &skeleton_tracks(1, 3, 300.0, 2)));
    for cam in 1..4 {
        obs[[cam, 1, 0]] = Real::NAN;
        obs[[cam, 1, 1]] = Real::NAN;
    }

    let pts = rig
        .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    assert!(pts.row(1).iter().all(|v| v.is_nan()));
    assert!(pts.row(0).iter().all(|v| v.is_finite()));

    let errors = rig.reprojection_error(pts.view(), obs.view()).unwrap();
    assert!(errors[1].is_nan());
    assert!(errors[0] < 1e-6);
}

#[test]
fn ransac_ignores_a_corrupted_camera() {
    let rig = ring_rig(&RingRigSpec {
        num_cameras: 6,
        ..Default::default()
    })
    .unwrap();
    let tracks = skeleton_tracks(2, 4, 300.0, 5);
    let mut obs = flatten(&observe(&rig, &tracks));
    obs.slice_mut(s![3, .., 1]).mapv_inplace(|y| y + 300.0);

    let plain = rig
        .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let plain_err = rig.reprojection_error(plain.view(), obs.view()).unwrap();
    assert!(plain_err.iter().all(|&e| e > 1.0));

    let opts = TriangulateOptions {
        use_ransac: true,
        ..Default::default()
    };
    let robust = rig
        .triangulate(obs.view(), &opts, &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let truth = tracks.into_shape_with_order((8, 3)).unwrap();
    let max_diff = (&robust - &truth).iter().fold(0.0, |m: Real, d| m.max(d.abs()));
    assert!(max_diff < 1e-6, "max diff {max_diff}");
}

#[test]
fn cancelled_token_stops_triangulation() {
    let rig = ring_rig(&RingRigSpec::default()).unwrap();
    let obs = flatten(&observe(&rig, &skeleton_tracks(2, 2, 300.0, 1)));
    let cancel = CancelToken::new();
    cancel.cancel();

    let res = rig
        .triangulate(obs.view(), &TriangulateOptions::default(), &cancel)
        .unwrap();
    assert_eq!(res, Completion::Cancelled);
}

#[test]
fn camera_count_must_match() {
    let rig = ring_rig(&RingRigSpec::default()).unwrap();
    let obs = Array3::<Real>::zeros((3, 4, 2));
    let err = rig
        .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::CameraCountMismatch {
            expected: 4,
            actual: 3
        }
    ));
}

#[test]
fn calibration_file_round_trips_through_disk() {
    let rig = ring_rig(&distorted_spec(3)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.toml");
    std::fs::write(&path, to_calibration_toml(&rig).unwrap()).unwrap();

    let loaded = load_calibration_toml(&path).unwrap();
    assert_eq!(loaded.num_cameras(), 3);

    let tracks = skeleton_tracks(1, 4, 300.0, 9);
    let obs = flatten(&observe(&rig, &tracks));
    let pts = loaded
        .triangulate(obs.view(), &TriangulateOptions::default(), &CancelToken::new())
        .unwrap()
        .completed()
        .unwrap();
    let truth = tracks.into_shape_with_order((4, 3)).unwrap();
    assert!((&pts - &truth).iter().all(|d| d.abs() < 1e-5));
}

#[test]
fn missing_file_reports_its_path() {
    let err = load_calibration_toml("/nonexistent/calibration.toml").unwrap_err();
    match err {
        CalibrationError::Io { path, .. } => {
            assert!(path.ends_with("calibration.toml"));
        }
        other => panic!("unexpected error {other}"),
    }
}
