//! Batch triangulation of an observation tensor.

use log::{debug, info};
use mocap3d_core::{CalibrationProvider, CancelToken, Completion, Real, TriangulateOptions};
use ndarray::{Array2, Array3, ArrayView4, Axis, Zip};

use crate::error::ReconstructionError;

/// 3D points `[frame, point, 3]` and their mean reprojection error
/// `[frame, point]`. Both are `NaN` where a point could not be reconstructed.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangulatedData {
    pub points3d: Array3<Real>,
    pub reprojection_errors: Array2<Real>,
}

impl TriangulatedData {
    pub fn num_frames(&self) -> usize {
        self.points3d.len_of(Axis(0))
    }

    pub fn num_points(&self) -> usize {
        self.points3d.len_of(Axis(1))
    }
}

/// Triangulate every `(frame, point)` of a `[camera, frame, point, 2]` tensor.
///
/// The tensor is flattened to `[camera, frame * point, 2]` (sample index
/// `frame * points + point`), handed to `calibration`, and the results are
/// reshaped back. Points observed by fewer than two cameras are `NaN`
/// whatever the provider returns for them.
///
/// Returns [`Completion::Cancelled`] without data when `cancel` fires
/// before or during the provider call.
pub fn triangulate_observations<C>(
    observations: ArrayView4<'_, Real>,
    calibration: &C,
    opts: &TriangulateOptions,
    cancel: &CancelToken,
) -> Result<Completion<TriangulatedData>, ReconstructionError>
where
    C: CalibrationProvider + ?Sized,
{
    let (cams, frames, points, axes) = observations.dim();
    if axes != 2 {
        return Err(ReconstructionError::InvalidAxisCount(axes));
    }
    if cancel.is_cancelled() {
        return Ok(Completion::Cancelled);
    }
    info!(
        "triangulating {} frames x {} points from {} cameras",
        frames, points, cams
    );

    let samples = frames * points;
    let flat = observations
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((cams, samples, 2))?;

    let Completion::Completed(mut points3d) = calibration.triangulate(flat.view(), opts, cancel)?
    else {
        debug!("provider cancelled triangulation");
        return Ok(Completion::Cancelled);
    };
    if points3d.dim() != (samples, 3) {
        return Err(ReconstructionError::ShapeMismatch(format!(
            "provider returned 3D points of shape {:?}, expected ({samples}, 3)",
            points3d.dim()
        )));
    }

    let mut views = Array2::<usize>::zeros((cams, samples));
    Zip::from(&mut views)
        .and(flat.lanes(Axis(2)))
        .for_each(|seen, xy| *seen = usize::from(xy.iter().all(|v| v.is_finite())));
    let view_counts = views.sum_axis(Axis(0));
    let mut underobserved = 0usize;
    for (mut row, &count) in points3d.axis_iter_mut(Axis(0)).zip(view_counts.iter()) {
        if count < 2 {
            row.fill(Real::NAN);
            underobserved += 1;
        }
    }
    debug!("{} of {} samples seen by fewer than 2 cameras", underobserved, samples);

    let mut errors = calibration.reprojection_error(points3d.view(), flat.view())?;
    if errors.len() != samples {
        return Err(ReconstructionError::ShapeMismatch(format!(
            "provider returned {} reprojection errors, expected {samples}",
            errors.len()
        )));
    }
    Zip::from(&mut errors)
        .and(points3d.rows())
        .for_each(|e, p| {
            if p.iter().any(|v| v.is_nan()) {
                *e = Real::NAN;
            }
        });

    Ok(Completion::Completed(TriangulatedData {
        points3d: points3d
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((frames, points, 3))?,
        reprojection_errors: errors.into_shape_with_order((frames, points))?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mocap3d_core::CalibrationError;
    use ndarray::{Array1, Array4, ArrayView2, ArrayView3};

    /// Places every sample at `(sample, observing cameras, 0)` with error 1.
    struct CountingProvider;

    impl CalibrationProvider for CountingProvider {
        fn triangulate(
            &self,
            points_2d: ArrayView3<'_, Real>,
            _: &TriangulateOptions,
            _: &CancelToken,
        ) -> Result<Completion<Array2<Real>>, CalibrationError> {
            let n = points_2d.len_of(Axis(1));
            let mut out = Array2::zeros((n, 3));
            for s in 0..n {
                out[[s, 0]] = s as Real;
                out[[s, 1]] = (0..points_2d.len_of(Axis(0)))
                    .filter(|&c| points_2d[[c, s, 0]].is_finite())
                    .count() as Real;
            }
            Ok(Completion::Completed(out))
        }

        fn reprojection_error(
            &self,
            points_3d: ArrayView2<'_, Real>,
            _: ArrayView3<'_, Real>,
        ) -> Result<Array1<Real>, CalibrationError> {
            Ok(Array1::ones(points_3d.nrows()))
        }
    }

    #[test]
    fn samples_are_laid_out_frame_major() {
        let obs = Array4::<Real>::zeros((3, 2, 4, 2));
        let data = triangulate_observations(
            obs.view(),
            &CountingProvider,
            &TriangulateOptions::default(),
            &CancelToken::new(),
        )
        .unwrap()
        .completed()
        .unwrap();
        assert_eq!(data.points3d.dim(), (2, 4, 3));
        assert_eq!(data.reprojection_errors.dim(), (2, 4));
        assert_eq!(data.points3d[[1, 2, 0]], 6.0);
        assert_eq!(data.points3d[[1, 2, 1]], 3.0);
    }

    #[test]
    fn underobserved_points_are_nan() {
        let mut obs = Array4::<Real>::zeros((3, 1, 2, 2));
        obs[[0, 0, 1, 0]] = Real::NAN;
        obs[[2, 0, 1, 1]] = Real::NAN;
        let data = triangulate_observations(
            obs.view(),
            &CountingProvider,
            &TriangulateOptions::default(),
            &CancelToken::new(),
        )
        .unwrap()
        .completed()
        .unwrap();
        assert!(data.points3d[[0, 0, 0]].is_finite());
        assert!(data.points3d.index_axis(Axis(1), 1).iter().all(|v| v.is_nan()));
        assert!(data.reprojection_errors[[0, 1]].is_nan());
        assert_eq!(data.reprojection_errors[[0, 0]], 1.0);
    }

    #[test]
    fn wrong_axis_count_is_fatal() {
        let obs = Array4::<Real>::zeros((2, 1, 1, 3));
        let err = triangulate_observations(
            obs.view(),
            &CountingProvider,
            &TriangulateOptions::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconstructionError::InvalidAxisCount(3)));
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let obs = Array4::<Real>::zeros((2, 1, 1, 2));
        let res = triangulate_observations(
            obs.view(),
            &CountingProvider,
            &TriangulateOptions::default(),
            &cancel,
        )
        .unwrap();
        assert!(res.is_cancelled());
    }
}
