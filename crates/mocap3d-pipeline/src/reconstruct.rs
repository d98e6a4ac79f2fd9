//! End-to-end reconstruction: thresholding, triangulation and filtering.

use std::ops::Range;
use std::path::Path;

use log::info;
use mocap3d_core::{CalibrationProvider, CancelToken, Completion, Real, load_calibration_toml};
use ndarray::{Array2, Array3, Array4, ArrayView3, ArrayView4, Axis, Zip, s};

use crate::config::{FrameRange, ReconstructionConfig};
use crate::error::ReconstructionError;
use crate::filter::{FilterReport, filter_by_reprojection_error};
use crate::report::ErrorReporter;
use crate::triangulator::{TriangulatedData, triangulate_observations};

/// 2D keypoints `[camera, frame, point, 2]` with optional per-observation
/// confidence `[camera, frame, point]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations2d {
    points: Array4<Real>,
    confidence: Option<Array3<Real>>,
}

impl Observations2d {
    pub fn new(points: Array4<Real>) -> Self {
        Self {
            points,
            confidence: None,
        }
    }

    /// # Errors
    ///
    /// [`ReconstructionError::ShapeMismatch`] unless `confidence` has the
    /// `[camera, frame, point]` shape of `points`.
    pub fn with_confidence(
        points: Array4<Real>,
        confidence: Array3<Real>,
    ) -> Result<Self, ReconstructionError> {
        let (c, f, p, _) = points.dim();
        if confidence.dim() != (c, f, p) {
            return Err(ReconstructionError::ShapeMismatch(format!(
                "confidence shape {:?} does not match observations ({c}, {f}, {p})",
                confidence.dim()
            )));
        }
        Ok(Self {
            points,
            confidence: Some(confidence),
        })
    }

    pub fn points(&self) -> ArrayView4<'_, Real> {
        self.points.view()
    }

    pub fn confidence(&self) -> Option<ArrayView3<'_, Real>> {
        self.confidence.as_ref().map(|c| c.view())
    }

    pub fn num_cameras(&self) -> usize {
        self.points.len_of(Axis(0))
    }

    pub fn num_frames(&self) -> usize {
        self.points.len_of(Axis(1))
    }

    pub fn num_points(&self) -> usize {
        self.points.len_of(Axis(2))
    }
}

/// Mark observations with confidence `<= threshold` as missing.
///
/// Returns the number of observations removed. `NaN` confidences are kept.
pub fn apply_confidence_threshold(
    points: &mut Array4<Real>,
    confidence: ArrayView3<'_, Real>,
    threshold: Real,
) -> usize {
    let mut removed = 0;
    Zip::from(points.lanes_mut(Axis(3)))
        .and(&confidence)
        .for_each(|mut xy, &c| {
            if c <= threshold {
                xy.fill(Real::NAN);
                removed += 1;
            }
        });
    let missing = points.iter().filter(|v| v.is_nan()).count();
    info!(
        "confidence <= {threshold}: removed {removed} observations, {:.1}% of coordinates missing",
        100.0 * missing as Real / points.len().max(1) as Real
    );
    removed
}

/// Cut `observations` to `frame_range` and the tracked points, and apply the
/// confidence threshold.
pub(crate) fn prepare_observations(
    observations: &Observations2d,
    config: &ReconstructionConfig,
    frame_range: FrameRange,
) -> Result<(Array4<Real>, Range<usize>), ReconstructionError> {
    config.validate()?;
    let (_, frames, points, axes) = observations.points.dim();
    if axes != 2 {
        return Err(ReconstructionError::InvalidAxisCount(axes));
    }
    let range = frame_range.resolve(frames)?;
    let tracked = points.min(config.tracked_point_limit);

    let mut prepared = observations
        .points
        .slice(s![.., range.clone(), ..tracked, ..])
        .to_owned();
    if let Some(confidence) = &observations.confidence {
        apply_confidence_threshold(
            &mut prepared,
            confidence.slice(s![.., range.clone(), ..tracked]),
            config.confidence_threshold,
        );
    }
    Ok((prepared, range))
}

/// Result of [`reconstruct`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionOutput {
    /// `[frame, point, 3]` for the frames of `frames`; `NaN` where rejected.
    pub points3d: Array3<Real>,
    /// `[frame, point]` mean reprojection error in pixels.
    pub reprojection_errors: Array2<Real>,
    /// Frames of the input the output covers.
    pub frames: Range<usize>,
    pub report: FilterReport,
}

/// Reconstruct 3D trajectories from multi-camera 2D keypoints.
///
/// Observations below the confidence threshold are dropped, the frame range
/// and the first `config.tracked_point_limit` points are triangulated, and
/// frames above the reprojection error threshold are repaired or rejected by
/// [`filter_by_reprojection_error`].
///
/// Returns [`Completion::Cancelled`] when `cancel` fires during either stage.
pub fn reconstruct<C, R>(
    observations: &Observations2d,
    calibration: &C,
    config: &ReconstructionConfig,
    frame_range: FrameRange,
    reporter: &mut R,
    cancel: &CancelToken,
) -> Result<Completion<ReconstructionOutput>, ReconstructionError>
where
    C: CalibrationProvider + ?Sized,
    R: ErrorReporter + ?Sized,
{
    let (prepared, frames) = prepare_observations(observations, config, frame_range)?;
    info!(
        "reconstructing frames {}..{} ({} points)",
        frames.start,
        frames.end,
        prepared.len_of(Axis(2))
    );

    let Completion::Completed(mut data) =
        triangulate_observations(prepared.view(), calibration, &config.triangulate_opts(), cancel)?
    else {
        return Ok(Completion::Cancelled);
    };
    let Completion::Completed(report) = filter_by_reprojection_error(
        &mut data,
        prepared.view(),
        calibration,
        &config.filter_opts(),
        reporter,
        cancel,
    )?
    else {
        return Ok(Completion::Cancelled);
    };

    let TriangulatedData {
        points3d,
        reprojection_errors,
    } = data;
    Ok(Completion::Completed(ReconstructionOutput {
        points3d,
        reprojection_errors,
        frames,
        report,
    }))
}

/// Load a calibration TOML file and run [`reconstruct`] with it.
///
/// A calibration that cannot be loaded is a fatal error.
pub fn reconstruct_from_file<R>(
    calibration_path: impl AsRef<Path>,
    observations: &Observations2d,
    config: &ReconstructionConfig,
    frame_range: FrameRange,
    reporter: &mut R,
    cancel: &CancelToken,
) -> Result<Completion<ReconstructionOutput>, ReconstructionError>
where
    R: ErrorReporter + ?Sized,
{
    let rig = load_calibration_toml(calibration_path)?;
    reconstruct(observations, &rig, config, frame_range, reporter, cancel)
}
