//! Reprojection-error filtering by iterative camera exclusion.
//!
//! Frames whose mean reprojection error exceeds the threshold are
//! re-triangulated with growing sets of cameras removed, one exclusion
//! combination at a time, until every frame is back under the threshold or
//! fewer than two cameras would remain. Frames that never recover are
//! rejected: their points and errors become `NaN`.
//!
//! Each re-triangulation overwrites the affected frames in place, even when
//! the new error is higher than the previous one. There is no rollback.

use log::{debug, info, warn};
use mocap3d_core::{CalibrationProvider, CancelToken, Completion, Real, TriangulateOptions};
use ndarray::{Array1, ArrayView1, ArrayView2, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

use crate::combinations::exclusion_combinations;
use crate::error::ReconstructionError;
use crate::report::{ErrorReporter, FilterStage};
use crate::triangulator::{TriangulatedData, triangulate_observations};

/// Fewest cameras a re-triangulation may use.
const MIN_CAMERAS: usize = 2;

/// Options for [`filter_by_reprojection_error`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Mean reprojection error per frame (pixels) above which a frame is
    /// re-triangulated.
    pub threshold: Real,
    /// Strategy used for re-triangulation.
    pub triangulate: TriangulateOptions,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            threshold: 17.0,
            triangulate: TriangulateOptions::default(),
        }
    }
}

/// How the exclusion search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOutcome {
    /// No frame was above the threshold.
    Clean,
    /// Every offending frame was brought under the threshold.
    Converged,
    /// Some frames were still above the threshold when the combinations ran
    /// out, or lost every point to exclusion, and are `NaN`.
    Rejected,
}

/// Summary of a filter run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    pub outcome: FilterOutcome,
    /// Frames above the threshold on entry.
    pub frames_above_threshold_initial: Vec<usize>,
    /// Frames brought under the threshold.
    pub repaired_frames: Vec<usize>,
    /// Frames set to `NaN`, or left with no reconstructable point.
    pub rejected_frames: Vec<usize>,
    /// Excluded camera sets, in the order they were tried.
    pub combinations_tried: Vec<Vec<usize>>,
}

impl FilterReport {
    fn new(initial: Vec<usize>) -> Self {
        Self {
            outcome: FilterOutcome::Clean,
            frames_above_threshold_initial: initial,
            repaired_frames: Vec::new(),
            rejected_frames: Vec::new(),
            combinations_tried: Vec::new(),
        }
    }
}

/// Mean of the non-`NaN` point errors of each frame; `NaN` when a frame has
/// no finite error.
pub fn mean_error_per_frame(errors: ArrayView2<'_, Real>) -> Array1<Real> {
    errors
        .axis_iter(Axis(0))
        .map(|frame| {
            let (sum, count) = frame
                .iter()
                .filter(|e| !e.is_nan())
                .fold((0.0, 0usize), |(s, c), &e| (s + e, c + 1));
            if count == 0 { Real::NAN } else { sum / count as Real }
        })
        .collect()
}

/// Indices of frames whose mean error is strictly above `threshold`.
pub fn frames_above_threshold(mean_errors: ArrayView1<'_, Real>, threshold: Real) -> Vec<usize> {
    mean_errors
        .iter()
        .enumerate()
        .filter(|&(_, &e)| e > threshold)
        .map(|(frame, _)| frame)
        .collect()
}

fn error_series(mean_errors: &Array1<Real>) -> Vec<(usize, Real)> {
    mean_errors.iter().copied().enumerate().collect()
}

fn check_shapes(
    data: &TriangulatedData,
    observations: &ArrayView4<'_, Real>,
) -> Result<(), ReconstructionError> {
    let (_, frames, points, axes) = observations.dim();
    if axes != 2 {
        return Err(ReconstructionError::InvalidAxisCount(axes));
    }
    if data.points3d.dim() != (frames, points, 3) || data.reprojection_errors.dim() != (frames, points)
    {
        return Err(ReconstructionError::ShapeMismatch(format!(
            "triangulated data {:?}/{:?} does not match {} frames x {} points",
            data.points3d.dim(),
            data.reprojection_errors.dim(),
            frames,
            points
        )));
    }
    Ok(())
}

/// Repair or reject frames of `data` whose mean reprojection error exceeds
/// `opts.threshold`.
///
/// `observations` is the `[camera, frame, point, 2]` tensor `data` was
/// triangulated from. Exclusion sets of size 1, 2, ... are tried, each size
/// in lexicographic order and consumed from the last set backwards. Only the
/// frames still above the threshold are re-triangulated, with the excluded
/// cameras' observations treated as missing, and their results are written
/// back unconditionally.
///
/// `cancel` is polled before each re-triangulation. On cancellation the
/// function returns [`Completion::Cancelled`]; overwrites committed by
/// earlier iterations stay in `data`.
///
/// The reporter receives the per-frame mean error series on entry and, when
/// the search finishes, after filtering.
pub fn filter_by_reprojection_error<C, R>(
    data: &mut TriangulatedData,
    observations: ArrayView4<'_, Real>,
    calibration: &C,
    opts: &FilterOptions,
    reporter: &mut R,
    cancel: &CancelToken,
) -> Result<Completion<FilterReport>, ReconstructionError>
where
    C: CalibrationProvider + ?Sized,
    R: ErrorReporter + ?Sized,
{
    check_shapes(data, &observations)?;
    let total_cameras = observations.len_of(Axis(0));
    let threshold = opts.threshold;

    let before = mean_error_per_frame(data.reprojection_errors.view());
    reporter.report_series(FilterStage::BeforeFiltering, &error_series(&before), threshold);

    let mut frames = frames_above_threshold(before.view(), threshold);
    let mut report = FilterReport::new(frames.clone());
    if frames.is_empty() {
        debug!("no frame above {threshold}px, nothing to filter");
        reporter.report_series(FilterStage::AfterFiltering, &error_series(&before), threshold);
        return Ok(Completion::Completed(report));
    }
    info!(
        "{} of {} frames above {}px reprojection error",
        frames.len(),
        before.len(),
        threshold
    );

    let max_exclusions = total_cameras.saturating_sub(MIN_CAMERAS);
    let mut exclude = 0;
    let mut queue: Vec<Vec<usize>> = Vec::new();
    while !frames.is_empty() {
        let Some(excluded) = queue.pop() else {
            exclude += 1;
            if exclude > max_exclusions {
                warn!(
                    "rejecting {} frames: no camera subset of at least {} cameras brings them under {}px",
                    frames.len(),
                    MIN_CAMERAS,
                    threshold
                );
                for &frame in &frames {
                    data.points3d.index_axis_mut(Axis(0), frame).fill(Real::NAN);
                    data.reprojection_errors
                        .index_axis_mut(Axis(0), frame)
                        .fill(Real::NAN);
                }
                report.rejected_frames = std::mem::take(&mut frames);
                break;
            }
            queue = exclusion_combinations(total_cameras, exclude);
            debug!("trying {} exclusion sets of size {}", queue.len(), exclude);
            continue;
        };

        if cancel.is_cancelled() {
            info!("filtering cancelled before excluding cameras {:?}", excluded);
            return Ok(Completion::Cancelled);
        }

        let mut reduced = observations.select(Axis(1), &frames);
        for &cam in &excluded {
            reduced.index_axis_mut(Axis(0), cam).fill(Real::NAN);
        }
        info!(
            "re-triangulating {} frames without cameras {:?}",
            frames.len(),
            excluded
        );
        let Completion::Completed(partial) =
            triangulate_observations(reduced.view(), calibration, &opts.triangulate, cancel)?
        else {
            return Ok(Completion::Cancelled);
        };

        for (i, &frame) in frames.iter().enumerate() {
            data.points3d
                .index_axis_mut(Axis(0), frame)
                .assign(&partial.points3d.index_axis(Axis(0), i));
            data.reprojection_errors
                .index_axis_mut(Axis(0), frame)
                .assign(&partial.reprojection_errors.index_axis(Axis(0), i));
        }
        report.combinations_tried.push(excluded);

        let means = mean_error_per_frame(data.reprojection_errors.view());
        frames = frames_above_threshold(means.view(), threshold);
    }

    // frames that left the search because every point lost its second view
    let after = mean_error_per_frame(data.reprojection_errors.view());
    let invalidated: Vec<usize> = report
        .frames_above_threshold_initial
        .iter()
        .copied()
        .filter(|&f| after[f].is_nan() && !report.rejected_frames.contains(&f))
        .collect();
    if !invalidated.is_empty() {
        warn!(
            "{} frames lost every point to camera exclusion: {:?}",
            invalidated.len(),
            invalidated
        );
        report.rejected_frames.extend(invalidated);
        report.rejected_frames.sort_unstable();
    }

    report.repaired_frames = report
        .frames_above_threshold_initial
        .iter()
        .copied()
        .filter(|f| !report.rejected_frames.contains(f))
        .collect();
    report.outcome = if report.rejected_frames.is_empty() {
        FilterOutcome::Converged
    } else {
        FilterOutcome::Rejected
    };
    info!(
        "filtering done: {} repaired, {} rejected after {} exclusion sets",
        report.repaired_frames.len(),
        report.rejected_frames.len(),
        report.combinations_tried.len()
    );

    reporter.report_series(FilterStage::AfterFiltering, &error_series(&after), threshold);
    Ok(Completion::Completed(report))
}
