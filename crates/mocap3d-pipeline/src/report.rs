//! Consumers of the per-frame reprojection error series.
//!
//! The filter hands its before/after series to an [`ErrorReporter`]; plotting
//! or exporting the series is up to the implementation.

use log::info;
use mocap3d_core::Real;

/// When a series was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    BeforeFiltering,
    AfterFiltering,
}

impl std::fmt::Display for FilterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterStage::BeforeFiltering => write!(f, "before filtering"),
            FilterStage::AfterFiltering => write!(f, "after filtering"),
        }
    }
}

/// Receives `(frame_index, mean_error)` series together with the threshold
/// they are judged against.
///
/// Frame indices are relative to the reconstructed frame range.
pub trait ErrorReporter {
    fn report_series(&mut self, stage: FilterStage, series: &[(usize, Real)], threshold: Real);
}

impl<R: ErrorReporter + ?Sized> ErrorReporter for &mut R {
    fn report_series(&mut self, stage: FilterStage, series: &[(usize, Real)], threshold: Real) {
        (**self).report_series(stage, series, threshold);
    }
}

/// Discards every series.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ErrorReporter for NoopReporter {
    fn report_series(&mut self, _: FilterStage, _: &[(usize, Real)], _: Real) {}
}

/// Summarizes each series through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report_series(&mut self, stage: FilterStage, series: &[(usize, Real)], threshold: Real) {
        let finite: Vec<Real> = series
            .iter()
            .map(|&(_, e)| e)
            .filter(|e| e.is_finite())
            .collect();
        let above = finite.iter().filter(|&&e| e > threshold).count();
        let max = finite.iter().copied().fold(Real::NAN, Real::max);
        let mean = if finite.is_empty() {
            Real::NAN
        } else {
            finite.iter().sum::<Real>() / finite.len() as Real
        };
        info!(
            "reprojection error {}: {} frames, mean {:.3}px, max {:.3}px, {} above {:.1}px",
            stage,
            series.len(),
            mean,
            max,
            above,
            threshold
        );
    }
}

/// Keeps the last series of each stage, for tests and custom rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesRecorder {
    pub before: Option<Vec<(usize, Real)>>,
    pub after: Option<Vec<(usize, Real)>>,
    pub threshold: Option<Real>,
}

impl ErrorReporter for SeriesRecorder {
    fn report_series(&mut self, stage: FilterStage, series: &[(usize, Real)], threshold: Real) {
        let slot = match stage {
            FilterStage::BeforeFiltering => &mut self.before,
            FilterStage::AfterFiltering => &mut self.after,
        };
        *slot = Some(series.to_vec());
        self.threshold = Some(threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_before<R: ErrorReporter>(mut reporter: R) {
        reporter.report_series(FilterStage::BeforeFiltering, &[(0, 20.0), (1, 3.0)], 17.0);
    }

    #[test]
    fn recorder_keeps_both_stages() {
        let mut rec = SeriesRecorder::default();
        emit_before(&mut rec);
        rec.report_series(FilterStage::AfterFiltering, &[(0, 4.0), (1, 3.0)], 17.0);
        assert_eq!(rec.before, Some(vec![(0, 20.0), (1, 3.0)]));
        assert_eq!(rec.after, Some(vec![(0, 4.0), (1, 3.0)]));
        assert_eq!(rec.threshold, Some(17.0));
    }
}
