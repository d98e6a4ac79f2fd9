//! Reconstruction session: a mutable container driven by step functions.
//!
//! ```no_run
//! use mocap3d_core::load_calibration_toml;
//! use mocap3d_pipeline::session::{ReconstructionSession, run_reconstruction};
//! use mocap3d_pipeline::Observations2d;
//! # fn main() -> anyhow::Result<()> {
//! # let observations: Observations2d = unimplemented!();
//! let rig = load_calibration_toml("calibration.toml")?;
//! let mut session = ReconstructionSession::new(rig);
//! session.set_input(observations);
//!
//! if run_reconstruction(&mut session, None)?.is_completed() {
//!     let output = session.require_output()?;
//!     println!("{} frames reconstructed", output.points3d.len_of(ndarray::Axis(0)));
//! }
//! # Ok(())
//! # }
//! ```

use std::ops::Range;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use mocap3d_core::{CalibrationProvider, CancelToken, Completion, Real};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::config::{FrameRange, ReconstructionConfig};
use crate::filter::filter_by_reprojection_error;
use crate::reconstruct::{Observations2d, ReconstructionOutput, prepare_observations};
use crate::report::{ErrorReporter, LogReporter};
use crate::triangulator::{TriangulatedData, triangulate_observations};

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Lightweight operation log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix timestamp of the operation (seconds since epoch).
    pub timestamp: u64,
    /// Operation name (e.g. "triangulate", "filter").
    pub operation: String,
    pub success: bool,
    /// Optional notes or error message.
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn success(operation: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: true,
            notes: None,
        }
    }

    pub fn success_with_notes(operation: impl Into<String>, notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::success(operation)
        }
    }

    pub fn failure(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            timestamp: current_timestamp(),
            operation: operation.into(),
            success: false,
            notes: Some(error.into()),
        }
    }
}

/// Intermediate results between steps.
#[derive(Debug, Clone, Default)]
pub struct ReconstructionState {
    /// Observations after frame/point selection and confidence thresholding.
    pub prepared: Option<Array4<Real>>,
    /// Frames of the input covered by `prepared` and `raw`.
    pub frames: Option<Range<usize>>,
    /// Unfiltered triangulation.
    pub raw: Option<TriangulatedData>,
}

/// Holds the calibration, configuration, input, intermediate state and
/// final output of a reconstruction.
#[derive(Debug)]
pub struct ReconstructionSession<C> {
    pub config: ReconstructionConfig,
    calibration: C,
    input: Option<Observations2d>,
    pub state: ReconstructionState,
    output: Option<ReconstructionOutput>,
    /// Operation log (lightweight audit trail).
    pub log: Vec<LogEntry>,
    cancel: CancelToken,
}

impl<C: CalibrationProvider> ReconstructionSession<C> {
    pub fn new(calibration: C) -> Self {
        Self {
            config: ReconstructionConfig::default(),
            calibration,
            input: None,
            state: ReconstructionState::default(),
            output: None,
            log: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn calibration(&self) -> &C {
        &self.calibration
    }

    /// Token cancelling the steps of this session; clone it to cancel from
    /// another thread. Call [`CancelToken::reset`] before running again.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Set new observations. Clears intermediate state and output.
    pub fn set_input(&mut self, input: Observations2d) {
        self.state = ReconstructionState::default();
        self.output = None;
        self.input = Some(input);
    }

    pub fn input(&self) -> Option<&Observations2d> {
        self.input.as_ref()
    }

    pub fn require_input(&self) -> Result<&Observations2d> {
        self.input
            .as_ref()
            .ok_or_else(|| anyhow!("no input observations set"))
    }

    /// Replace the configuration after validating it. Clears state and output.
    pub fn set_config(&mut self, config: ReconstructionConfig) -> Result<()> {
        config.validate().context("invalid reconstruction config")?;
        self.config = config;
        self.reset_state();
        Ok(())
    }

    pub fn output(&self) -> Option<&ReconstructionOutput> {
        self.output.as_ref()
    }

    pub fn require_output(&self) -> Result<&ReconstructionOutput> {
        self.output
            .as_ref()
            .ok_or_else(|| anyhow!("no output available, run the reconstruction first"))
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    pub fn log_success(&mut self, operation: impl Into<String>) {
        self.log.push(LogEntry::success(operation));
    }

    pub fn log_success_with_notes(&mut self, operation: impl Into<String>, notes: impl Into<String>) {
        self.log.push(LogEntry::success_with_notes(operation, notes));
    }

    pub fn log_failure(&mut self, operation: impl Into<String>, error: impl Into<String>) {
        self.log.push(LogEntry::failure(operation, error));
    }

    /// Drop intermediate state and output, keeping input and config.
    pub fn reset_state(&mut self) {
        self.state = ReconstructionState::default();
        self.output = None;
    }
}

/// Triangulate the input over `frame_range` (default: every frame).
///
/// Replaces the intermediate state and clears any previous output.
pub fn step_triangulate<C: CalibrationProvider>(
    session: &mut ReconstructionSession<C>,
    frame_range: Option<FrameRange>,
) -> Result<Completion<()>> {
    let input = session.require_input()?;
    let prepared = prepare_observations(input, &session.config, frame_range.unwrap_or_default());
    let (prepared, frames) = match prepared {
        Ok(prepared) => prepared,
        Err(err) => {
            session.log_failure("triangulate", err.to_string());
            return Err(err).context("failed to prepare observations");
        }
    };

    let result = triangulate_observations(
        prepared.view(),
        &session.calibration,
        &session.config.triangulate_opts(),
        &session.cancel,
    );
    let data = match result {
        Ok(Completion::Completed(data)) => data,
        Ok(Completion::Cancelled) => {
            session.log_failure("triangulate", "cancelled");
            return Ok(Completion::Cancelled);
        }
        Err(err) => {
            session.log_failure("triangulate", err.to_string());
            return Err(err).context("triangulation failed");
        }
    };

    let reconstructed = data.points3d.iter().filter(|v| v.is_finite()).count() / 3;
    let notes = format!(
        "frames {}..{}, {} of {} points reconstructed",
        frames.start,
        frames.end,
        reconstructed,
        data.num_frames() * data.num_points()
    );
    session.state = ReconstructionState {
        prepared: Some(prepared),
        frames: Some(frames),
        raw: Some(data),
    };
    session.output = None;
    session.log_success_with_notes("triangulate", notes);
    Ok(Completion::Completed(()))
}

/// Filter the raw triangulation by reprojection error and store the output.
///
/// The raw triangulation is kept, so the step can be re-run with another
/// threshold. A cancelled run leaves the output unset.
pub fn step_filter<C, R>(
    session: &mut ReconstructionSession<C>,
    reporter: &mut R,
) -> Result<Completion<()>>
where
    C: CalibrationProvider,
    R: ErrorReporter + ?Sized,
{
    let (Some(prepared), Some(frames), Some(raw)) = (
        session.state.prepared.as_ref(),
        session.state.frames.clone(),
        session.state.raw.as_ref(),
    ) else {
        return Err(anyhow!("triangulation required before filtering"));
    };

    let mut data = raw.clone();
    let result = filter_by_reprojection_error(
        &mut data,
        prepared.view(),
        &session.calibration,
        &session.config.filter_opts(),
        reporter,
        &session.cancel,
    );
    let report = match result {
        Ok(Completion::Completed(report)) => report,
        Ok(Completion::Cancelled) => {
            session.log_failure("filter", "cancelled");
            return Ok(Completion::Cancelled);
        }
        Err(err) => {
            session.log_failure("filter", err.to_string());
            return Err(err).context("reprojection filtering failed");
        }
    };

    let notes = format!(
        "{:?}: {} repaired, {} rejected, {} exclusion sets",
        report.outcome,
        report.repaired_frames.len(),
        report.rejected_frames.len(),
        report.combinations_tried.len()
    );
    session.output = Some(ReconstructionOutput {
        points3d: data.points3d,
        reprojection_errors: data.reprojection_errors,
        frames,
        report,
    });
    session.log_success_with_notes("filter", notes);
    Ok(Completion::Completed(()))
}

/// Run the full pipeline over every frame: triangulate, then filter.
pub fn run_reconstruction<C: CalibrationProvider>(
    session: &mut ReconstructionSession<C>,
    config: Option<ReconstructionConfig>,
) -> Result<Completion<()>> {
    if let Some(cfg) = config {
        session.set_config(cfg)?;
    }
    run_steps(session, None)
}

/// Re-run the pipeline on frames `start..end` only.
pub fn reconstruct_range<C: CalibrationProvider>(
    session: &mut ReconstructionSession<C>,
    start: usize,
    end: usize,
) -> Result<Completion<()>> {
    run_steps(session, Some(FrameRange::new(start, end)))
}

fn run_steps<C: CalibrationProvider>(
    session: &mut ReconstructionSession<C>,
    frame_range: Option<FrameRange>,
) -> Result<Completion<()>> {
    if step_triangulate(session, frame_range)?.is_cancelled() {
        return Ok(Completion::Cancelled);
    }
    step_filter(session, &mut LogReporter)
}
