//! Reconstruction configuration and frame ranges.

use std::ops::Range;

use mocap3d_core::{RansacTriangulationOptions, Real, TriangulateOptions};
use serde::{Deserialize, Serialize};

use crate::error::ReconstructionError;
use crate::filter::FilterOptions;

/// Configuration of a reconstruction run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    /// Observations with confidence `<=` this value are treated as missing.
    /// Default: 0.5.
    pub confidence_threshold: Real,
    /// Frames whose mean reprojection error (pixels) exceeds this value go
    /// through the camera-exclusion search. Default: 17.0.
    pub reprojection_error_threshold: Real,
    /// Triangulate with RANSAC instead of plain DLT. Default: false.
    pub use_ransac: bool,
    /// RANSAC parameters, used when `use_ransac` is set.
    pub ransac: RansacTriangulationOptions,
    /// Only the first `tracked_point_limit` keypoints are reconstructed.
    /// Default: 33 (the body landmarks of a pose model).
    pub tracked_point_limit: usize,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            reprojection_error_threshold: 17.0,
            use_ransac: false,
            ransac: RansacTriangulationOptions::default(),
            tracked_point_limit: 33,
        }
    }
}

impl ReconstructionConfig {
    pub fn validate(&self) -> Result<(), ReconstructionError> {
        let invalid = |msg: &str| -> Result<(), ReconstructionError> {
            Err(ReconstructionError::InvalidConfig(msg.to_string()))
        };
        if !self.confidence_threshold.is_finite() {
            return invalid("confidence_threshold must be finite");
        }
        if !(self.reprojection_error_threshold.is_finite() && self.reprojection_error_threshold >= 0.0)
        {
            return invalid("reprojection_error_threshold must be finite and non-negative");
        }
        if !(self.ransac.inlier_threshold_px.is_finite() && self.ransac.inlier_threshold_px > 0.0) {
            return invalid("ransac.inlier_threshold_px must be finite and positive");
        }
        if self.ransac.max_iters == 0 {
            return invalid("ransac.max_iters must be positive");
        }
        if self.tracked_point_limit == 0 {
            return invalid("tracked_point_limit must be positive");
        }
        Ok(())
    }

    pub fn triangulate_opts(&self) -> TriangulateOptions {
        TriangulateOptions {
            use_ransac: self.use_ransac,
            ransac: self.ransac,
        }
    }

    pub fn filter_opts(&self) -> FilterOptions {
        FilterOptions {
            threshold: self.reprojection_error_threshold,
            triangulate: self.triangulate_opts(),
        }
    }
}

/// Half-open frame interval `[start, end)`; a missing bound means the
/// start or end of the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl FrameRange {
    /// Every frame of the recording.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Resolve against a recording of `frames` frames.
    ///
    /// An `end` past the last frame is an error rather than being clamped to
    /// `frames`, so a range never silently covers fewer frames than asked.
    ///
    /// # Errors
    ///
    /// [`ReconstructionError::InvalidFrameRange`] if the range is empty or
    /// ends past the last frame.
    pub fn resolve(&self, frames: usize) -> Result<Range<usize>, ReconstructionError> {
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(frames);
        if end <= start || end > frames {
            return Err(ReconstructionError::InvalidFrameRange { start, end, frames });
        }
        Ok(start..end)
    }
}

impl From<Range<usize>> for FrameRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = ReconstructionConfig::default();
        assert_eq!(cfg.confidence_threshold, 0.5);
        assert_eq!(cfg.reprojection_error_threshold, 17.0);
        assert!(!cfg.use_ransac);
        assert_eq!(cfg.tracked_point_limit, 33);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_json_roundtrip_fills_missing_fields() {
        let cfg: ReconstructionConfig =
            serde_json::from_str(r#"{"reprojection_error_threshold": 10.0, "use_ransac": true}"#)
                .unwrap();
        assert_eq!(cfg.reprojection_error_threshold, 10.0);
        assert!(cfg.use_ransac);
        assert_eq!(cfg.tracked_point_limit, 33);

        let json = serde_json::to_string(&cfg).unwrap();
        let back: ReconstructionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cfg = ReconstructionConfig {
            reprojection_error_threshold: -1.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ReconstructionError::InvalidConfig(_))));

        let cfg = ReconstructionConfig {
            tracked_point_limit: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn frame_range_resolution() {
        assert_eq!(FrameRange::all().resolve(10).unwrap(), 0..10);
        assert_eq!(
            FrameRange {
                start: Some(3),
                end: None
            }
            .resolve(10)
            .unwrap(),
            3..10
        );
        assert_eq!(FrameRange::from(2..5).resolve(10).unwrap(), 2..5);

        for bad in [FrameRange::new(5, 5), FrameRange::new(6, 2), FrameRange::new(0, 11)] {
            assert!(matches!(
                bad.resolve(10),
                Err(ReconstructionError::InvalidFrameRange { frames: 10, .. })
            ));
        }
    }

    #[test]
    fn end_past_recording_is_not_clamped() {
        let err = FrameRange::new(8, 12).resolve(10).unwrap_err();
        assert!(matches!(
            err,
            ReconstructionError::InvalidFrameRange {
                start: 8,
                end: 12,
                frames: 10
            }
        ));
        assert_eq!(FrameRange::new(8, 10).resolve(10).unwrap(), 8..10);
    }
}
