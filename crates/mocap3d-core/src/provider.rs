//! The calibration capability consumed by the reconstruction pipeline.

use ndarray::{Array1, Array2, ArrayView2, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::cancel::{CancelToken, Completion};
use crate::error::CalibrationError;
use crate::math::Real;
use crate::triangulation::RansacTriangulationOptions;

/// Strategy selection for [`CalibrationProvider::triangulate`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulateOptions {
    /// Use robust RANSAC triangulation instead of plain DLT.
    pub use_ransac: bool,
    /// Parameters of the RANSAC strategy.
    pub ransac: RansacTriangulationOptions,
}

/// Multi-view triangulation and reprojection error over flattened samples.
///
/// Arrays follow the layout used throughout the pipeline:
///
/// - 2D observations: `[camera, sample, 2]`, `NaN` for a missing observation,
/// - 3D points: `[sample, 3]`, `NaN` where triangulation is not possible,
/// - errors: `[sample]`.
///
/// Implementations must yield `NaN` for samples seen by fewer than two
/// cameras, and should poll `cancel` regularly while triangulating.
pub trait CalibrationProvider {
    /// Triangulate every sample.
    ///
    /// Returns [`Completion::Cancelled`] with no data when `cancel` fires
    /// before the call finishes.
    fn triangulate(
        &self,
        points_2d: ArrayView3<'_, Real>,
        opts: &TriangulateOptions,
        cancel: &CancelToken,
    ) -> Result<Completion<Array2<Real>>, CalibrationError>;

    /// Mean reprojection error per sample across the cameras that observed it.
    fn reprojection_error(
        &self,
        points_3d: ArrayView2<'_, Real>,
        points_2d: ArrayView3<'_, Real>,
    ) -> Result<Array1<Real>, CalibrationError>;
}

impl<T: CalibrationProvider + ?Sized> CalibrationProvider for &T {
    fn triangulate(
        &self,
        points_2d: ArrayView3<'_, Real>,
        opts: &TriangulateOptions,
        cancel: &CancelToken,
    ) -> Result<Completion<Array2<Real>>, CalibrationError> {
        (**self).triangulate(points_2d, opts, cancel)
    }

    fn reprojection_error(
        &self,
        points_3d: ArrayView2<'_, Real>,
        points_2d: ArrayView3<'_, Real>,
    ) -> Result<Array1<Real>, CalibrationError> {
        (**self).reprojection_error(points_3d, points_2d)
    }
}
