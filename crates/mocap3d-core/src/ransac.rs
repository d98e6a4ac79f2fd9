//! Small, deterministic RANSAC engine.
//!
//! Implement [`Estimator`] for a model and call [`ransac`]. The engine never
//! panics on failure: when no consensus is found the returned
//! [`RansacResult`] has `model == None`.

use rand::prelude::IndexedRandom;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// Configuration for [`ransac`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RansacOptions {
    /// Maximum number of sampling iterations.
    pub max_iters: usize,
    /// Inlier residual threshold.
    pub thresh: f64,
    /// Minimum number of inliers required to accept a model.
    pub min_inliers: usize,
    /// Desired probability in `[0, 1]` of drawing at least one clean sample.
    pub confidence: f64,
    /// Seed of the sampling RNG.
    pub seed: u64,
    /// Refit the model on its inliers before scoring.
    pub refit_on_inliers: bool,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            max_iters: 200,
            thresh: 2.0,
            min_inliers: 2,
            confidence: 0.999,
            seed: 1_234_567,
            refit_on_inliers: true,
        }
    }
}

/// Output of a RANSAC run.
#[derive(Debug, Clone)]
pub struct RansacResult<M> {
    /// Best model found, if any sample reached `min_inliers`.
    pub model: Option<M>,
    /// Indices of the inliers of `model`.
    pub inliers: Vec<usize>,
    /// Root-mean-square residual over the inliers.
    pub inlier_rms: f64,
    /// Iterations performed.
    pub iters: usize,
}

impl<M> Default for RansacResult<M> {
    fn default() -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            inlier_rms: f64::INFINITY,
            iters: 0,
        }
    }
}

impl<M> RansacResult<M> {
    pub fn success(&self) -> bool {
        self.model.is_some()
    }
}

/// Model estimator plugged into [`ransac`].
pub trait Estimator {
    type Datum;
    type Model;

    /// Minimal sample size.
    const MIN_SAMPLES: usize;

    /// Fit a model from the data at `sample_indices`; `None` if degenerate.
    fn fit(data: &[Self::Datum], sample_indices: &[usize]) -> Option<Self::Model>;

    /// Non-negative residual of one datum, in the units of `RansacOptions::thresh`.
    fn residual(model: &Self::Model, datum: &Self::Datum) -> f64;

    /// Refit on a full inlier set. Default: keep the sampled model.
    fn refit(_data: &[Self::Datum], _inliers: &[usize]) -> Option<Self::Model> {
        None
    }
}

fn rms(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::INFINITY;
    }
    let ss: f64 = vals.iter().map(|&v| v * v).sum();
    (ss / vals.len() as f64).sqrt()
}

/// Iterations needed to draw a clean minimal sample with probability
/// `confidence`, given the inlier ratio of the best model so far.
fn required_iterations(
    confidence: f64,
    inlier_ratio: f64,
    min_samples: usize,
    iters_so_far: usize,
    max_iters: usize,
) -> usize {
    if confidence <= 0.0 || inlier_ratio <= 0.0 {
        return max_iters;
    }
    let denom = (1.0 - inlier_ratio.powi(min_samples as i32)).max(1e-12).ln();
    if denom >= 0.0 {
        return max_iters;
    }
    let n_iter = ((1.0 - confidence).ln() / denom).ceil() as usize;
    n_iter.clamp(iters_so_far, max_iters)
}

fn collect_inliers<E: Estimator>(
    data: &[E::Datum],
    model: &E::Model,
    thresh: f64,
    inliers: &mut Vec<usize>,
    residuals: &mut Vec<f64>,
) {
    inliers.clear();
    residuals.clear();
    for (i, datum) in data.iter().enumerate() {
        let r = E::residual(model, datum);
        if r <= thresh {
            inliers.push(i);
            residuals.push(r);
        }
    }
}

/// Run RANSAC for estimator `E` over `data`.
pub fn ransac<E: Estimator>(data: &[E::Datum], opts: &RansacOptions) -> RansacResult<E::Model> {
    let mut best = RansacResult::default();
    if data.len() < E::MIN_SAMPLES {
        return best;
    }

    let all_indices: Vec<usize> = (0..data.len()).collect();
    let mut sample = vec![0usize; E::MIN_SAMPLES];
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let mut inliers = Vec::with_capacity(data.len());
    let mut residuals = Vec::with_capacity(data.len());

    let mut budget = opts.max_iters;
    let mut iters = 0;
    while iters < budget {
        iters += 1;
        for (slot, &idx) in sample
            .iter_mut()
            .zip(all_indices.choose_multiple(&mut rng, E::MIN_SAMPLES))
        {
            *slot = idx;
        }

        let Some(mut model) = E::fit(data, &sample) else {
            continue;
        };
        collect_inliers::<E>(data, &model, opts.thresh, &mut inliers, &mut residuals);
        if inliers.len() < opts.min_inliers {
            continue;
        }

        if opts.refit_on_inliers {
            if let Some(refit) = E::refit(data, &inliers) {
                model = refit;
                collect_inliers::<E>(data, &model, opts.thresh, &mut inliers, &mut residuals);
                if inliers.len() < opts.min_inliers {
                    continue;
                }
            }
        }

        let inlier_rms = rms(&residuals);
        let better = best.model.is_none()
            || inliers.len() > best.inliers.len()
            || (inliers.len() == best.inliers.len() && inlier_rms < best.inlier_rms);
        if better {
            best.model = Some(model);
            best.inliers = inliers.clone();
            best.inlier_rms = inlier_rms;

            let ratio = best.inliers.len() as f64 / data.len() as f64;
            budget = required_iterations(
                opts.confidence,
                ratio,
                E::MIN_SAMPLES,
                iters,
                opts.max_iters,
            );
        }
    }

    best.iters = iters;
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Estimates a 1D location from scalar samples.
    struct LocationEstimator;

    impl Estimator for LocationEstimator {
        type Datum = f64;
        type Model = f64;

        const MIN_SAMPLES: usize = 1;

        fn fit(data: &[f64], sample_indices: &[usize]) -> Option<f64> {
            Some(data[sample_indices[0]])
        }

        fn residual(model: &f64, datum: &f64) -> f64 {
            (model - datum).abs()
        }

        fn refit(data: &[f64], inliers: &[usize]) -> Option<f64> {
            if inliers.is_empty() {
                return None;
            }
            Some(inliers.iter().map(|&i| data[i]).sum::<f64>() / inliers.len() as f64)
        }
    }

    #[test]
    fn insufficient_data_gives_no_model() {
        let res = ransac::<LocationEstimator>(&[], &RansacOptions::default());
        assert!(!res.success());
        assert!(res.inliers.is_empty());
    }

    #[test]
    fn location_ignores_gross_outliers() {
        let data = [10.0, 10.2, 9.9, 10.1, 55.0, -40.0, 10.0];
        let opts = RansacOptions {
            thresh: 0.5,
            min_inliers: 3,
            ..Default::default()
        };
        let res = ransac::<LocationEstimator>(&data, &opts);
        let model = res.model.expect("consensus expected");
        assert!((model - 10.04).abs() < 0.01, "model {model}");
        assert_eq!(res.inliers, vec![0, 1, 2, 3, 6]);
    }

    #[test]
    fn iteration_bound_shrinks_with_inlier_ratio() {
        assert_eq!(required_iterations(0.99, 0.0, 2, 0, 100), 100);
        let n = required_iterations(0.99, 0.9, 2, 1, 100);
        assert!(n < 10, "n = {n}");
    }
}
