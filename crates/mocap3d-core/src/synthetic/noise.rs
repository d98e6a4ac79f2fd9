//! Deterministic noise helpers for synthetic observations.
//!
//! The functions here avoid `thread_rng` and do not depend on the internal
//! algorithm of `rand` RNGs, so synthetic datasets stay stable across
//! versions and platforms.

use ndarray::Array4;

use crate::math::{Real, Vec2};

/// Deterministic uniform pixel noise in `[-max_abs_px, +max_abs_px]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformPixelNoise {
    /// Base seed controlling the pseudo-random sequence.
    pub seed: u64,
    /// Maximum absolute per-axis noise (pixels).
    pub max_abs_px: Real,
}

impl UniformPixelNoise {
    /// Sample a deterministic 2D offset for a `(camera, sample)` key.
    #[inline]
    pub fn sample(&self, camera: usize, sample: usize) -> Vec2 {
        let max_abs = self.max_abs_px.abs();
        if max_abs == 0.0 {
            return Vec2::zeros();
        }
        let key = mix_key(self.seed, camera, sample);
        let u = unit_interval(splitmix64(key));
        let v = unit_interval(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        Vec2::new((u - 0.5) * 2.0 * max_abs, (v - 0.5) * 2.0 * max_abs)
    }

    /// Add noise in place to a `[camera, frame, point, 2]` observation tensor.
    ///
    /// Missing (`NaN`) observations stay missing.
    pub fn apply(&self, observations: &mut Array4<Real>) {
        let (cams, frames, points, _) = observations.dim();
        for cam in 0..cams {
            for frame in 0..frames {
                for point in 0..points {
                    let d = self.sample(cam, frame * points + point);
                    observations[[cam, frame, point, 0]] += d.x;
                    observations[[cam, frame, point, 1]] += d.y;
                }
            }
        }
    }
}

/// Deterministic value in `[0, 1)` for an integer key.
pub fn unit_from_key(seed: u64, a: usize, b: usize) -> Real {
    unit_interval(splitmix64(mix_key(seed, a, b)))
}

#[inline]
fn mix_key(seed: u64, a: usize, b: usize) -> u64 {
    seed ^ (a as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (b as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn unit_interval(x: u64) -> Real {
    // top 53 bits as a double in [0, 1)
    ((x >> 11) as Real) * (1.0 / ((1u64 << 53) as Real))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let noise = UniformPixelNoise {
            seed: 123,
            max_abs_px: 0.5,
        };
        let a = noise.sample(0, 0);
        assert_eq!(a, noise.sample(0, 0));
        assert_ne!(a, noise.sample(0, 1));
        assert!(a.x.abs() <= 0.5 && a.y.abs() <= 0.5);
    }

    #[test]
    fn apply_keeps_missing_observations() {
        let mut obs = Array4::<Real>::zeros((2, 3, 4, 2));
        obs[[1, 2, 3, 0]] = Real::NAN;
        obs[[1, 2, 3, 1]] = Real::NAN;
        UniformPixelNoise {
            seed: 7,
            max_abs_px: 1.0,
        }
        .apply(&mut obs);
        assert!(obs[[1, 2, 3, 0]].is_nan());
        assert!(obs[[0, 0, 0, 0]] != 0.0);
        assert!(obs.iter().filter(|v| v.is_finite()).all(|v| v.abs() <= 1.0));
    }
}
