//! Gaussian-kernel projection of raw collision counts.
//!
//! The projection is a soft step around an origin `s`:
//!
//! `f(x) = 1 - exp(-d² / (2c²)) + r·d⁴`, with `d = max(x - s, 0)`
//!
//! Below the origin the cost is exactly zero. Just above it the kernel rises
//! smoothly, saturating towards 1, and the optional quartic term keeps the
//! gradient alive for large violations. A kernel width of zero disables the
//! projection and passes the raw cost through.

use serde::{Deserialize, Serialize};

use crate::error::{CollisionCostError, Result};

/// Parameters of the Gaussian projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaussianProjectionParams {
    /// Sign exponent of the kernel term, `(-1)^n`. Only even values keep the
    /// projection non-decreasing.
    pub n: u32,

    /// Kernel width. Zero means identity.
    pub c: f64,

    /// Origin of the soft step.
    pub s: f64,

    /// Quartic growth coefficient.
    pub r: f64,
}

impl Default for GaussianProjectionParams {
    fn default() -> Self {
        Self {
            n: 0,
            c: 0.0,
            s: 0.0,
            r: 0.0,
        }
    }
}

impl GaussianProjectionParams {
    pub fn new(c: f64, s: f64, r: f64) -> Self {
        Self { n: 0, c, s, r }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n % 2 != 0 {
            return Err(CollisionCostError::config(format!(
                "gaussian projection exponent n must be even, got {}",
                self.n
            )));
        }
        if !self.c.is_finite() || self.c < 0.0 {
            return Err(CollisionCostError::config(format!(
                "gaussian projection width c must be finite and >= 0, got {}",
                self.c
            )));
        }
        if !self.s.is_finite() {
            return Err(CollisionCostError::config(format!(
                "gaussian projection origin s must be finite, got {}",
                self.s
            )));
        }
        if !self.r.is_finite() || self.r < 0.0 {
            return Err(CollisionCostError::config(format!(
                "gaussian projection growth r must be finite and >= 0, got {}",
                self.r
            )));
        }
        Ok(())
    }
}

/// Validated Gaussian projection.
#[derive(Debug, Clone, Copy)]
pub struct GaussianProjection {
    params: GaussianProjectionParams,

    /// Cached `1 / (2c²)`.
    inv_two_c_sq: f64,
}

impl GaussianProjection {
    pub fn new(params: GaussianProjectionParams) -> Result<Self> {
        params.validate()?;
        let inv_two_c_sq = if params.c > 0.0 {
            1.0 / (2.0 * params.c * params.c)
        } else {
            0.0
        };
        Ok(Self {
            params,
            inv_two_c_sq,
        })
    }

    pub fn params(&self) -> &GaussianProjectionParams {
        &self.params
    }

    /// Whether the kernel is disabled (`c == 0`).
    pub fn is_identity(&self) -> bool {
        self.params.c == 0.0
    }

    #[inline]
    pub fn project(&self, x: f64) -> f64 {
        if self.is_identity() {
            return x;
        }
        let d = (x - self.params.s).max(0.0);
        let d_sq = d * d;
        1.0 - (-d_sq * self.inv_two_c_sq).exp() + self.params.r * d_sq * d_sq
    }

    /// `df/dx`.
    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        if self.is_identity() {
            return 1.0;
        }
        let d = x - self.params.s;
        if d <= 0.0 {
            return 0.0;
        }
        let kernel = (-d * d * self.inv_two_c_sq).exp();
        2.0 * d * self.inv_two_c_sq * kernel + 4.0 * self.params.r * d * d * d
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_width_is_identity() {
        let proj = GaussianProjection::new(GaussianProjectionParams::default()).unwrap();
        assert!(proj.is_identity());
        assert_eq!(proj.project(0.0), 0.0);
        assert_eq!(proj.project(3.0), 3.0);
        assert_eq!(proj.derivative(3.0), 1.0);
    }

    #[test]
    fn test_below_origin_is_zero() {
        let proj = GaussianProjection::new(GaussianProjectionParams::new(1.0, 0.5, 0.0)).unwrap();
        assert_eq!(proj.project(0.0), 0.0);
        assert_eq!(proj.project(0.5), 0.0);
        assert_eq!(proj.derivative(0.2), 0.0);
    }

    #[test]
    fn test_known_values() {
        let proj = GaussianProjection::new(GaussianProjectionParams::new(1.0, 0.0, 0.0)).unwrap();
        // f(1) = 1 - exp(-1/2)
        assert_relative_eq!(proj.project(1.0), 1.0 - (-0.5_f64).exp(), epsilon = 1e-12);
        // f(2) = 1 - exp(-2)
        assert_relative_eq!(proj.project(2.0), 1.0 - (-2.0_f64).exp(), epsilon = 1e-12);

        let quartic =
            GaussianProjection::new(GaussianProjectionParams::new(1.0, 0.0, 0.25)).unwrap();
        assert_relative_eq!(
            quartic.project(2.0),
            1.0 - (-2.0_f64).exp() + 0.25 * 16.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let proj = GaussianProjection::new(GaussianProjectionParams::new(0.8, 0.3, 0.05)).unwrap();
        let h = 1e-6;
        for &x in &[0.4, 0.9, 1.5, 2.0, 4.0] {
            let fd = (proj.project(x + h) - proj.project(x - h)) / (2.0 * h);
            assert_relative_eq!(proj.derivative(x), fd, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_non_decreasing() {
        let proj = GaussianProjection::new(GaussianProjectionParams::new(0.5, 1.0, 0.01)).unwrap();
        let mut prev = proj.project(-2.0);
        for i in -199..400 {
            let x = i as f64 * 0.01;
            let y = proj.project(x);
            assert!(y >= prev, "f({x}) = {y} < {prev}");
            prev = y;
        }
    }

    #[test]
    fn test_validate() {
        let odd = GaussianProjectionParams {
            n: 1,
            ..GaussianProjectionParams::new(1.0, 0.0, 0.0)
        };
        assert!(GaussianProjection::new(odd).is_err());
        assert!(GaussianProjection::new(GaussianProjectionParams::new(-1.0, 0.0, 0.0)).is_err());
        assert!(GaussianProjection::new(GaussianProjectionParams::new(1.0, 0.0, -0.1)).is_err());
        assert!(
            GaussianProjection::new(GaussianProjectionParams::new(1.0, f64::NAN, 0.0)).is_err()
        );
        let even = GaussianProjectionParams {
            n: 2,
            ..GaussianProjectionParams::new(1.0, 0.0, 0.0)
        };
        assert!(GaussianProjection::new(even).is_ok());
    }
}
