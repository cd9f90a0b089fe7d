//! Cost shaping: smooth, non-decreasing transforms of raw collision costs.
//!
//! The raw per-step cost is a count of colliding links. Shaping turns that
//! discrete signal into something an optimizer can rank and differentiate:
//! - **Identity**: raw counts
//! - **Quadratic**: `scale * max(x - origin, 0)^2`
//! - **Gaussian**: soft step around an origin (see [`gaussian`])

pub mod gaussian;

use serde::{Deserialize, Serialize};

pub use gaussian::{GaussianProjection, GaussianProjectionParams};

use crate::error::{CollisionCostError, Result};

/// Selects the shaping function and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapingParams {
    Identity,
    Quadratic { origin: f64, scale: f64 },
    Gaussian(GaussianProjectionParams),
}

impl Default for ShapingParams {
    fn default() -> Self {
        Self::Gaussian(GaussianProjectionParams::default())
    }
}

#[derive(Debug, Clone, Copy)]
enum ShapingFunction {
    Identity,
    Quadratic { origin: f64, scale: f64 },
    Gaussian(GaussianProjection),
}

/// Stateless elementwise cost transform.
#[derive(Debug, Clone, Copy)]
pub struct CostShaper {
    params: ShapingParams,
    function: ShapingFunction,
}

impl CostShaper {
    pub fn new(params: ShapingParams) -> Result<Self> {
        let function = match params {
            ShapingParams::Identity => ShapingFunction::Identity,
            ShapingParams::Quadratic { origin, scale } => {
                if !origin.is_finite() || !scale.is_finite() || scale < 0.0 {
                    return Err(CollisionCostError::config(format!(
                        "quadratic shaping needs a finite origin and scale >= 0, got origin={origin} scale={scale}"
                    )));
                }
                ShapingFunction::Quadratic { origin, scale }
            }
            ShapingParams::Gaussian(gauss) => {
                ShapingFunction::Gaussian(GaussianProjection::new(gauss)?)
            }
        };
        Ok(Self { params, function })
    }

    pub fn identity() -> Self {
        Self {
            params: ShapingParams::Identity,
            function: ShapingFunction::Identity,
        }
    }

    pub fn params(&self) -> &ShapingParams {
        &self.params
    }

    #[inline]
    pub fn apply(&self, raw: f64) -> f64 {
        match self.function {
            ShapingFunction::Identity => raw,
            ShapingFunction::Quadratic { origin, scale } => {
                let d = (raw - origin).max(0.0);
                scale * d * d
            }
            ShapingFunction::Gaussian(ref proj) => proj.project(raw),
        }
    }

    /// Shape every value in place.
    pub fn apply_all(&self, values: &mut [f64]) {
        for v in values.iter_mut() {
            *v = self.apply(*v);
        }
    }

    /// Analytic derivative of [`apply`](Self::apply) at `raw`.
    #[inline]
    pub fn derivative(&self, raw: f64) -> f64 {
        match self.function {
            ShapingFunction::Identity => 1.0,
            ShapingFunction::Quadratic { origin, scale } => {
                2.0 * scale * (raw - origin).max(0.0)
            }
            ShapingFunction::Gaussian(ref proj) => proj.derivative(raw),
        }
    }

    /// Shaped value of a zero raw cost.
    pub fn zero_value(&self) -> f64 {
        self.apply(0.0)
    }
}

impl Default for CostShaper {
    fn default() -> Self {
        Self::identity()
    }
}
