//! Construction-time configuration of the collision cost.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CollisionCostError, Result};
use crate::scene::SceneConfig;
use crate::shaping::{CostShaper, ShapingParams};

/// Configuration for [`CollisionCostEvaluator`](crate::CollisionCostEvaluator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionCostConfig {
    /// Multiplier applied after shaping. Must be non-negative.
    pub weight: f64,

    /// Nominal per-link clearance threshold in meters.
    /// Negative values tolerate slight penetration of the model surface.
    pub threshold: f64,

    /// Second, looser threshold. A link flagged at either threshold collides.
    pub loose_threshold: f64,

    /// Expected batch size. A hint only; outputs always follow the input shape.
    pub batch_size: usize,

    /// Issue the two threshold queries concurrently.
    pub parallel_queries: bool,

    /// Cost shaping applied to per-step colliding-link counts.
    pub shaping: ShapingParams,

    /// Scene conversion settings.
    pub scene: SceneConfig,
}

impl Default for CollisionCostConfig {
    fn default() -> Self {
        Self {
            weight: 1.0,
            threshold: -0.01,
            loose_threshold: 0.45,
            batch_size: 2,
            parallel_queries: false,
            shaping: ShapingParams::default(),
            scene: SceneConfig::default(),
        }
    }
}

impl CollisionCostConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(CollisionCostError::config(format!(
                "weight must be finite and >= 0, got {}",
                self.weight
            )));
        }
        if !self.threshold.is_finite() {
            return Err(CollisionCostError::config(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !self.loose_threshold.is_finite() {
            return Err(CollisionCostError::config(format!(
                "loose_threshold must be finite, got {}",
                self.loose_threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(CollisionCostError::config("batch_size must be >= 1"));
        }
        CostShaper::new(self.shaping)?;
        self.scene.validate()?;
        Ok(())
    }
}
