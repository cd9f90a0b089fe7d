//! Scene collision cost for sampling-based trajectory optimization.
//!
//! Scores a batch of candidate robot trajectories against an observed scene by
//! asking a learned collision predictor which robot links collide, then turns
//! the per-link verdicts into one non-negative cost per rollout.
//!
//! # Architecture
//!
//! - [`SceneContext`] converts camera-frame point cloud observations into the
//!   predictor's model frame and holds the active scene
//! - [`CollisionPredictor`] is the seam to the external collision network
//! - [`CollisionCostEvaluator`] flattens `(batch, horizon, links)` link poses,
//!   queries the predictor at two thresholds, combines the masks, sums over
//!   links and applies weight and shaping
//! - [`BackgroundSceneUpdater`] prepares new scenes off the planning thread
//!
//! # Usage
//!
//! ```ignore
//! use scene_collision_cost::{CollisionCostEvaluator, CollisionCostConfig, SceneObservation};
//!
//! let evaluator = CollisionCostEvaluator::new(CollisionCostConfig::default(), predictor)?;
//! evaluator.set_scene(SceneObservation::new(points, labels, label_map, &camera_pose))?;
//!
//! let costs = evaluator.evaluate(&trajectories)?;
//! let best = costs.argmin();
//! ```

pub mod config;
pub mod error;
pub mod evaluator;
pub mod layout;
pub mod mask;
pub mod predictor;
pub mod scene;
pub mod shaping;
#[cfg(test)]
pub mod test_utils;
pub mod timing;
pub mod trajectory;

pub use config::CollisionCostConfig;
pub use error::{CollisionCostError, Result};
pub use evaluator::{
    CollisionCostEvaluator, CollisionCostEvaluatorBuilder, CostBatch, EvaluationStats, StepCosts,
};
pub use layout::BatchLayout;
pub use mask::CollisionMask;
pub use predictor::CollisionPredictor;
pub use scene::{
    BackgroundSceneUpdater, ModelFrameScene, ReadyState, SceneConfig, SceneContext,
    SceneObservation, UpdateStatus, WorkspaceBounds,
};
pub use shaping::{CostShaper, GaussianProjection, GaussianProjectionParams, ShapingParams};
pub use timing::EvaluationTiming;
pub use trajectory::{QueryBatch, TrajectoryBatch};
