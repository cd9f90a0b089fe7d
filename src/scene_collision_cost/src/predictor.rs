//! Interface to the learned scene-collision predictor.
//!
//! The predictor is an external model: given link poses and the active scene it
//! reports which links are in collision at a clearance threshold. This crate
//! only batches queries for it and turns its answers into costs.

use std::sync::Arc;

use crate::mask::CollisionMask;
use crate::scene::ModelFrameScene;
use crate::trajectory::QueryBatch;

/// Learned collision predictor.
///
/// Implementations must return a mask shaped
/// `(queries.num_queries(), queries.num_links())`. Errors are propagated to the
/// caller unchanged; a failed check is never treated as collision-free.
pub trait CollisionPredictor: Send + Sync {
    /// Replace the predictor's scene.
    fn load_scene(&self, scene: &ModelFrameScene) -> anyhow::Result<()>;

    /// Flag links closer to the scene than `threshold` (meters, negative
    /// values allow slight penetration).
    fn check_collision(
        &self,
        queries: QueryBatch<'_>,
        threshold: f64,
    ) -> anyhow::Result<CollisionMask>;
}

impl<P: CollisionPredictor + ?Sized> CollisionPredictor for Arc<P> {
    fn load_scene(&self, scene: &ModelFrameScene) -> anyhow::Result<()> {
        (**self).load_scene(scene)
    }

    fn check_collision(
        &self,
        queries: QueryBatch<'_>,
        threshold: f64,
    ) -> anyhow::Result<CollisionMask> {
        (**self).check_collision(queries, threshold)
    }
}

impl<P: CollisionPredictor + ?Sized> CollisionPredictor for Box<P> {
    fn load_scene(&self, scene: &ModelFrameScene) -> anyhow::Result<()> {
        (**self).load_scene(scene)
    }

    fn check_collision(
        &self,
        queries: QueryBatch<'_>,
        threshold: f64,
    ) -> anyhow::Result<CollisionMask> {
        (**self).check_collision(queries, threshold)
    }
}
