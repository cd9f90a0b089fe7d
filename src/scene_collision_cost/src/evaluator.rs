//! Collision cost evaluation over batches of trajectories.
//!
//! # Pipeline
//!
//! ```text
//! (B, H, L) poses
//!     -> flatten to (B*H, L) queries
//!     -> predictor @ threshold        -> mask_a
//!     -> predictor @ loose_threshold  -> mask_b
//!     -> mask_a OR mask_b, cast to 1.0 / 0.0
//!     -> split back to (B, H, L), sum over links
//!     -> weight * shaper(count)        -> (B, H)
//!     -> optional sum over H           -> (B)
//! ```
//!
//! Links are summed rather than maxed, so a step with several colliding links
//! costs more than a step with one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::CollisionCostConfig;
use crate::error::{CollisionCostError, Result};
use crate::layout::BatchLayout;
use crate::mask::CollisionMask;
use crate::predictor::CollisionPredictor;
use crate::scene::{
    BackgroundSceneUpdater, ModelFrameScene, SceneConfig, SceneContext, SceneObservation,
};
use crate::shaping::{CostShaper, ShapingParams};
use crate::time_phase;
use crate::timing::{EvaluationTiming, TimingCollector};
use crate::trajectory::{QueryBatch, TrajectoryBatch};

/// Weighted, shaped costs per `(batch, step)`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCosts {
    batch: usize,
    horizon: usize,
    values: Vec<f64>,
}

impl StepCosts {
    pub fn batch_size(&self) -> usize {
        self.batch
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn get(&self, batch_index: usize, step: usize) -> f64 {
        self.values[batch_index * self.horizon + step]
    }

    /// Costs of one rollout over the horizon.
    pub fn rollout(&self, batch_index: usize) -> &[f64] {
        let start = batch_index * self.horizon;
        &self.values[start..start + self.horizon]
    }

    /// Sum over the horizon axis.
    pub fn reduce_horizon(&self) -> CostBatch {
        CostBatch {
            values: self
                .values
                .chunks(self.horizon)
                .map(|steps| steps.iter().sum())
                .collect(),
        }
    }
}

/// One cost per rollout, summed over the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct CostBatch {
    values: Vec<f64>,
}

impl CostBatch {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn get(&self, batch_index: usize) -> f64 {
        self.values[batch_index]
    }

    /// Index of the cheapest rollout.
    pub fn argmin(&self) -> Option<usize> {
        self.values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// Statistics of the most recent evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationStats {
    pub batch: usize,
    pub horizon: usize,
    pub links: usize,
    /// Links flagged at the nominal threshold
    pub nominal_flags: usize,
    /// Links flagged at the loose threshold
    pub loose_flags: usize,
    /// Links flagged after combining both masks
    pub colliding_links: usize,
    /// Steps with at least one colliding link
    pub colliding_steps: usize,
    /// Generation of the scene the queries ran against
    pub scene_generation: u64,
    pub timing: EvaluationTiming,
}

/// Builder for [`CollisionCostEvaluator`].
#[derive(Debug, Clone, Default)]
pub struct CollisionCostEvaluatorBuilder {
    config: CollisionCostConfig,
}

impl CollisionCostEvaluatorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: CollisionCostConfig) -> Self {
        Self { config }
    }

    pub fn weight(mut self, weight: f64) -> Self {
        self.config.weight = weight;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn loose_threshold(mut self, threshold: f64) -> Self {
        self.config.loose_threshold = threshold;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Issue both threshold queries concurrently (the predictor must tolerate
    /// concurrent calls).
    pub fn parallel_queries(mut self, parallel: bool) -> Self {
        self.config.parallel_queries = parallel;
        self
    }

    pub fn shaping(mut self, shaping: ShapingParams) -> Self {
        self.config.shaping = shaping;
        self
    }

    pub fn scene_config(mut self, scene: SceneConfig) -> Self {
        self.config.scene = scene;
        self
    }

    pub fn build<P: CollisionPredictor>(self, predictor: P) -> Result<CollisionCostEvaluator<P>> {
        CollisionCostEvaluator::new(self.config, predictor)
    }
}

/// Collision cost term for an MPC optimizer.
///
/// Constructed once per control session. Scene updates and evaluations may come
/// from different threads.
pub struct CollisionCostEvaluator<P: CollisionPredictor> {
    config: CollisionCostConfig,
    shaper: CostShaper,
    predictor: Arc<P>,
    scene: Arc<SceneContext>,

    /// Last-seen batch size. Sizing hint only.
    batch_size_hint: AtomicUsize,

    last_stats: Mutex<Option<EvaluationStats>>,
}

impl<P: CollisionPredictor> CollisionCostEvaluator<P> {
    pub fn new(config: CollisionCostConfig, predictor: P) -> Result<Self> {
        Self::with_shared_predictor(config, Arc::new(predictor))
    }

    /// Create an evaluator around a predictor shared with other owners.
    pub fn with_shared_predictor(config: CollisionCostConfig, predictor: Arc<P>) -> Result<Self> {
        config.validate()?;
        let shaper = CostShaper::new(config.shaping)?;
        let scene = Arc::new(SceneContext::new(config.scene.clone())?);

        debug!(
            weight = config.weight,
            threshold = config.threshold,
            loose_threshold = config.loose_threshold,
            "created collision cost evaluator"
        );

        Ok(Self {
            batch_size_hint: AtomicUsize::new(config.batch_size),
            config,
            shaper,
            predictor,
            scene,
            last_stats: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CollisionCostConfig {
        &self.config
    }

    pub fn weight(&self) -> f64 {
        self.config.weight
    }

    pub fn shaper(&self) -> &CostShaper {
        &self.shaper
    }

    pub fn predictor(&self) -> &Arc<P> {
        &self.predictor
    }

    pub fn scene_context(&self) -> &Arc<SceneContext> {
        &self.scene
    }

    pub fn is_ready(&self) -> bool {
        self.scene.is_ready()
    }

    /// Batch size seen by the most recent evaluation.
    pub fn batch_size_hint(&self) -> usize {
        self.batch_size_hint.load(Ordering::Relaxed)
    }

    pub fn last_stats(&self) -> Option<EvaluationStats> {
        self.last_stats.lock().clone()
    }

    /// Replace the active scene (blocking).
    pub fn set_scene(&self, observation: SceneObservation) -> Result<Arc<ModelFrameScene>> {
        self.scene.update(observation, &*self.predictor)
    }

    /// Updater that converts scenes off the caller's thread.
    pub fn background_updater(&self) -> BackgroundSceneUpdater<P> {
        BackgroundSceneUpdater::new(Arc::clone(&self.scene), Arc::clone(&self.predictor))
    }

    /// Cost per rollout, summed over the horizon.
    pub fn evaluate(&self, trajectories: &TrajectoryBatch) -> Result<CostBatch> {
        Ok(self.evaluate_per_step(trajectories)?.reduce_horizon())
    }

    /// Cost per `(rollout, step)`.
    pub fn evaluate_per_step(&self, trajectories: &TrajectoryBatch) -> Result<StepCosts> {
        let layout = trajectories.layout();
        let mut timing = TimingCollector::new();
        timing.start();

        // Hold the scene for both queries so an update cannot land in between
        let scene = self.scene.snapshot()?;
        let scene_generation = scene.generation;

        self.observe_batch_size(layout.batch());

        let queries = trajectories.flatten();
        let (nominal, loose) = time_phase!(timing, "query", self.query_masks(queries))?;
        drop(scene);

        check_mask_shape(&nominal, layout)?;
        check_mask_shape(&loose, layout)?;

        let combined = time_phase!(timing, "combine", nominal.combine(&loose))?;

        let mut values = time_phase!(timing, "reduce", reduce_links(&combined, layout));

        time_phase!(timing, "shape", {
            for v in values.iter_mut() {
                *v = self.config.weight * self.shaper.apply(*v);
            }
        });

        let link_counts = combined.link_counts();
        let stats = EvaluationStats {
            batch: layout.batch(),
            horizon: layout.horizon(),
            links: layout.links(),
            nominal_flags: nominal.count(),
            loose_flags: loose.count(),
            colliding_links: link_counts.iter().sum(),
            colliding_steps: link_counts.iter().filter(|&&c| c > 0).count(),
            scene_generation,
            timing: timing.finish(),
        };
        trace!(?stats, "collision cost evaluated");
        *self.last_stats.lock() = Some(stats);

        Ok(StepCosts {
            batch: layout.batch(),
            horizon: layout.horizon(),
            values,
        })
    }

    fn query_masks(&self, queries: QueryBatch<'_>) -> Result<(CollisionMask, CollisionMask)> {
        let predictor = &*self.predictor;
        if self.config.parallel_queries {
            let (nominal, loose) = rayon::join(
                || predictor.check_collision(queries, self.config.threshold),
                || predictor.check_collision(queries, self.config.loose_threshold),
            );
            return Ok((nominal?, loose?));
        }

        // A failed nominal query skips the loose one
        let nominal = predictor.check_collision(queries, self.config.threshold)?;
        let loose = predictor.check_collision(queries, self.config.loose_threshold)?;
        Ok((nominal, loose))
    }

    fn observe_batch_size(&self, batch: usize) {
        let previous = self.batch_size_hint.swap(batch, Ordering::Relaxed);
        if previous != batch {
            debug!("batch size changed from {previous} to {batch}");
        }
    }
}

fn check_mask_shape(mask: &CollisionMask, layout: BatchLayout) -> Result<()> {
    let expected = (layout.num_queries(), layout.links());
    if mask.shape() != expected {
        return Err(CollisionCostError::shape(
            format!("predictor mask shaped {expected:?}"),
            format!("{:?}", mask.shape()),
        ));
    }
    Ok(())
}

/// Sum the 0/1 link costs of every query, in `(batch, step)` order.
fn reduce_links(mask: &CollisionMask, layout: BatchLayout) -> Vec<f64> {
    let link_costs = mask.to_costs();
    let mut values = Vec::with_capacity(layout.num_queries());
    for b in 0..layout.batch() {
        for h in 0..layout.horizon() {
            let q = layout.merge(b, h);
            let start = layout.query_index(q, 0);
            values.push(link_costs[start..start + layout.links()].iter().sum());
        }
    }
    values
}
