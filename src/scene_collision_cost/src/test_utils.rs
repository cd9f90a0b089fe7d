//! Test utilities.
//!
//! Provides a scripted collision predictor with call recording, synthetic
//! scene observations and trajectory batch generators.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use anyhow::bail;
use nalgebra::{Isometry3, Matrix3, Vector3};
use parking_lot::Mutex;

use crate::mask::CollisionMask;
use crate::predictor::CollisionPredictor;
use crate::scene::{ModelFrameScene, SceneObservation};
use crate::trajectory::{QueryBatch, TrajectoryBatch};

/// Label id of the horizontal plane in [`make_scene_observation`].
pub const TABLE_LABEL: u32 = 1;
/// Label id of the two vertical planes in [`make_scene_observation`].
pub const WALL_LABEL: u32 = 2;

/// Generate a half-cubic point cloud.
///
/// Creates 3 orthogonal planes (XY, YZ, ZX) meeting at the origin:
/// - XY plane: z=0, x∈[0,length], y∈[0,length]
/// - YZ plane: x=0, y∈[0,length], z∈[0,length]
/// - ZX plane: y=0, x∈[0,length], z∈[0,length]
///
/// Points are emitted plane-interleaved: `[xy, yz, zx, xy, yz, zx, ...]`.
pub fn make_half_cubic_pcd(length: f32, interval: f32) -> Vec<[f32; 3]> {
    let num_points_per_line = ((length / interval) as usize) + 1;
    let mut points = Vec::with_capacity(3 * num_points_per_line * num_points_per_line);

    for i in 0..num_points_per_line {
        for j in 0..num_points_per_line {
            let u = interval * (j as f32);
            let v = interval * (i as f32);
            points.push([u, v, 0.0]);
            points.push([0.0, u, v]);
            points.push([u, 0.0, v]);
        }
    }

    points
}

/// Labels matching the plane interleaving of [`make_half_cubic_pcd`].
pub fn half_cubic_labels(num_points: usize) -> Vec<u32> {
    (0..num_points)
        .map(|i| if i % 3 == 0 { TABLE_LABEL } else { WALL_LABEL })
        .collect()
}

/// A labelled 1m half-cube seen from an identity camera pose.
///
/// Nothing is removed under the default scene configuration.
pub fn make_scene_observation() -> SceneObservation {
    let points = make_half_cubic_pcd(1.0, 0.25);
    let labels = half_cubic_labels(points.len());
    let label_map = BTreeMap::from([
        (TABLE_LABEL, "table".to_string()),
        (WALL_LABEL, "wall".to_string()),
    ]);
    SceneObservation::new(points, labels, label_map, &Isometry3::identity())
}

/// [`make_scene_observation`] truncated to its first `num_points` points
/// (at most 75), so observations can be told apart by size.
pub fn make_scene_observation_with_points(num_points: usize) -> SceneObservation {
    let mut obs = make_scene_observation();
    if let Some(points) = obs.point_cloud.as_mut() {
        points.truncate(num_points);
    }
    if let Some(labels) = obs.point_labels.as_mut() {
        labels.truncate(num_points);
    }
    obs
}

/// Build a trajectory batch with identity orientations and positions from
/// `position(b, h, l)`.
pub fn make_batch<F>(batch: usize, horizon: usize, links: usize, position: F) -> TrajectoryBatch
where
    F: Fn(usize, usize, usize) -> [f32; 3],
{
    let mut positions = Vec::with_capacity(batch * horizon * links);
    for b in 0..batch {
        for h in 0..horizon {
            for l in 0..links {
                positions.push(Vector3::from(position(b, h, l)));
            }
        }
    }
    let orientations = vec![Matrix3::identity(); positions.len()];
    TrajectoryBatch::new(batch, horizon, links, positions, orientations)
        .expect("make_batch dimensions must be non-zero")
}

type Rule = Box<dyn Fn(QueryBatch<'_>, f64) -> CollisionMask + Send + Sync>;

/// Collision predictor driven by a closure, recording every call.
pub struct ScriptedPredictor {
    rule: Rule,
    calls: AtomicUsize,
    thresholds: Mutex<Vec<f64>>,
    shapes: Mutex<Vec<(usize, usize)>>,
    loaded: Mutex<Vec<u64>>,
    loaded_points: Mutex<Vec<usize>>,
    /// Generation of the last loaded scene
    active: AtomicU64,
    query_generations: Mutex<Vec<u64>>,
    fail_queries: AtomicBool,
    fail_loads: AtomicBool,
}

impl ScriptedPredictor {
    pub fn new<F>(rule: F) -> Self
    where
        F: Fn(QueryBatch<'_>, f64) -> CollisionMask + Send + Sync + 'static,
    {
        Self {
            rule: Box::new(rule),
            calls: AtomicUsize::new(0),
            thresholds: Mutex::new(Vec::new()),
            shapes: Mutex::new(Vec::new()),
            loaded: Mutex::new(Vec::new()),
            loaded_points: Mutex::new(Vec::new()),
            active: AtomicU64::new(0),
            query_generations: Mutex::new(Vec::new()),
            fail_queries: AtomicBool::new(false),
            fail_loads: AtomicBool::new(false),
        }
    }

    /// Never reports a collision.
    pub fn never() -> Self {
        Self::new(|queries, _| CollisionMask::clear(queries.num_queries(), queries.num_links()))
    }

    /// Flags the listed links of every query when called with the paired
    /// threshold. Other thresholds report no collision.
    pub fn flag_links(rules: Vec<(f64, Vec<usize>)>) -> Self {
        Self::new(move |queries, threshold| {
            let mut mask = CollisionMask::clear(queries.num_queries(), queries.num_links());
            for (_, links) in rules.iter().filter(|(t, _)| *t == threshold) {
                for q in 0..queries.num_queries() {
                    for &l in links.iter().filter(|&&l| l < queries.num_links()) {
                        mask.set(q, l, true);
                    }
                }
            }
            mask
        })
    }

    /// Flags a link when its z coordinate is below `height + threshold`.
    pub fn below_height(height: f32) -> Self {
        Self::new(move |queries, threshold| {
            let limit = height + threshold as f32;
            let mut mask = CollisionMask::clear(queries.num_queries(), queries.num_links());
            for q in 0..queries.num_queries() {
                for (l, p) in queries.query_positions(q).iter().enumerate() {
                    if p.z < limit {
                        mask.set(q, l, true);
                    }
                }
            }
            mask
        })
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn query_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Thresholds in call order.
    pub fn thresholds(&self) -> Vec<f64> {
        self.thresholds.lock().clone()
    }

    /// `(num_queries, num_links)` of every call.
    pub fn query_shapes(&self) -> Vec<(usize, usize)> {
        self.shapes.lock().clone()
    }

    /// Generations of every successfully loaded scene.
    pub fn loaded_generations(&self) -> Vec<u64> {
        self.loaded.lock().clone()
    }

    /// Point counts of every successfully loaded scene.
    pub fn loaded_point_counts(&self) -> Vec<usize> {
        self.loaded_points.lock().clone()
    }

    /// Generation of the loaded scene at the time of every query, in call order.
    pub fn query_generations(&self) -> Vec<u64> {
        self.query_generations.lock().clone()
    }
}

impl CollisionPredictor for ScriptedPredictor {
    fn load_scene(&self, scene: &ModelFrameScene) -> anyhow::Result<()> {
        if self.fail_loads.load(Ordering::SeqCst) {
            bail!("scripted scene load failure");
        }
        self.loaded.lock().push(scene.generation);
        self.loaded_points.lock().push(scene.num_points());
        self.active.store(scene.generation, Ordering::SeqCst);
        Ok(())
    }

    fn check_collision(
        &self,
        queries: QueryBatch<'_>,
        threshold: f64,
    ) -> anyhow::Result<CollisionMask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.thresholds.lock().push(threshold);
        self.query_generations
            .lock()
            .push(self.active.load(Ordering::SeqCst));
        self.shapes
            .lock()
            .push((queries.num_queries(), queries.num_links()));

        if self.fail_queries.load(Ordering::SeqCst) {
            bail!("scripted collision query failure");
        }
        Ok((self.rule)(queries, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_cubic_size() {
        let points = make_half_cubic_pcd(1.0, 0.25);
        assert_eq!(points.len(), 3 * 5 * 5);
        assert!(points.iter().all(|p| p.iter().all(|v| (0.0..=1.0).contains(v))));
    }

    #[test]
    fn test_scene_observation_is_complete() {
        let obs = make_scene_observation();
        let labels = obs.point_labels.as_ref().unwrap();
        assert_eq!(labels.len(), obs.num_points());
        assert_eq!(labels.iter().filter(|&&l| l == TABLE_LABEL).count(), 25);
        assert!(obs.camera_pose.is_some());
        assert_eq!(obs.label_map.len(), 2);

        let small = make_scene_observation_with_points(7);
        assert_eq!(small.num_points(), 7);
        assert_eq!(small.point_labels.unwrap().len(), 7);
    }

    #[test]
    fn test_make_batch_ordering() {
        let batch = make_batch(2, 3, 4, |b, h, l| [b as f32, h as f32, l as f32]);
        assert_eq!(batch.position(1, 2, 3), &Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(batch.position(0, 1, 2), &Vector3::new(0.0, 1.0, 2.0));
    }

    #[test]
    fn test_scripted_predictor_records_calls() {
        let predictor = ScriptedPredictor::below_height(0.0);
        let batch = make_batch(1, 2, 2, |_, h, _| [0.0, 0.0, h as f32 - 0.5]);

        let mask = predictor.check_collision(batch.flatten(), 0.0).unwrap();
        assert_eq!(mask.query(0), &[true, true]);
        assert_eq!(mask.query(1), &[false, false]);

        predictor.fail_queries(true);
        assert!(predictor.check_collision(batch.flatten(), 0.1).is_err());

        assert_eq!(predictor.query_count(), 2);
        assert_eq!(predictor.thresholds(), vec![0.0, 0.1]);
        assert_eq!(predictor.query_shapes(), vec![(2, 2), (2, 2)]);
    }

    #[test]
    fn test_flag_links_matches_threshold() {
        let predictor = ScriptedPredictor::flag_links(vec![(0.5, vec![1, 7])]);
        let batch = make_batch(1, 2, 3, |_, _, _| [0.0; 3]);

        let hit = predictor.check_collision(batch.flatten(), 0.5).unwrap();
        assert_eq!(hit.link_counts(), vec![1, 1]);
        assert!(hit.get(1, 1));

        let miss = predictor.check_collision(batch.flatten(), 0.0).unwrap();
        assert!(!miss.any());
    }
}
