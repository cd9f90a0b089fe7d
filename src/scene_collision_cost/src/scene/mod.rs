//! Scene observations and their model-frame representation.
//!
//! A perception update arrives as a [`SceneObservation`]: a camera-frame point
//! cloud, per-point segmentation labels, a label-to-class map and the camera
//! pose in the robot frame. Before the predictor sees it, the observation is
//! validated and converted into a [`ModelFrameScene`]:
//!
//! 1. Camera points are moved into the robot frame with `camera_pose`
//! 2. Robot-frame points are moved into the model frame with `robot_to_model`
//! 3. Points outside the configured workspace bounds are dropped
//! 4. Points whose class is excluded (e.g. the robot's own body) are dropped
//!
//! The converted scene is immutable and shared behind an `Arc`; a new
//! observation always produces a new scene.

pub mod background;
pub mod context;
pub mod transform;

use std::collections::BTreeMap;

use nalgebra::Isometry3;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use background::{BackgroundSceneUpdater, UpdateStatus};
pub use context::{ReadyState, SceneContext};

use crate::error::{CollisionCostError, Result};
use transform::{isometry_from_rows, transform_points, IDENTITY_ROWS};

/// Raw scene update from the perception pipeline.
///
/// Required fields are optional here so a malformed update can be represented
/// and rejected instead of failing at deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneObservation {
    /// Camera-frame points `[N][3]`.
    pub point_cloud: Option<Vec<[f32; 3]>>,

    /// Segmentation label per point `[N]`.
    pub point_labels: Option<Vec<u32>>,

    /// Label id to semantic class name.
    #[serde(default)]
    pub label_map: BTreeMap<u32, String>,

    /// Camera pose in the robot frame, row-major homogeneous 4x4.
    pub camera_pose: Option<[[f64; 4]; 4]>,
}

impl SceneObservation {
    /// Build a complete observation.
    pub fn new(
        point_cloud: Vec<[f32; 3]>,
        point_labels: Vec<u32>,
        label_map: BTreeMap<u32, String>,
        camera_pose: &Isometry3<f64>,
    ) -> Self {
        Self {
            point_cloud: Some(point_cloud),
            point_labels: Some(point_labels),
            label_map,
            camera_pose: Some(transform::isometry_to_rows(camera_pose)),
        }
    }

    /// Parse an observation from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn num_points(&self) -> usize {
        self.point_cloud.as_ref().map_or(0, Vec::len)
    }
}

/// Axis-aligned workspace bounds in the model frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl WorkspaceBounds {
    pub fn contains(&self, p: &[f32; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    fn validate(&self) -> Result<()> {
        for i in 0..3 {
            if !self.min[i].is_finite() || !self.max[i].is_finite() || self.min[i] > self.max[i] {
                return Err(CollisionCostError::config(format!(
                    "invalid workspace bounds {:?}..{:?}",
                    self.min, self.max
                )));
            }
        }
        Ok(())
    }
}

/// Scene conversion settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Robot frame to predictor model frame, row-major homogeneous 4x4.
    pub robot_to_model: [[f64; 4]; 4],

    /// Drop points outside these bounds (model frame).
    pub bounds: Option<WorkspaceBounds>,

    /// Drop points whose semantic class is listed here.
    pub exclude_classes: Vec<String>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            robot_to_model: IDENTITY_ROWS,
            bounds: None,
            exclude_classes: Vec::new(),
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<()> {
        isometry_from_rows("robot_to_model", &self.robot_to_model)?;
        if let Some(bounds) = &self.bounds {
            bounds.validate()?;
        }
        Ok(())
    }
}

/// Validated scene in the predictor's model frame.
#[derive(Debug, Clone)]
pub struct ModelFrameScene {
    /// Monotonic scene number, assigned when the scene becomes active.
    pub generation: u64,

    /// Model-frame points.
    pub points: Vec<[f32; 3]>,

    /// Segmentation label per point.
    pub labels: Vec<u32>,

    pub label_map: BTreeMap<u32, String>,

    /// Camera pose in the robot frame.
    pub camera_pose: Isometry3<f64>,

    pub robot_to_model: Isometry3<f64>,

    pub model_to_robot: Isometry3<f64>,

    /// Points removed by the workspace bounds.
    pub removed_by_bounds: usize,

    /// Points removed by class exclusion.
    pub removed_by_class: usize,
}

impl ModelFrameScene {
    /// Validate `observation` and convert it to the model frame.
    ///
    /// The returned scene has generation 0 until it is installed in a
    /// [`SceneContext`].
    pub fn from_observation(observation: SceneObservation, config: &SceneConfig) -> Result<Self> {
        let SceneObservation {
            point_cloud,
            point_labels,
            label_map,
            camera_pose,
        } = observation;

        let points = point_cloud
            .ok_or_else(|| CollisionCostError::config("scene observation has no point cloud"))?;
        let labels = point_labels
            .ok_or_else(|| CollisionCostError::config("scene observation has no point labels"))?;
        let camera_pose = camera_pose
            .ok_or_else(|| CollisionCostError::config("scene observation has no camera pose"))?;

        if points.is_empty() {
            return Err(CollisionCostError::config("scene point cloud is empty"));
        }
        if labels.len() != points.len() {
            return Err(CollisionCostError::config(format!(
                "scene has {} points but {} labels",
                points.len(),
                labels.len()
            )));
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(CollisionCostError::config(
                "scene point cloud contains non-finite coordinates",
            ));
        }

        let camera_pose = isometry_from_rows("camera_pose", &camera_pose)?;
        let robot_to_model = isometry_from_rows("robot_to_model", &config.robot_to_model)?;
        let model_to_robot = robot_to_model.inverse();

        let camera_to_model = robot_to_model * camera_pose;
        let model_points = transform_points(&points, &camera_to_model);

        let excluded: Vec<u32> = label_map
            .iter()
            .filter(|(_, class)| config.exclude_classes.iter().any(|c| c == *class))
            .map(|(&id, _)| id)
            .collect();

        let mut kept_points = Vec::with_capacity(model_points.len());
        let mut kept_labels = Vec::with_capacity(model_points.len());
        let mut removed_by_bounds = 0;
        let mut removed_by_class = 0;

        for (point, label) in model_points.into_iter().zip(labels) {
            if excluded.contains(&label) {
                removed_by_class += 1;
                continue;
            }
            if let Some(bounds) = &config.bounds {
                if !bounds.contains(&point) {
                    removed_by_bounds += 1;
                    continue;
                }
            }
            kept_points.push(point);
            kept_labels.push(label);
        }

        if kept_points.is_empty() {
            return Err(CollisionCostError::config(format!(
                "no scene points left after filtering ({removed_by_bounds} out of bounds, {removed_by_class} excluded)"
            )));
        }

        debug!(
            points = kept_points.len(),
            removed_by_bounds, removed_by_class, "converted scene to model frame"
        );

        Ok(Self {
            generation: 0,
            points: kept_points,
            labels: kept_labels,
            label_map,
            camera_pose,
            robot_to_model,
            model_to_robot,
            removed_by_bounds,
            removed_by_class,
        })
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}
