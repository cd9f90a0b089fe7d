//! Active scene shared between scene updates and cost evaluations.
//!
//! The context is a two-state machine:
//!
//! ```text
//! Unready --update()--> Ready(scene #1) --update()--> Ready(scene #2) ...
//! ```
//!
//! Evaluations hold a read guard for the duration of their predictor queries.
//! An update takes the write guard, loads the new scene into the predictor and
//! swaps the scene handle before releasing it, so a reader never sees the
//! predictor and the context disagree about which scene is active.

use std::sync::Arc;

use nalgebra::Isometry3;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::{info, warn};

use super::transform::isometry_from_rows;
use super::{ModelFrameScene, SceneConfig, SceneObservation};
use crate::error::{CollisionCostError, Result};
use crate::predictor::CollisionPredictor;

#[derive(Debug)]
enum SceneState {
    Unready,
    Ready(Arc<ModelFrameScene>),
}

/// Externally visible readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Unready,
    Ready { generation: u64, num_points: usize },
}

/// Holder of the active model-frame scene.
#[derive(Debug)]
pub struct SceneContext {
    config: SceneConfig,
    robot_to_model: Isometry3<f64>,
    state: RwLock<SceneState>,
}

impl SceneContext {
    /// Create an unready context.
    pub fn new(config: SceneConfig) -> Result<Self> {
        config.validate()?;
        let robot_to_model = isometry_from_rows("robot_to_model", &config.robot_to_model)?;
        Ok(Self {
            config,
            robot_to_model,
            state: RwLock::new(SceneState::Unready),
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn robot_to_model(&self) -> &Isometry3<f64> {
        &self.robot_to_model
    }

    /// Whether a scene has been installed.
    pub fn is_ready(&self) -> bool {
        matches!(*self.state.read(), SceneState::Ready(_))
    }

    pub fn ready_state(&self) -> ReadyState {
        match &*self.state.read() {
            SceneState::Unready => ReadyState::Unready,
            SceneState::Ready(scene) => ReadyState::Ready {
                generation: scene.generation,
                num_points: scene.num_points(),
            },
        }
    }

    /// Handle to the active scene, if any.
    pub fn current(&self) -> Option<Arc<ModelFrameScene>> {
        match &*self.state.read() {
            SceneState::Unready => None,
            SceneState::Ready(scene) => Some(Arc::clone(scene)),
        }
    }

    /// Read guard on the active scene.
    ///
    /// Scene updates block while the guard is alive.
    pub fn snapshot(&self) -> Result<MappedRwLockReadGuard<'_, ModelFrameScene>> {
        RwLockReadGuard::try_map(self.state.read(), |state| match state {
            SceneState::Ready(scene) => Some(&**scene),
            SceneState::Unready => None,
        })
        .map_err(|_| CollisionCostError::NotReady)
    }

    /// Validate and convert an observation without touching the active scene.
    pub fn prepare(&self, observation: SceneObservation) -> Result<ModelFrameScene> {
        ModelFrameScene::from_observation(observation, &self.config)
    }

    /// Replace the active scene with `observation`.
    ///
    /// On any failure the previous scene (or the unready state) is kept.
    pub fn update<P>(
        &self,
        observation: SceneObservation,
        predictor: &P,
    ) -> Result<Arc<ModelFrameScene>>
    where
        P: CollisionPredictor + ?Sized,
    {
        let scene = match self.prepare(observation) {
            Ok(scene) => scene,
            Err(e) => {
                warn!("rejected scene observation: {e}");
                return Err(e);
            }
        };
        self.install(scene, predictor)
    }

    /// Load a prepared scene into the predictor and make it active.
    pub fn install<P>(&self, mut scene: ModelFrameScene, predictor: &P) -> Result<Arc<ModelFrameScene>>
    where
        P: CollisionPredictor + ?Sized,
    {
        let mut state = self.state.write();

        scene.generation = match &*state {
            SceneState::Unready => 1,
            SceneState::Ready(active) => active.generation + 1,
        };

        // Predictor errors leave the previous scene active
        predictor.load_scene(&scene)?;

        let scene = Arc::new(scene);
        *state = SceneState::Ready(Arc::clone(&scene));

        info!(
            generation = scene.generation,
            points = scene.num_points(),
            "scene updated"
        );
        Ok(scene)
    }
}
