//! Non-blocking scene updates.
//!
//! Converting a large point cloud into the model frame is the expensive part of
//! a scene update. The updater runs that conversion on a worker thread while
//! evaluations keep using the active scene:
//!
//! - `start_background_update` hands an observation to a worker
//! - the worker validates and converts it into a `ModelFrameScene`
//! - `swap_if_ready` loads the finished scene into the predictor and makes it
//!   active, on the caller's thread
//!
//! While a conversion is running, newer observations are queued (latest wins)
//! and started after the next swap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{ModelFrameScene, SceneContext, SceneObservation};
use crate::error::{CollisionCostError, Result};
use crate::predictor::CollisionPredictor;

/// Status of background scene updates.
#[derive(Debug, Clone, Default)]
pub struct UpdateStatus {
    /// Whether a conversion is currently running or awaiting a swap
    pub in_progress: bool,
    /// Number of points in the observation being converted
    pub pending_points: usize,
    /// Number of completed swaps
    pub swap_count: usize,
    /// Duration of the last conversion in milliseconds
    pub last_update_ms: f64,
}

type Worker = JoinHandle<(Result<ModelFrameScene>, f64)>;

/// Runs scene conversions off the evaluation thread.
pub struct BackgroundSceneUpdater<P: CollisionPredictor + ?Sized> {
    context: Arc<SceneContext>,
    predictor: Arc<P>,

    /// Worker converting the current observation
    worker: Mutex<Option<Worker>>,

    update_in_progress: AtomicBool,

    /// Observation waiting for the current worker to finish
    pending: Mutex<Option<SceneObservation>>,

    status: RwLock<UpdateStatus>,
}

impl<P: CollisionPredictor + ?Sized> BackgroundSceneUpdater<P> {
    pub fn new(context: Arc<SceneContext>, predictor: Arc<P>) -> Self {
        Self {
            context,
            predictor,
            worker: Mutex::new(None),
            update_in_progress: AtomicBool::new(false),
            pending: Mutex::new(None),
            status: RwLock::new(UpdateStatus::default()),
        }
    }

    pub fn context(&self) -> &Arc<SceneContext> {
        &self.context
    }

    pub fn is_update_in_progress(&self) -> bool {
        self.update_in_progress.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> UpdateStatus {
        self.status.read().clone()
    }

    /// Whether an observation is queued behind the running conversion.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Start converting `observation` in the background.
    ///
    /// Returns `false` if a conversion is already running; the observation is
    /// then queued, replacing any previously queued one.
    pub fn start_background_update(&self, observation: SceneObservation) -> bool {
        // The in-progress flag only changes while `pending` is locked
        let mut pending = self.pending.lock();
        if self.update_in_progress.load(Ordering::SeqCst) {
            debug!(
                "scene update already in progress, queuing {} points",
                observation.num_points()
            );
            *pending = Some(observation);
            return false;
        }

        self.update_in_progress.store(true, Ordering::SeqCst);
        self.spawn_worker(observation);
        true
    }

    /// Install the converted scene if the worker has finished.
    ///
    /// Returns `Ok(true)` if the active scene was replaced. Conversion and
    /// predictor errors are returned; the previous scene stays active.
    pub fn swap_if_ready(&self) -> Result<bool> {
        let handle = {
            let mut worker = self.worker.lock();
            match worker.take() {
                Some(handle) if handle.is_finished() => handle,
                Some(handle) => {
                    *worker = Some(handle);
                    return Ok(false);
                }
                None => return Ok(false),
            }
        };
        self.finish(handle)
    }

    /// Block until the running conversion finishes, then install it.
    pub fn wait_and_swap(&self) -> Result<bool> {
        let handle = self.worker.lock().take();
        match handle {
            Some(handle) => self.finish(handle),
            None => Ok(false),
        }
    }

    /// Blocking update on the caller's thread, for initial setup.
    pub fn update_now(&self, observation: SceneObservation) -> Result<Arc<ModelFrameScene>> {
        self.context.update(observation, &*self.predictor)
    }

    fn spawn_worker(&self, observation: SceneObservation) {
        let num_points = observation.num_points();
        info!("starting background scene update with {num_points} points");

        {
            let mut status = self.status.write();
            status.in_progress = true;
            status.pending_points = num_points;
        }

        let context = Arc::clone(&self.context);
        let handle = thread::spawn(move || {
            let start = Instant::now();
            let result = context.prepare(observation);
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            (result, elapsed_ms)
        });

        *self.worker.lock() = Some(handle);
    }

    fn finish(&self, handle: Worker) -> Result<bool> {
        let outcome = match handle.join() {
            Ok((Ok(scene), elapsed_ms)) => {
                self.status.write().last_update_ms = elapsed_ms;
                self.context
                    .install(scene, &*self.predictor)
                    .map(|scene| {
                        self.status.write().swap_count += 1;
                        info!(
                            generation = scene.generation,
                            "background scene update installed ({elapsed_ms:.1}ms)"
                        );
                        true
                    })
            }
            Ok((Err(e), _)) => {
                warn!("background scene update rejected: {e}");
                Err(e)
            }
            Err(_) => {
                warn!("scene conversion worker panicked");
                Err(CollisionCostError::WorkerPanicked)
            }
        };

        // Hand the queued observation to the next worker, or go idle, without
        // releasing `pending` in between
        let mut pending = self.pending.lock();
        match pending.take() {
            Some(observation) => {
                debug!(
                    "processing queued scene update with {} points",
                    observation.num_points()
                );
                self.spawn_worker(observation);
            }
            None => {
                {
                    let mut status = self.status.write();
                    status.in_progress = false;
                    status.pending_points = 0;
                }
                self.update_in_progress.store(false, Ordering::SeqCst);
            }
        }

        outcome
    }
}

impl<P: CollisionPredictor + ?Sized> Drop for BackgroundSceneUpdater<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            let _ = handle.join();
        }
    }
}
