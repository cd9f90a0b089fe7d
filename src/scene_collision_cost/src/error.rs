//! Error taxonomy for collision-cost evaluation.

use thiserror::Error;

/// Errors from scene updates and cost evaluation.
#[derive(Error, Debug)]
pub enum CollisionCostError {
    /// Malformed scene observation or evaluator configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cost evaluation attempted before any scene was set.
    #[error("no scene has been set; call set_scene() before evaluating")]
    NotReady,

    /// Trajectory batch or predictor mask violates the shape contract.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// Failure raised by the external collision predictor, passed through as-is.
    #[error(transparent)]
    Predictor(#[from] anyhow::Error),

    /// The background scene conversion thread panicked.
    #[error("scene conversion worker panicked")]
    WorkerPanicked,

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollisionCostError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn shape(expected: impl ToString, actual: impl ToString) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CollisionCostError>;
