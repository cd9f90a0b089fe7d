//! Batched link-pose trajectories and their flattened query view.

use nalgebra::{Isometry3, Matrix3, Vector3};

use crate::error::{CollisionCostError, Result};
use crate::layout::BatchLayout;

/// Link poses for a batch of rollouts over a planning horizon.
///
/// Positions and orientations are stored row-major in `(batch, horizon, link)`
/// order and always share the same leading dimensions. Orientation blocks are
/// expected to be rotation matrices; they are passed to the predictor unchecked.
#[derive(Debug, Clone)]
pub struct TrajectoryBatch {
    layout: BatchLayout,
    positions: Vec<Vector3<f32>>,
    orientations: Vec<Matrix3<f32>>,
}

impl TrajectoryBatch {
    /// Build a batch from flat row-major buffers.
    pub fn new(
        batch: usize,
        horizon: usize,
        links: usize,
        positions: Vec<Vector3<f32>>,
        orientations: Vec<Matrix3<f32>>,
    ) -> Result<Self> {
        let layout = BatchLayout::new(batch, horizon, links)?;
        layout.check_len("positions", positions.len())?;
        layout.check_len("orientations", orientations.len())?;

        Ok(Self {
            layout,
            positions,
            orientations,
        })
    }

    /// Build a batch from nested `[batch][horizon][link]` arrays.
    ///
    /// Fails with `ShapeMismatch` if the arrays are ragged or if positions and
    /// orientations disagree on any of the three leading dimensions.
    pub fn from_nested(
        positions: &[Vec<Vec<[f32; 3]>>],
        orientations: &[Vec<Vec<[[f32; 3]; 3]>>],
    ) -> Result<Self> {
        let (batch, horizon, links) = nested_shape("positions", positions)?;
        let rot_shape = nested_shape("orientations", orientations)?;
        if rot_shape != (batch, horizon, links) {
            return Err(CollisionCostError::shape(
                format!("orientations shaped ({batch}, {horizon}, {links}, 3, 3)"),
                format!(
                    "({}, {}, {}, 3, 3)",
                    rot_shape.0, rot_shape.1, rot_shape.2
                ),
            ));
        }

        let flat_positions = positions
            .iter()
            .flatten()
            .flatten()
            .map(|p| Vector3::new(p[0], p[1], p[2]))
            .collect();

        // Rows of the nested 3x3 arrays are matrix rows
        let flat_orientations = orientations
            .iter()
            .flatten()
            .flatten()
            .map(|r| {
                Matrix3::new(
                    r[0][0], r[0][1], r[0][2], r[1][0], r[1][1], r[1][2], r[2][0], r[2][1],
                    r[2][2],
                )
            })
            .collect();

        Self::new(batch, horizon, links, flat_positions, flat_orientations)
    }

    /// Build a batch from rigid link poses in `(batch, horizon, link)` order.
    pub fn from_isometries(
        batch: usize,
        horizon: usize,
        links: usize,
        poses: &[Isometry3<f32>],
    ) -> Result<Self> {
        let positions = poses.iter().map(|p| p.translation.vector).collect();
        let orientations = poses
            .iter()
            .map(|p| p.rotation.to_rotation_matrix().into_inner())
            .collect();
        Self::new(batch, horizon, links, positions, orientations)
    }

    pub fn layout(&self) -> BatchLayout {
        self.layout
    }

    pub fn batch_size(&self) -> usize {
        self.layout.batch()
    }

    pub fn horizon(&self) -> usize {
        self.layout.horizon()
    }

    pub fn num_links(&self) -> usize {
        self.layout.links()
    }

    pub fn positions(&self) -> &[Vector3<f32>] {
        &self.positions
    }

    pub fn orientations(&self) -> &[Matrix3<f32>] {
        &self.orientations
    }

    /// Position of `link` at `(batch_index, step)`.
    pub fn position(&self, batch_index: usize, step: usize, link: usize) -> &Vector3<f32> {
        &self.positions[self.layout.flat_index(batch_index, step, link)]
    }

    /// Orientation of `link` at `(batch_index, step)`.
    pub fn orientation(&self, batch_index: usize, step: usize, link: usize) -> &Matrix3<f32> {
        &self.orientations[self.layout.flat_index(batch_index, step, link)]
    }

    /// View the batch as `(batch * horizon, links)` predictor queries.
    ///
    /// This borrows the existing storage; nothing is copied.
    pub fn flatten(&self) -> QueryBatch<'_> {
        QueryBatch {
            layout: self.layout,
            positions: &self.positions,
            orientations: &self.orientations,
        }
    }
}

/// Borrowed `(queries, links)` view of a [`TrajectoryBatch`].
#[derive(Debug, Clone, Copy)]
pub struct QueryBatch<'a> {
    layout: BatchLayout,
    positions: &'a [Vector3<f32>],
    orientations: &'a [Matrix3<f32>],
}

impl<'a> QueryBatch<'a> {
    /// Number of queries, `batch * horizon`.
    pub fn num_queries(&self) -> usize {
        self.layout.num_queries()
    }

    pub fn num_links(&self) -> usize {
        self.layout.links()
    }

    /// Layout of the batch this view was flattened from.
    pub fn source_layout(&self) -> BatchLayout {
        self.layout
    }

    /// All positions, `[num_queries * num_links]`.
    pub fn positions(&self) -> &'a [Vector3<f32>] {
        self.positions
    }

    /// All orientations, `[num_queries * num_links]`.
    pub fn orientations(&self) -> &'a [Matrix3<f32>] {
        self.orientations
    }

    /// Link positions of a single query.
    pub fn query_positions(&self, query: usize) -> &'a [Vector3<f32>] {
        let start = self.layout.query_index(query, 0);
        &self.positions[start..start + self.layout.links()]
    }

    /// Link orientations of a single query.
    pub fn query_orientations(&self, query: usize) -> &'a [Matrix3<f32>] {
        let start = self.layout.query_index(query, 0);
        &self.orientations[start..start + self.layout.links()]
    }

    /// Pose of one link in one query.
    pub fn link_pose(&self, query: usize, link: usize) -> (&'a Vector3<f32>, &'a Matrix3<f32>) {
        let idx = self.layout.query_index(query, link);
        (&self.positions[idx], &self.orientations[idx])
    }
}

fn nested_shape<T>(what: &str, data: &[Vec<Vec<T>>]) -> Result<(usize, usize, usize)> {
    let batch = data.len();
    let horizon = data.first().map_or(0, Vec::len);
    let links = data
        .first()
        .and_then(|steps| steps.first())
        .map_or(0, Vec::len);

    for (b, steps) in data.iter().enumerate() {
        if steps.len() != horizon {
            return Err(CollisionCostError::shape(
                format!("{horizon} steps in every {what} rollout"),
                format!("{} steps in rollout {b}", steps.len()),
            ));
        }
        for (h, step_links) in steps.iter().enumerate() {
            if step_links.len() != links {
                return Err(CollisionCostError::shape(
                    format!("{links} links in every {what} step"),
                    format!("{} links at ({b}, {h})", step_links.len()),
                ));
            }
        }
    }

    Ok((batch, horizon, links))
}
