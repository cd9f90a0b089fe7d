//! Rigid-transform helpers for scene conversion.

use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, UnitQuaternion, Vector3};
use rayon::prelude::*;

use crate::error::{CollisionCostError, Result};

/// Tolerance on `RᵀR = I` and `det R = 1` when accepting a 4x4 as rigid.
const RIGID_TOLERANCE: f64 = 1e-4;

/// Clouds at least this large are transformed in parallel.
const PARALLEL_MIN_POINTS: usize = 10_000;

/// Row-major 4x4 identity.
pub const IDENTITY_ROWS: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Convert a row-major homogeneous matrix into an isometry.
///
/// Fails unless the bottom row is `[0, 0, 0, 1]` and the upper-left block is a
/// proper rotation.
pub fn isometry_from_rows(what: &str, rows: &[[f64; 4]; 4]) -> Result<Isometry3<f64>> {
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(CollisionCostError::config(format!(
            "{what} contains non-finite entries"
        )));
    }

    let bottom = rows[3];
    if bottom[0].abs() > RIGID_TOLERANCE
        || bottom[1].abs() > RIGID_TOLERANCE
        || bottom[2].abs() > RIGID_TOLERANCE
        || (bottom[3] - 1.0).abs() > RIGID_TOLERANCE
    {
        return Err(CollisionCostError::config(format!(
            "{what} is not homogeneous: bottom row is {bottom:?}"
        )));
    }

    let rotation = Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    );
    let orthogonality_error = (rotation.transpose() * rotation - Matrix3::identity()).abs().max();
    let det = rotation.determinant();
    if orthogonality_error > RIGID_TOLERANCE || (det - 1.0).abs() > RIGID_TOLERANCE {
        return Err(CollisionCostError::config(format!(
            "{what} is not a rigid transform (orthogonality error {orthogonality_error:.2e}, det {det:.6})"
        )));
    }

    let translation = Translation3::from(Vector3::new(rows[0][3], rows[1][3], rows[2][3]));
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
    Ok(Isometry3::from_parts(translation, rotation))
}

/// Row-major homogeneous matrix of an isometry.
pub fn isometry_to_rows(iso: &Isometry3<f64>) -> [[f64; 4]; 4] {
    let m = iso.to_homogeneous();
    let mut rows = [[0.0; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = m[(r, c)];
        }
    }
    rows
}

/// Apply `transform` to every point.
pub fn transform_points(points: &[[f32; 3]], transform: &Isometry3<f64>) -> Vec<[f32; 3]> {
    let apply = |p: &[f32; 3]| {
        let t = transform * Point3::new(p[0] as f64, p[1] as f64, p[2] as f64);
        [t.x as f32, t.y as f32, t.z as f32]
    };

    if points.len() >= PARALLEL_MIN_POINTS {
        points.par_iter().map(apply).collect()
    } else {
        points.iter().map(apply).collect()
    }
}
