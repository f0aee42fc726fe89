//! Small dense linear algebra shared by the forward and reverse passes.
//!
//! Every interpolated quantity is an affine function of the homogeneous
//! pixel `(x, y, 1)`, stored as a row `Vector3` of coefficients `(cx, cy,
//! c1)`. Scanline loops evaluate a row incrementally: the value at the
//! start of row `y` is `row_start`, and each pixel adds `row.x * x`.
//!
//! The reverse pass re-derives every forward quantity through these same
//! helpers. The depth-equality replay in `diff` depends on that: both
//! passes must produce bit-identical values, so do not reorder the
//! arithmetic here.

use nalgebra::{Matrix3, Vector3};

/// Invert a 3×3 matrix through its transposed cofactor expansion.
///
/// A singular input yields non-finite entries. Callers do not treat that as
/// an error: degenerate triangles produce NaN depths that every depth test
/// rejects, so they contribute nothing to the image or the adjoints.
pub fn inverse3(m: &Matrix3<f64>) -> Matrix3<f64> {
    let t00 = m[(1, 1)] * m[(2, 2)] - m[(2, 1)] * m[(1, 2)];
    let t10 = -(m[(1, 0)] * m[(2, 2)] - m[(2, 0)] * m[(1, 2)]);
    let t20 = m[(1, 0)] * m[(2, 1)] - m[(2, 0)] * m[(1, 1)];
    let t01 = -(m[(0, 1)] * m[(2, 2)] - m[(2, 1)] * m[(0, 2)]);
    let t11 = m[(0, 0)] * m[(2, 2)] - m[(2, 0)] * m[(0, 2)];
    let t21 = -(m[(0, 0)] * m[(2, 1)] - m[(2, 0)] * m[(0, 1)]);
    let t02 = m[(0, 1)] * m[(1, 2)] - m[(1, 1)] * m[(0, 2)];
    let t12 = -(m[(0, 0)] * m[(1, 2)] - m[(1, 0)] * m[(0, 2)]);
    let t22 = m[(0, 0)] * m[(1, 1)] - m[(1, 0)] * m[(0, 1)];

    let inv_det = 1.0 / (m[(0, 0)] * t00 + m[(0, 1)] * t10 + m[(0, 2)] * t20);

    Matrix3::new(t00, t01, t02, t10, t11, t12, t20, t21, t22) * inv_det
}

/// Rows of a 3×3 matrix as coefficient vectors.
pub fn rows3(m: &Matrix3<f64>) -> [Vector3<f64>; 3] {
    [
        Vector3::new(m[(0, 0)], m[(0, 1)], m[(0, 2)]),
        Vector3::new(m[(1, 0)], m[(1, 1)], m[(1, 2)]),
        Vector3::new(m[(2, 0)], m[(2, 1)], m[(2, 2)]),
    ]
}

/// Value of an affine scan row at the start of image row `y` (x = 0).
#[inline]
pub fn row_start(row: &Vector3<f64>, y: f64) -> f64 {
    row.y * y + row.z
}

/// Affine row mapping `(x, y, 1)` to the interpolation of per-vertex
/// scalars: `Σ_v vals[v] · weight_rows[v]`.
pub fn scalar_row(vals: &[f64], weight_rows: &[Vector3<f64>]) -> Vector3<f64> {
    debug_assert_eq!(vals.len(), weight_rows.len());
    let mut row = Vector3::zeros();
    for (val, w) in vals.iter().zip(weight_rows) {
        row += *w * *val;
    }
    row
}

/// Affine rows mapping `(x, y, 1)` to each channel of the interpolated
/// per-vertex attribute vectors: `out[c] = Σ_v attrs[v][c] · weight_rows[v]`.
pub fn attr_rows(out: &mut [Vector3<f64>], attrs: &[&[f64]], weight_rows: &[Vector3<f64>]) {
    debug_assert_eq!(attrs.len(), weight_rows.len());
    for (c, row) in out.iter_mut().enumerate() {
        let mut r = Vector3::zeros();
        for (attr, w) in attrs.iter().zip(weight_rows) {
            r += *w * attr[c];
        }
        *row = r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_inverse3_roundtrip() {
        let m = Matrix3::new(2.0, 1.0, 0.5, -1.0, 3.0, 2.0, 0.0, 1.0, 4.0);
        let inv = inverse3(&m);
        assert_relative_eq!(m * inv, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(inv * m, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_inverse3_singular_is_not_finite() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 1.0, 1.0);
        let inv = inverse3(&m);
        assert!(inv.iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn test_scalar_row_interpolates_vertices() {
        // Map built from the inverse of a triangle's barycentric matrix
        // must reproduce the vertex values at the vertices themselves.
        let verts = [(1.0, 1.0), (5.0, 2.0), (2.0, 6.0)];
        let bary_to_xy1 = Matrix3::new(
            verts[0].0, verts[1].0, verts[2].0, verts[0].1, verts[1].1, verts[2].1, 1.0, 1.0, 1.0,
        );
        let weight_rows = rows3(&inverse3(&bary_to_xy1));
        let vals = [3.0, -1.0, 7.0];
        let row = scalar_row(&vals, &weight_rows);
        for (v, val) in verts.iter().zip(vals) {
            let p = Vector3::new(v.0, v.1, 1.0);
            assert_relative_eq!(row.dot(&p), val, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_attr_rows_matches_scalar_row_per_channel() {
        let weight_rows = [
            Vector3::new(0.1, 0.2, 0.3),
            Vector3::new(-0.4, 0.5, 0.6),
            Vector3::new(0.7, -0.8, 0.9),
        ];
        let attrs: [&[f64]; 3] = [&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]];
        let mut rows = [Vector3::zeros(); 2];
        attr_rows(&mut rows, &attrs, &weight_rows);
        for c in 0..2 {
            let vals = [attrs[0][c], attrs[1][c], attrs[2][c]];
            assert_relative_eq!(rows[c], scalar_row(&vals, &weight_rows), epsilon = 1e-15);
        }
    }

    #[test]
    fn test_row_start_matches_full_evaluation() {
        let row = Vector3::new(0.25, -1.5, 4.0);
        let y = 3.0;
        assert_eq!(row_start(&row, y), row.dot(&Vector3::new(0.0, y, 1.0)));
    }
}
