//! Adjoints of the small linear algebra helpers in `core::linalg`.

use nalgebra::{Matrix3, Vector3};

/// Adjoint of [`inverse3`]: with `inv = m⁻¹` and upstream adjoint
/// `inv_b`, accumulate `m_b -= invᵀ · inv_b · invᵀ` — the closed form of
/// differentiating the cofactor expansion.
///
/// [`inverse3`]: crate::core::linalg::inverse3
pub fn inverse3_grad(inv: &Matrix3<f64>, inv_b: &Matrix3<f64>, m_b: &mut Matrix3<f64>) {
    let it = inv.transpose();
    *m_b -= it * inv_b * it;
}

/// Adjoint of [`scalar_row`]: route the row adjoint back to the vertex
/// values and the weight rows.
///
/// [`scalar_row`]: crate::core::linalg::scalar_row
pub fn scalar_row_grad(
    row_b: &Vector3<f64>,
    vals: &[f64],
    weight_rows: &[Vector3<f64>],
    vals_b: &mut [f64],
    weight_rows_b: &mut [Vector3<f64>],
) {
    for j in 0..vals.len() {
        vals_b[j] += row_b.dot(&weight_rows[j]);
        weight_rows_b[j] += *row_b * vals[j];
    }
}

/// Adjoint of [`attr_rows`]. `attrs_b` is vertex-major:
/// `attrs_b[v * channels + c]` mirrors `attrs[v][c]`.
///
/// [`attr_rows`]: crate::core::linalg::attr_rows
pub fn attr_rows_grad(
    rows_b: &[Vector3<f64>],
    attrs: &[&[f64]],
    weight_rows: &[Vector3<f64>],
    attrs_b: &mut [f64],
    weight_rows_b: &mut [Vector3<f64>],
) {
    let channels = rows_b.len();
    for c in 0..channels {
        for v in 0..attrs.len() {
            attrs_b[v * channels + c] += rows_b[c].dot(&weight_rows[v]);
            weight_rows_b[v] += rows_b[c] * attrs[v][c];
        }
    }
}
