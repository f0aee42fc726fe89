//! Reverse pass of triangle interior rasterization.
//!
//! The reverse routines replay the forward scan bit-for-bit and gate on
//! depth *equality*: only pixels whose final depth-buffer owner is this
//! triangle back-propagate. Each owned pixel's seed is consumed (zeroed)
//! as it is routed, so a pixel contributes to exactly one triangle even
//! on exact depth ties.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::core::linalg::{attr_rows, row_start, rows3, scalar_row};
use crate::diff::linalg_grad::{attr_rows_grad, inverse3_grad, scalar_row_grad};
use crate::diff::texture_grad::sample_grad;
use crate::render::{half_x_range, triangle_stencil, TexView};

/// Matrix whose rows are the given coefficient vectors.
pub(crate) fn matrix_from_rows(rows: &[Vector3<f64>; 3]) -> Matrix3<f64> {
    Matrix3::new(
        rows[0].x, rows[0].y, rows[0].z, rows[1].x, rows[1].y, rows[1].z, rows[2].x, rows[2].y,
        rows[2].z,
    )
}

/// Route a barycentric-map adjoint back to the three vertex positions
/// through the 3×3 inverse.
fn stencil_grad(
    xy1_to_bary: &Matrix3<f64>,
    weight_rows_b: &[Vector3<f64>; 3],
    v_b: &mut [Vector2<f64>; 3],
) {
    let bary_b = matrix_from_rows(weight_rows_b);
    let mut bary_to_xy1_b = Matrix3::zeros();
    inverse3_grad(xy1_to_bary, &bary_b, &mut bary_to_xy1_b);
    for (vtx, vb) in v_b.iter_mut().enumerate() {
        vb.x += bary_to_xy1_b[(0, vtx)];
        vb.y += bary_to_xy1_b[(1, vtx)];
    }
}

/// Reverse of [`rasterize_triangle_interpolated`]: consume per-pixel seeds
/// from `image_b` and accumulate into `v_b` and `colors_b` (vertex-major,
/// `3 × channels`).
///
/// [`rasterize_triangle_interpolated`]: crate::render::rasterize_triangle_interpolated
#[allow(clippy::too_many_arguments)]
pub fn rasterize_triangle_interpolated_grad(
    v: &[Vector2<f64>; 3],
    z: &[f64; 3],
    colors: &[&[f64]; 3],
    z_buffer: &[f64],
    image_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    v_b: &mut [Vector2<f64>; 3],
    colors_b: &mut [f64],
) {
    let st = triangle_stencil(v);
    let weight_rows = rows3(&st.xy1_to_bary);

    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &weight_rows);
    let z_row = scalar_row(z, &weight_rows);

    let mut a_rows_b = vec![Vector3::zeros(); channels];
    let mut a0y_b = vec![0.0; channels];

    for half in &st.halves {
        let y_begin = half.y_begin.max(0);
        let y_end = half.y_end.min(height as i64 - 1);
        let left = st.edge_eq[half.left];
        let right = st.edge_eq[half.right];

        for y in y_begin..=y_end {
            let yf = y as f64;
            a0y_b.fill(0.0);
            let z0y = row_start(&z_row, yf);
            let (x_begin, x_end) = half_x_range(left, right, yf, width);

            for x in x_begin..=x_end {
                let idx = y as usize * width + x as usize;
                let xf = x as f64;
                let zv = z0y + z_row.x * xf;
                if zv == z_buffer[idx] {
                    let px_b = &mut image_b[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        a0y_b[c] += px_b[c];
                        a_rows_b[c].x += px_b[c] * xf;
                        px_b[c] = 0.0;
                    }
                }
            }

            for c in 0..channels {
                a_rows_b[c].y += a0y_b[c] * yf;
                a_rows_b[c].z += a0y_b[c];
            }
        }
    }

    let mut weight_rows_b = [Vector3::zeros(); 3];
    attr_rows_grad(&a_rows_b, colors, &weight_rows, colors_b, &mut weight_rows_b);
    stencil_grad(&st.xy1_to_bary, &weight_rows_b, v_b);
}

/// Reverse of [`rasterize_triangle_textured`]: accumulate into `v_b`,
/// `uv_b`, `shade_b`, and the full texture adjoint.
///
/// [`rasterize_triangle_textured`]: crate::render::rasterize_triangle_textured
#[allow(clippy::too_many_arguments)]
pub fn rasterize_triangle_textured_grad(
    v: &[Vector2<f64>; 3],
    z: &[f64; 3],
    uv: &[Vector2<f64>; 3],
    shade: &[f64; 3],
    tex: &TexView<'_>,
    z_buffer: &[f64],
    image_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    v_b: &mut [Vector2<f64>; 3],
    uv_b: &mut [Vector2<f64>; 3],
    shade_b: &mut [f64; 3],
    texture_b: &mut [f64],
) {
    let st = triangle_stencil(v);
    let weight_rows = rows3(&st.xy1_to_bary);

    let uv_attrs: [[f64; 2]; 3] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y], [uv[2].x, uv[2].y]];
    let uv_refs: [&[f64]; 3] = [&uv_attrs[0], &uv_attrs[1], &uv_attrs[2]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &weight_rows);
    let l_row = scalar_row(shade, &weight_rows);
    let z_row = scalar_row(z, &weight_rows);

    let mut uv_rows_b = [Vector3::zeros(); 2];
    let mut l_row_b = Vector3::zeros();
    let mut sample = vec![0.0; channels];
    let mut sample_b = vec![0.0; channels];

    for half in &st.halves {
        let y_begin = half.y_begin.max(0);
        let y_end = half.y_end.min(height as i64 - 1);
        let left = st.edge_eq[half.left];
        let right = st.edge_eq[half.right];

        for y in y_begin..=y_end {
            let yf = y as f64;
            let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
            let mut uv0y_b = Vector2::zeros();
            let l0y = row_start(&l_row, yf);
            let mut l0y_b = 0.0;
            let z0y = row_start(&z_row, yf);
            let (x_begin, x_end) = half_x_range(left, right, yf, width);

            for x in x_begin..=x_end {
                let idx = y as usize * width + x as usize;
                let xf = x as f64;
                let zv = z0y + z_row.x * xf;
                if zv == z_buffer[idx] {
                    let l = l0y + l_row.x * xf;
                    let mut l_b = 0.0;
                    let p = Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    sample_b.fill(0.0);

                    let px_b = &mut image_b[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        sample_b[c] += px_b[c] * l;
                        l_b += px_b[c] * sample[c];
                        px_b[c] = 0.0;
                    }

                    let mut p_b = Vector2::zeros();
                    sample_grad(tex, p, &sample_b, texture_b, &mut p_b);
                    uv0y_b += p_b;
                    uv_rows_b[0].x += p_b.x * xf;
                    uv_rows_b[1].x += p_b.y * xf;
                    l0y_b += l_b;
                    l_row_b.x += xf * l_b;
                }
            }

            for i in 0..2 {
                uv_rows_b[i].y += uv0y_b[i] * yf;
                uv_rows_b[i].z += uv0y_b[i];
            }
            l_row_b.y += l0y_b * yf;
            l_row_b.z += l0y_b;
        }
    }

    let mut weight_rows_b = [Vector3::zeros(); 3];
    let mut uv_flat_b = [0.0; 6];
    attr_rows_grad(
        &uv_rows_b,
        &uv_refs,
        &weight_rows,
        &mut uv_flat_b,
        &mut weight_rows_b,
    );
    for vtx in 0..3 {
        uv_b[vtx].x += uv_flat_b[2 * vtx];
        uv_b[vtx].y += uv_flat_b[2 * vtx + 1];
    }
    scalar_row_grad(&l_row_b, shade, &weight_rows, shade_b, &mut weight_rows_b);
    stencil_grad(&st.xy1_to_bary, &weight_rows_b, v_b);
}
