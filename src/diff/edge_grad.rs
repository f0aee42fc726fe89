//! Reverse pass of silhouette edge overdraw.
//!
//! The forward composite `post = T·pre + (1−T)·a` is invertible for
//! `T ∈ (0, 1]`, so each reverse routine restores `pre = (post − (1−T)·a)/T`
//! while routing the seed: the image adjoint is scaled by `T` (the factor
//! the next-older overdraw saw) and the remainder flows into the edge color
//! and the transparency field. The scene driver must therefore call these
//! in exact reverse painter order — each call reconstructs the image state
//! its forward twin started from.
//!
//! Transparency and endpoint-weight adjoints propagate to the vertices
//! through the parallelogram matrix inverse, the normalization of the
//! outward normal, and the winding-polarity branch.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::core::linalg::{attr_rows, inverse3, row_start, scalar_row};
use crate::diff::linalg_grad::{attr_rows_grad, inverse3_grad, scalar_row_grad};
use crate::diff::texture_grad::sample_grad;
use crate::render::{edge_normal, edge_stencil, x_range, TexView};

/// Adjoint of the edge stencil construction: propagate the weight-row and
/// transparency adjoints back to the two edge endpoints.
pub(crate) fn edge_stencil_grad(
    v: &[Vector2<f64>; 2],
    sigma: f64,
    clockwise: bool,
    weight_rows_b: &[Vector3<f64>; 2],
    transp_row_b: &Vector3<f64>,
    v_b: &mut [Vector2<f64>; 2],
) {
    let nt = edge_normal(v, clockwise);
    let inv_norm = 1.0 / (nt.x * nt.x + nt.y * nt.y).sqrt();
    let n = nt * inv_norm;
    let edge_to_xy1 = Matrix3::new(v[0].x, v[1].x, n.x, v[0].y, v[1].y, n.y, 1.0, 1.0, 0.0);
    let xy1_to_edge = inverse3(&edge_to_xy1);

    // Rows 0..1 carry the endpoint weights, row 2 is the transparency row
    // before the 1/sigma scale.
    let xy1_to_edge_b = Matrix3::new(
        weight_rows_b[0].x,
        weight_rows_b[0].y,
        weight_rows_b[0].z,
        weight_rows_b[1].x,
        weight_rows_b[1].y,
        weight_rows_b[1].z,
        transp_row_b.x * (1.0 / sigma),
        transp_row_b.y * (1.0 / sigma),
        transp_row_b.z * (1.0 / sigma),
    );

    let mut edge_to_xy1_b = Matrix3::zeros();
    inverse3_grad(&xy1_to_edge, &xy1_to_edge_b, &mut edge_to_xy1_b);

    for (vtx, vb) in v_b.iter_mut().enumerate() {
        vb.x += edge_to_xy1_b[(0, vtx)];
        vb.y += edge_to_xy1_b[(1, vtx)];
    }

    // Through the normalization n = nt / |nt|.
    let n_b = Vector2::new(edge_to_xy1_b[(0, 2)], edge_to_xy1_b[(1, 2)]);
    let mut nt_b = n_b * inv_norm;
    let inv_norm_b = n_b.dot(&nt);
    let norm_b = -inv_norm_b * inv_norm * inv_norm;
    let norm_sq_b = norm_b * 0.5 * inv_norm;
    nt_b += nt * (2.0 * norm_sq_b);

    // Mirror of the orientation branch in `edge_normal`.
    if clockwise {
        v_b[1].y += nt_b.x;
        v_b[0].y -= nt_b.x;
        v_b[0].x += nt_b.y;
        v_b[1].x -= nt_b.y;
    } else {
        v_b[0].y += nt_b.x;
        v_b[1].y -= nt_b.x;
        v_b[1].x += nt_b.y;
        v_b[0].x -= nt_b.y;
    }
}

/// Reverse of [`rasterize_edge_interpolated`]: restore the pre-overdraw
/// image, rescale the seed, and accumulate into `v_b` and `colors_b`
/// (vertex-major, `2 × channels`).
///
/// [`rasterize_edge_interpolated`]: crate::render::rasterize_edge_interpolated
#[allow(clippy::too_many_arguments)]
pub fn rasterize_edge_interpolated_grad(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    colors: &[&[f64]; 2],
    z_buffer: &[f64],
    image: &mut [f64],
    image_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
    v_b: &mut [Vector2<f64>; 2],
    colors_b: &mut [f64],
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &st.weight_rows);

    let mut a_rows_b = vec![Vector3::zeros(); channels];
    let mut a0y = vec![0.0; channels];
    let mut a0y_b = vec![0.0; channels];
    let mut transp_row_b = Vector3::zeros();
    let mut t_inc_b = 0.0;

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        for (a, row) in a0y.iter_mut().zip(&a_rows) {
            *a = row_start(row, yf);
        }
        a0y_b.fill(0.0);
        let t0y = row_start(&st.transp_row, yf);
        let mut t0y_b = 0.0;
        let z0y = row_start(&z_row, yf);
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let t = t0y + st.transp_row.x * xf;
                if t > 0.0 {
                    let mut t_b = 0.0;
                    let base = channels * idx;
                    for c in 0..channels {
                        let a = a0y[c] + a_rows[c].x * xf;
                        t_b -= image_b[base + c] * a;
                        let a_b = (1.0 - t) * image_b[base + c];
                        // Restore the color this overdraw composited over.
                        image[base + c] = (image[base + c] - (1.0 - t) * a) / t;
                        t_b += image_b[base + c] * image[base + c];
                        image_b[base + c] *= t;
                        a0y_b[c] += a_b;
                        a_rows_b[c].x += xf * a_b;
                    }
                    t0y_b += t_b;
                    t_inc_b += xf * t_b;
                }
            }
        }

        for c in 0..channels {
            a_rows_b[c].y += a0y_b[c] * yf;
            a_rows_b[c].z += a0y_b[c];
        }
        transp_row_b.y += t0y_b * yf;
        transp_row_b.z += t0y_b;
    }

    let mut weight_rows_b = [Vector3::zeros(); 2];
    attr_rows_grad(&a_rows_b, colors, &st.weight_rows, colors_b, &mut weight_rows_b);
    transp_row_b.x += t_inc_b;
    edge_stencil_grad(v, sigma, clockwise, &weight_rows_b, &transp_row_b, v_b);
}

/// Reverse of [`rasterize_edge_textured`].
///
/// [`rasterize_edge_textured`]: crate::render::rasterize_edge_textured
#[allow(clippy::too_many_arguments)]
pub fn rasterize_edge_textured_grad(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    uv: &[Vector2<f64>; 2],
    shade: &[f64; 2],
    tex: &TexView<'_>,
    z_buffer: &[f64],
    image: &mut [f64],
    image_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
    v_b: &mut [Vector2<f64>; 2],
    uv_b: &mut [Vector2<f64>; 2],
    shade_b: &mut [f64; 2],
    texture_b: &mut [f64],
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let l_row = scalar_row(shade, &st.weight_rows);
    let uv_attrs: [[f64; 2]; 2] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y]];
    let uv_refs: [&[f64]; 2] = [&uv_attrs[0], &uv_attrs[1]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &st.weight_rows);

    let mut uv_rows_b = [Vector3::zeros(); 2];
    let mut l_row_b = Vector3::zeros();
    let mut transp_row_b = Vector3::zeros();
    let mut t_inc_b = 0.0;
    let mut sample = vec![0.0; channels];
    let mut sample_b = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        let t0y = row_start(&st.transp_row, yf);
        let mut t0y_b = 0.0;
        let z0y = row_start(&z_row, yf);
        let l0y = row_start(&l_row, yf);
        let mut l0y_b = 0.0;
        let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
        let mut uv0y_b = Vector2::zeros();
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let t = t0y + st.transp_row.x * xf;
                if t > 0.0 {
                    let l = l0y + l_row.x * xf;
                    let mut l_b = 0.0;
                    let mut t_b = 0.0;
                    let p =
                        Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    sample_b.fill(0.0);

                    let base = channels * idx;
                    for c in 0..channels {
                        t_b -= image_b[base + c] * sample[c] * l;
                        sample_b[c] += l * (1.0 - t) * image_b[base + c];
                        l_b += image_b[base + c] * (1.0 - t) * sample[c];
                        image[base + c] = (image[base + c] - (1.0 - t) * sample[c] * l) / t;
                        t_b += image_b[base + c] * image[base + c];
                        image_b[base + c] *= t;
                    }

                    let mut p_b = Vector2::zeros();
                    sample_grad(tex, p, &sample_b, texture_b, &mut p_b);
                    uv0y_b += p_b;
                    uv_rows_b[0].x += p_b.x * xf;
                    uv_rows_b[1].x += p_b.y * xf;
                    l0y_b += l_b;
                    l_row_b.x += xf * l_b;
                    t0y_b += t_b;
                    t_inc_b += xf * t_b;
                }
            }
        }

        transp_row_b.y += t0y_b * yf;
        transp_row_b.z += t0y_b;
        for i in 0..2 {
            uv_rows_b[i].y += uv0y_b[i] * yf;
            uv_rows_b[i].z += uv0y_b[i];
        }
        l_row_b.y += l0y_b * yf;
        l_row_b.z += l0y_b;
    }

    let mut weight_rows_b = [Vector3::zeros(); 2];
    let mut uv_flat_b = [0.0; 4];
    attr_rows_grad(
        &uv_rows_b,
        &uv_refs,
        &st.weight_rows,
        &mut uv_flat_b,
        &mut weight_rows_b,
    );
    for vtx in 0..2 {
        uv_b[vtx].x += uv_flat_b[2 * vtx];
        uv_b[vtx].y += uv_flat_b[2 * vtx + 1];
    }
    scalar_row_grad(&l_row_b, shade, &st.weight_rows, shade_b, &mut weight_rows_b);
    transp_row_b.x += t_inc_b;
    edge_stencil_grad(v, sigma, clockwise, &weight_rows_b, &transp_row_b, v_b);
}

/// Reverse of [`rasterize_edge_interpolated_error`]: restore the
/// pre-overdraw error buffer, rescale its seed, and route the squared
/// error through the edge color.
///
/// [`rasterize_edge_interpolated_error`]: crate::render::rasterize_edge_interpolated_error
#[allow(clippy::too_many_arguments)]
pub fn rasterize_edge_interpolated_error_grad(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    colors: &[&[f64]; 2],
    z_buffer: &[f64],
    obs: &[f64],
    err_buffer: &mut [f64],
    err_buffer_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
    v_b: &mut [Vector2<f64>; 2],
    colors_b: &mut [f64],
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &st.weight_rows);

    let mut a_rows_b = vec![Vector3::zeros(); channels];
    let mut a0y = vec![0.0; channels];
    let mut a0y_b = vec![0.0; channels];
    let mut transp_row_b = Vector3::zeros();
    let mut t_inc_b = 0.0;

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        for (a, row) in a0y.iter_mut().zip(&a_rows) {
            *a = row_start(row, yf);
        }
        a0y_b.fill(0.0);
        let t0y = row_start(&st.transp_row, yf);
        let mut t0y_b = 0.0;
        let z0y = row_start(&z_row, yf);
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let tr = t0y + st.transp_row.x * xf;
                if tr > 0.0 {
                    let mut tr_b = 0.0;
                    let base = channels * idx;

                    let mut err = 0.0;
                    for c in 0..channels {
                        let diff = (a0y[c] + a_rows[c].x * xf) - obs[base + c];
                        err += diff * diff;
                    }

                    tr_b -= err * err_buffer_b[idx];
                    let err_b = (1.0 - tr) * err_buffer_b[idx];
                    err_buffer[idx] -= (1.0 - tr) * err;
                    err_buffer[idx] /= tr;
                    tr_b += err_buffer_b[idx] * err_buffer[idx];
                    err_buffer_b[idx] *= tr;

                    for c in 0..channels {
                        let diff = (a0y[c] + a_rows[c].x * xf) - obs[base + c];
                        let diff_b = 2.0 * diff * err_b;
                        a0y_b[c] += diff_b;
                        a_rows_b[c].x += xf * diff_b;
                    }

                    t0y_b += tr_b;
                    t_inc_b += xf * tr_b;
                }
            }
        }

        for c in 0..channels {
            a_rows_b[c].y += a0y_b[c] * yf;
            a_rows_b[c].z += a0y_b[c];
        }
        transp_row_b.y += t0y_b * yf;
        transp_row_b.z += t0y_b;
    }

    let mut weight_rows_b = [Vector3::zeros(); 2];
    attr_rows_grad(&a_rows_b, colors, &st.weight_rows, colors_b, &mut weight_rows_b);
    transp_row_b.x += t_inc_b;
    edge_stencil_grad(v, sigma, clockwise, &weight_rows_b, &transp_row_b, v_b);
}

/// Reverse of [`rasterize_edge_textured_error`].
///
/// [`rasterize_edge_textured_error`]: crate::render::rasterize_edge_textured_error
#[allow(clippy::too_many_arguments)]
pub fn rasterize_edge_textured_error_grad(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    uv: &[Vector2<f64>; 2],
    shade: &[f64; 2],
    tex: &TexView<'_>,
    z_buffer: &[f64],
    obs: &[f64],
    err_buffer: &mut [f64],
    err_buffer_b: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
    v_b: &mut [Vector2<f64>; 2],
    uv_b: &mut [Vector2<f64>; 2],
    shade_b: &mut [f64; 2],
    texture_b: &mut [f64],
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let l_row = scalar_row(shade, &st.weight_rows);
    let uv_attrs: [[f64; 2]; 2] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y]];
    let uv_refs: [&[f64]; 2] = [&uv_attrs[0], &uv_attrs[1]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &st.weight_rows);

    let mut uv_rows_b = [Vector3::zeros(); 2];
    let mut l_row_b = Vector3::zeros();
    let mut transp_row_b = Vector3::zeros();
    let mut t_inc_b = 0.0;
    let mut sample = vec![0.0; channels];
    let mut sample_b = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        let t0y = row_start(&st.transp_row, yf);
        let mut t0y_b = 0.0;
        let z0y = row_start(&z_row, yf);
        let l0y = row_start(&l_row, yf);
        let mut l0y_b = 0.0;
        let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
        let mut uv0y_b = Vector2::zeros();
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let tr = t0y + st.transp_row.x * xf;
                if tr > 0.0 {
                    let l = l0y + l_row.x * xf;
                    let mut l_b = 0.0;
                    let mut tr_b = 0.0;
                    let p =
                        Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    sample_b.fill(0.0);

                    let base = channels * idx;
                    let mut err = 0.0;
                    for c in 0..channels {
                        let diff = sample[c] * l - obs[base + c];
                        err += diff * diff;
                    }

                    tr_b -= err * err_buffer_b[idx];
                    let err_b = (1.0 - tr) * err_buffer_b[idx];
                    err_buffer[idx] -= (1.0 - tr) * err;
                    err_buffer[idx] /= tr;
                    tr_b += err_buffer_b[idx] * err_buffer[idx];
                    err_buffer_b[idx] *= tr;

                    for c in 0..channels {
                        let diff = sample[c] * l - obs[base + c];
                        let diff_b = 2.0 * diff * err_b;
                        sample_b[c] += diff_b * l;
                        l_b += diff_b * sample[c];
                    }

                    let mut p_b = Vector2::zeros();
                    sample_grad(tex, p, &sample_b, texture_b, &mut p_b);
                    uv0y_b += p_b;
                    uv_rows_b[0].x += p_b.x * xf;
                    uv_rows_b[1].x += p_b.y * xf;
                    l0y_b += l_b;
                    l_row_b.x += xf * l_b;
                    t0y_b += tr_b;
                    t_inc_b += xf * tr_b;
                }
            }
        }

        transp_row_b.y += t0y_b * yf;
        transp_row_b.z += t0y_b;
        for i in 0..2 {
            uv_rows_b[i].y += uv0y_b[i] * yf;
            uv_rows_b[i].z += uv0y_b[i];
        }
        l_row_b.y += l0y_b * yf;
        l_row_b.z += l0y_b;
    }

    let mut weight_rows_b = [Vector3::zeros(); 2];
    let mut uv_flat_b = [0.0; 4];
    attr_rows_grad(
        &uv_rows_b,
        &uv_refs,
        &st.weight_rows,
        &mut uv_flat_b,
        &mut weight_rows_b,
    );
    for vtx in 0..2 {
        uv_b[vtx].x += uv_flat_b[2 * vtx];
        uv_b[vtx].y += uv_flat_b[2 * vtx + 1];
    }
    scalar_row_grad(&l_row_b, shade, &st.weight_rows, shade_b, &mut weight_rows_b);
    transp_row_b.x += t_inc_b;
    edge_stencil_grad(v, sigma, clockwise, &weight_rows_b, &transp_row_b, v_b);
}
