//! Silhouette edge stencil and soft overdraw.
//!
//! Each flagged edge is widened into a parallelogram: the edge segment
//! swept along its outward unit normal by sigma pixels. Inside that band a
//! transparency `T` grows linearly from 0 on the edge line to 1 at the far
//! side, and the edge color is composited as
//! `image = T·image + (1−T)·edge_color`. The compositing is invertible in
//! `T ∈ (0, 1]`, which is what lets the reverse pass restore the image
//! state each overdraw saw (see `diff::edge_grad`).
//!
//! Edges depth-test against the interior z-buffer but never write it.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::core::linalg::{attr_rows, inverse3, row_start, rows3, scalar_row};
use crate::render::texture::TexView;
use crate::render::floor_i;

pub(crate) struct EdgeStencil {
    /// Rows mapping `(x, y, 1)` to the weights of the two endpoints.
    pub weight_rows: [Vector3<f64>; 2],
    /// Row mapping `(x, y, 1)` to the transparency `T`.
    pub transp_row: Vector3<f64>,
    /// Half-planes `cx·x + cy·y + c ≥ 0` clamping the endpoint weights
    /// and `T` to `[0, 1]`.
    pub ineq: [Vector3<f64>; 4],
    pub y_begin: i64,
    pub y_end: i64,
}

/// Outward normal of the edge `v[0] → v[1]` before normalization, oriented
/// by the winding polarity. The forward and reverse passes must branch the
/// same way or edge gradients change sign.
pub(crate) fn edge_normal(v: &[Vector2<f64>; 2], clockwise: bool) -> Vector2<f64> {
    if clockwise {
        Vector2::new(v[1].y - v[0].y, v[0].x - v[1].x)
    } else {
        Vector2::new(v[0].y - v[1].y, v[1].x - v[0].x)
    }
}

pub(crate) fn edge_stencil(
    v: &[Vector2<f64>; 2],
    height: usize,
    sigma: f64,
    clockwise: bool,
) -> EdgeStencil {
    let nt = edge_normal(v, clockwise);
    let inv_norm = 1.0 / (nt.x * nt.x + nt.y * nt.y).sqrt();
    let n = nt * inv_norm;

    // Columns: the homogeneous endpoints and the unit normal with weight 0.
    // The inverse maps a pixel to (w0, w1, distance along n).
    let edge_to_xy1 = Matrix3::new(v[0].x, v[1].x, n.x, v[0].y, v[1].y, n.y, 1.0, 1.0, 0.0);
    let xy1_to_edge = inverse3(&edge_to_xy1);
    let rows = rows3(&xy1_to_edge);

    let weight_rows = [rows[0], rows[1]];
    let transp_row = rows[2] * (1.0 / sigma);

    let ineq = [
        weight_rows[0],
        weight_rows[1],
        transp_row,
        Vector3::new(-transp_row.x, -transp_row.y, 1.0 - transp_row.z),
    ];

    let y_begin = floor_i(v[0].y.min(v[1].y) - sigma).saturating_add(1).max(0);
    let y_end = floor_i(v[0].y.max(v[1].y) + sigma).min(height as i64 - 1);

    EdgeStencil {
        weight_rows,
        transp_row,
        ineq,
        y_begin,
        y_end,
    }
}

/// Solve the four stencil half-planes for the x-interval of row `y`.
///
/// A constraint with no x dependence (a horizontal edge's transparency
/// band) gates the whole row instead. The gate is strict so pixels with
/// `T` exactly 0 are never composited and un-compositing never divides by
/// zero; NaN coefficients from a degenerate edge fail it too, yielding an
/// empty row.
pub(crate) fn x_range(ineq: &[Vector3<f64>; 4], width: usize, y: f64) -> (i64, i64) {
    let mut x_begin = 0i64;
    let mut x_end = width as i64 - 1;
    for row in ineq {
        let rest = row.y * y + row.z;
        if row.x > 0.0 {
            x_begin = x_begin.max(floor_i(-rest / row.x).saturating_add(1));
        } else if row.x < 0.0 {
            x_end = x_end.min(floor_i(rest / -row.x));
        } else if !(rest > 0.0) {
            return (0, -1);
        }
    }
    (x_begin, x_end)
}

/// Overdraw one silhouette edge with affine-interpolated endpoint colors.
pub fn rasterize_edge_interpolated(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    colors: &[&[f64]; 2],
    z_buffer: &[f64],
    image: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &st.weight_rows);
    let mut a0y = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        for (a, row) in a0y.iter_mut().zip(&a_rows) {
            *a = row_start(row, yf);
        }
        let t0y = row_start(&st.transp_row, yf);
        let z0y = row_start(&z_row, yf);
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let t = t0y + st.transp_row.x * xf;
                // A pixel with T exactly 0 stays untouched: compositing it
                // would not be invertible.
                if t > 0.0 {
                    let px = &mut image[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        px[c] = t * px[c] + (1.0 - t) * (a0y[c] + a_rows[c].x * xf);
                    }
                }
            }
        }
    }
}

/// Overdraw one silhouette edge with texture sampled at interpolated uv,
/// modulated by the interpolated shade.
pub fn rasterize_edge_textured(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    uv: &[Vector2<f64>; 2],
    shade: &[f64; 2],
    tex: &TexView<'_>,
    z_buffer: &[f64],
    image: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let l_row = scalar_row(shade, &st.weight_rows);
    let uv_attrs: [[f64; 2]; 2] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y]];
    let uv_refs: [&[f64]; 2] = [&uv_attrs[0], &uv_attrs[1]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &st.weight_rows);

    let mut sample = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        let t0y = row_start(&st.transp_row, yf);
        let z0y = row_start(&z_row, yf);
        let l0y = row_start(&l_row, yf);
        let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let t = t0y + st.transp_row.x * xf;
                if t > 0.0 {
                    let l = l0y + l_row.x * xf;
                    let p =
                        Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    let px = &mut image[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        px[c] = t * px[c] + (1.0 - t) * sample[c] * l;
                    }
                }
            }
        }
    }
}

/// Error-mode overdraw: composite the squared error between the edge's
/// interpolated color and the observation into `err_buffer` instead of
/// touching the color image.
pub fn rasterize_edge_interpolated_error(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    colors: &[&[f64]; 2],
    z_buffer: &[f64],
    obs: &[f64],
    err_buffer: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &st.weight_rows);
    let mut a0y = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        for (a, row) in a0y.iter_mut().zip(&a_rows) {
            *a = row_start(row, yf);
        }
        let t0y = row_start(&st.transp_row, yf);
        let z0y = row_start(&z_row, yf);
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let tr = t0y + st.transp_row.x * xf;
                if tr > 0.0 {
                    let base = channels * idx;
                    let mut err = 0.0;
                    for c in 0..channels {
                        let diff = (a0y[c] + a_rows[c].x * xf) - obs[base + c];
                        err += diff * diff;
                    }
                    err_buffer[idx] = tr * err_buffer[idx] + (1.0 - tr) * err;
                }
            }
        }
    }
}

/// Error-mode overdraw for the textured-shaded path.
pub fn rasterize_edge_textured_error(
    v: &[Vector2<f64>; 2],
    z: &[f64; 2],
    uv: &[Vector2<f64>; 2],
    shade: &[f64; 2],
    tex: &TexView<'_>,
    z_buffer: &[f64],
    obs: &[f64],
    err_buffer: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
    sigma: f64,
    clockwise: bool,
) {
    let st = edge_stencil(v, height, sigma, clockwise);
    let z_row = scalar_row(z, &st.weight_rows);
    let l_row = scalar_row(shade, &st.weight_rows);
    let uv_attrs: [[f64; 2]; 2] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y]];
    let uv_refs: [&[f64]; 2] = [&uv_attrs[0], &uv_attrs[1]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &st.weight_rows);

    let mut sample = vec![0.0; channels];

    for y in st.y_begin..=st.y_end {
        let yf = y as f64;
        let t0y = row_start(&st.transp_row, yf);
        let z0y = row_start(&z_row, yf);
        let l0y = row_start(&l_row, yf);
        let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
        let (x_begin, x_end) = x_range(&st.ineq, width, yf);

        for x in x_begin..=x_end {
            let idx = y as usize * width + x as usize;
            let xf = x as f64;
            let zv = z0y + z_row.x * xf;
            if zv < z_buffer[idx] {
                let tr = t0y + st.transp_row.x * xf;
                if tr > 0.0 {
                    let l = l0y + l_row.x * xf;
                    let p =
                        Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    let base = channels * idx;
                    let mut err = 0.0;
                    for c in 0..channels {
                        let diff = sample[c] * l - obs[base + c];
                        err += diff * diff;
                    }
                    err_buffer[idx] = tr * err_buffer[idx] + (1.0 - tr) * err;
                }
            }
        }
    }
}
