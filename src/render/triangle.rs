//! Triangle stencil equations and interior rasterization.
//!
//! A triangle's stencil is the affine machinery the scanline loop needs:
//! the barycentric map (a 3×3 inverse), the three edge lines in the form
//! `x = a·y + b`, and the two y-scan halves with their bounding edges.
//! Interior pixels pass a hard depth test; there is no sub-pixel coverage
//! here — silhouette antialiasing is the edge pass's job.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::core::linalg::{attr_rows, inverse3, row_start, rows3, scalar_row};
use crate::render::texture::TexView;
use crate::render::floor_i;

/// One y-interval of a triangle, bounded left and right by single edges.
pub(crate) struct ScanHalf {
    pub y_begin: i64,
    pub y_end: i64,
    pub left: usize,
    pub right: usize,
}

pub(crate) struct TriangleStencil {
    pub xy1_to_bary: Matrix3<f64>,
    /// Edge lines `x = a·y + b` as `(a, b)` for edges 0→1, 1→2, 2→0.
    pub edge_eq: [Vector2<f64>; 3],
    pub halves: [ScanHalf; 2],
}

/// Line through `v1` and `v2` in the form `x = a·y + b`. Horizontal edges
/// produce infinite coefficients; they only ever bound an empty scan half.
fn edge_line(v1: Vector2<f64>, v2: Vector2<f64>) -> Vector2<f64> {
    let a = (v1.x - v2.x) / (v1.y - v2.y);
    Vector2::new(a, v1.x - a * v1.y)
}

/// Indices of the three vertices sorted by ascending y.
fn sort_by_y(v: &[Vector2<f64>; 3]) -> ([usize; 3], [f64; 3]) {
    let mut idx = [0usize, 1, 2];
    let mut ys = [v[0].y, v[1].y, v[2].y];
    if ys[0] > ys[1] {
        ys.swap(0, 1);
        idx.swap(0, 1);
    }
    if ys[0] > ys[2] {
        ys.swap(0, 2);
        idx.swap(0, 2);
    }
    if ys[1] > ys[2] {
        ys.swap(1, 2);
        idx.swap(1, 2);
    }
    (idx, ys)
}

pub(crate) fn triangle_stencil(v: &[Vector2<f64>; 3]) -> TriangleStencil {
    // Columns of bary_to_xy1 are the homogeneous vertices, so its inverse
    // maps a homogeneous pixel to barycentric weights.
    let bary_to_xy1 = Matrix3::new(
        v[0].x, v[1].x, v[2].x, v[0].y, v[1].y, v[2].y, 1.0, 1.0, 1.0,
    );
    let xy1_to_bary = inverse3(&bary_to_xy1);

    let edge_eq = [
        edge_line(v[0], v[1]),
        edge_line(v[1], v[2]),
        edge_line(v[2], v[0]),
    ];

    let (order, ys) = sort_by_y(v);

    // Each half is bounded by the two edges incident to its apex vertex:
    // edge `id` starts at vertex `id`, edge `(id+2)%3` ends there. The
    // smaller slope bounds the left of the upper half and the right of the
    // lower half.
    let upper = {
        let id = order[0];
        let (e0, e1) = (id, (id + 2) % 3);
        let (left, right) = if edge_eq[e0].x < edge_eq[e1].x {
            (e0, e1)
        } else {
            (e1, e0)
        };
        ScanHalf {
            y_begin: floor_i(ys[0]).saturating_add(1),
            y_end: floor_i(ys[1]),
            left,
            right,
        }
    };
    let lower = {
        let id = order[2];
        let (e0, e1) = (id, (id + 2) % 3);
        let (left, right) = if edge_eq[e0].x < edge_eq[e1].x {
            (e1, e0)
        } else {
            (e0, e1)
        };
        ScanHalf {
            y_begin: floor_i(ys[1]).saturating_add(1),
            y_end: floor_i(ys[2]),
            left,
            right,
        }
    };

    TriangleStencil {
        xy1_to_bary,
        edge_eq,
        halves: [upper, lower],
    }
}

/// x-interval of a scan half at row `y`, clipped to the image.
#[inline]
pub(crate) fn half_x_range(
    left: Vector2<f64>,
    right: Vector2<f64>,
    y: f64,
    width: usize,
) -> (i64, i64) {
    let x_begin = floor_i(left.x * y + left.y).saturating_add(1).max(0);
    let x_end = floor_i(right.x * y + right.y).min(width as i64 - 1);
    (x_begin, x_end)
}

/// Fill a triangle with affine-interpolated per-vertex colors, overwriting
/// depth-buffer winners.
pub fn rasterize_triangle_interpolated(
    v: &[Vector2<f64>; 3],
    z: &[f64; 3],
    colors: &[&[f64]; 3],
    z_buffer: &mut [f64],
    image: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
) {
    let st = triangle_stencil(v);
    let weight_rows = rows3(&st.xy1_to_bary);

    let mut a_rows = vec![Vector3::zeros(); channels];
    attr_rows(&mut a_rows, colors, &weight_rows);
    let z_row = scalar_row(z, &weight_rows);

    let mut a0y = vec![0.0; channels];

    for half in &st.halves {
        let y_begin = half.y_begin.max(0);
        let y_end = half.y_end.min(height as i64 - 1);
        let left = st.edge_eq[half.left];
        let right = st.edge_eq[half.right];

        for y in y_begin..=y_end {
            let yf = y as f64;
            for (a, row) in a0y.iter_mut().zip(&a_rows) {
                *a = row_start(row, yf);
            }
            let z0y = row_start(&z_row, yf);
            let (x_begin, x_end) = half_x_range(left, right, yf, width);

            for x in x_begin..=x_end {
                let idx = y as usize * width + x as usize;
                let zv = z0y + z_row.x * x as f64;
                if zv < z_buffer[idx] {
                    z_buffer[idx] = zv;
                    let px = &mut image[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        px[c] = a0y[c] + a_rows[c].x * x as f64;
                    }
                }
            }
        }
    }
}

/// Fill a triangle by sampling `tex` at interpolated uv coordinates and
/// modulating by the interpolated Gouraud shade.
pub fn rasterize_triangle_textured(
    v: &[Vector2<f64>; 3],
    z: &[f64; 3],
    uv: &[Vector2<f64>; 3],
    shade: &[f64; 3],
    tex: &TexView<'_>,
    z_buffer: &mut [f64],
    image: &mut [f64],
    height: usize,
    width: usize,
    channels: usize,
) {
    let st = triangle_stencil(v);
    let weight_rows = rows3(&st.xy1_to_bary);

    let uv_attrs: [[f64; 2]; 3] = [[uv[0].x, uv[0].y], [uv[1].x, uv[1].y], [uv[2].x, uv[2].y]];
    let uv_refs: [&[f64]; 3] = [&uv_attrs[0], &uv_attrs[1], &uv_attrs[2]];
    let mut uv_rows = [Vector3::zeros(); 2];
    attr_rows(&mut uv_rows, &uv_refs, &weight_rows);
    let l_row = scalar_row(shade, &weight_rows);
    let z_row = scalar_row(z, &weight_rows);

    let mut sample = vec![0.0; channels];

    for half in &st.halves {
        let y_begin = half.y_begin.max(0);
        let y_end = half.y_end.min(height as i64 - 1);
        let left = st.edge_eq[half.left];
        let right = st.edge_eq[half.right];

        for y in y_begin..=y_end {
            let yf = y as f64;
            let uv0y = [row_start(&uv_rows[0], yf), row_start(&uv_rows[1], yf)];
            let l0y = row_start(&l_row, yf);
            let z0y = row_start(&z_row, yf);
            let (x_begin, x_end) = half_x_range(left, right, yf, width);

            for x in x_begin..=x_end {
                let idx = y as usize * width + x as usize;
                let xf = x as f64;
                let zv = z0y + z_row.x * xf;
                if zv < z_buffer[idx] {
                    z_buffer[idx] = zv;
                    let l = l0y + l_row.x * xf;
                    let p = Vector2::new(uv0y[0] + uv_rows[0].x * xf, uv0y[1] + uv_rows[1].x * xf);
                    tex.sample(p, &mut sample);
                    let px = &mut image[channels * idx..channels * (idx + 1)];
                    for c in 0..channels {
                        px[c] = sample[c] * l;
                    }
                }
            }
        }
    }
}
