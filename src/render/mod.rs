//! Forward rendering pipeline.
//!
//! The forward pass runs in two phases:
//! - interior rasterization: scanline fill with a hard per-pixel depth
//!   test, either interpolating per-vertex colors or sampling a texture
//!   modulated by a Gouraud shade;
//! - edge overdraw: silhouette edges are redrawn back-to-front with a
//!   transparency that falls off linearly over a band of width sigma.
//!
//! No gradients are computed here — see the `diff` module for the reverse
//! companions of every routine.

mod edge;
mod forward;
mod texture;
mod triangle;

pub use edge::{
    rasterize_edge_interpolated, rasterize_edge_interpolated_error, rasterize_edge_textured,
    rasterize_edge_textured_error,
};
pub use forward::render_forward;
pub use texture::TexView;
pub use triangle::{rasterize_triangle_interpolated, rasterize_triangle_textured};

pub(crate) use edge::{edge_normal, edge_stencil, x_range};
pub(crate) use texture::taps;
pub(crate) use triangle::{half_x_range, triangle_stencil};

use crate::core::{signed_area, Scene};

/// Vertex order of the sub-edge rasterized for edge `n` of a triangle.
pub(crate) const EDGE_VERTICES: [[usize; 2]; 3] = [[1, 0], [2, 1], [0, 2]];

/// Shift applied to gathered texture coordinates: `uv` is one-based on
/// input, the samplers index from zero.
#[inline]
pub(crate) fn uv_one() -> nalgebra::Vector2<f64> {
    nalgebra::Vector2::new(1.0, 1.0)
}

/// Floor to `i64` with the saturating semantics of `as`. Infinite or NaN
/// coefficients from degenerate stencils become extreme bounds, so the
/// scan ranges they produce are empty instead of overflowing.
#[inline]
pub(crate) fn floor_i(v: f64) -> i64 {
    v.floor() as i64
}

/// Per-triangle quantities the drivers share: the painter order for the
/// edge pass and the signed area gating both passes.
pub(crate) struct ScenePrep {
    /// Triangle indices by descending depth sum, stable by index on ties.
    pub order: Vec<usize>,
    /// Signed area per triangle; forced to zero when any vertex has a
    /// negative depth so behind-camera triangles are culled everywhere.
    pub signed_area: Vec<f64>,
}

pub(crate) fn prepare(scene: &Scene) -> ScenePrep {
    let nb = scene.nb_triangles();
    let mut sum_depth = vec![0.0; nb];
    let mut area = vec![0.0; nb];

    for t in 0..nb {
        let face = scene.face(t);
        let mut all_front = true;
        let mut sum = 0.0;
        for &v in &face {
            if scene.depths[v] < 0.0 {
                all_front = false;
            }
            sum += scene.depths[v];
        }
        sum_depth[t] = sum;
        if all_front {
            let ij = [scene.ij[face[0]], scene.ij[face[1]], scene.ij[face[2]]];
            area[t] = signed_area(&ij, scene.clockwise);
        }
    }

    let mut order: Vec<usize> = (0..nb).collect();
    order.sort_by(|&a, &b| {
        sum_depth[b]
            .partial_cmp(&sum_depth[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    ScenePrep {
        order,
        signed_area: area,
    }
}
