//! Scene description and adjoint buffers.
//!
//! Geometry lives in flat arrays indexed by integer ids; there are no
//! pointer graphs. The caller owns every array, including the output image
//! and depth buffer, and the reverse pass accumulates (`+=`) into the
//! adjoint arrays of [`SceneGrads`] without ever overwriting them.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal validation failures. The renderer has no recoverable errors and
/// produces no partial results: either the scene is well-formed and the
/// whole pass runs, or nothing is written.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("scene buffer `{0}` is missing or has the wrong length")]
    MissingBuffer(&'static str),

    #[error("adjoint buffer `{0}` is missing or has the wrong length")]
    MissingAdjoint(&'static str),

    #[error("index {value} of triangle {triangle} in `{array}` exceeds bound {bound}")]
    IndexOutOfRange {
        array: &'static str,
        triangle: usize,
        value: u32,
        bound: usize,
    },
}

/// A triangle mesh flattened for rasterization.
///
/// Per-vertex data (`ij`, `depths`, `shade`, `colors`) is indexed through
/// `faces`; texture coordinates have their own index space (`uv` through
/// `faces_uv`) so a vertex can carry different uvs in different triangles.
///
/// `uv` is one-based on input and shifted to zero-based when a triangle is
/// gathered for rasterization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scene {
    /// Vertex indices of each triangle
    pub faces: Vec<[u32; 3]>,
    /// Uv indices of each triangle
    pub faces_uv: Vec<[u32; 3]>,

    /// Image-plane position of each vertex (x = column, y = row)
    pub ij: Vec<Vector2<f64>>,
    /// Depth of each vertex; smaller is closer
    pub depths: Vec<f64>,
    /// Gouraud shade scalar of each vertex
    pub shade: Vec<f64>,
    /// Per-vertex color, `nb_colors` channels per vertex
    pub colors: Vec<f64>,
    /// One-based texture coordinates
    pub uv: Vec<Vector2<f64>>,

    /// Which edges of each triangle are silhouettes to be antialiased
    pub edgeflags: Vec<[bool; 3]>,
    /// Textured triangles sample `texture`; others interpolate `colors`
    pub textured: Vec<bool>,
    /// Whether the texture is modulated by the interpolated shade
    pub shaded: Vec<bool>,

    /// Row-major `texture_height × texture_width × nb_colors` texels
    pub texture: Vec<f64>,
    pub texture_height: usize,
    pub texture_width: usize,

    /// Row-major `height × width × nb_colors` image the color buffer is
    /// initialized from
    pub background: Vec<f64>,
    pub height: usize,
    pub width: usize,
    /// Channel count shared by `colors`, `texture`, `background` and the
    /// output image
    pub nb_colors: usize,

    /// Polarity of the signed-area test and of the outward edge normal
    pub clockwise: bool,
    /// Skip triangles whose signed area is non-positive. Silhouette edges
    /// are culled regardless of this flag.
    pub backface_culling: bool,
}

impl Scene {
    pub fn nb_triangles(&self) -> usize {
        self.faces.len()
    }

    pub fn nb_vertices(&self) -> usize {
        self.ij.len()
    }

    pub fn nb_uv(&self) -> usize {
        self.uv.len()
    }

    /// Vertex indices of triangle `t` as `usize`.
    pub(crate) fn face(&self, t: usize) -> [usize; 3] {
        let f = self.faces[t];
        [f[0] as usize, f[1] as usize, f[2] as usize]
    }

    /// Uv indices of triangle `t` as `usize`.
    pub(crate) fn face_uv(&self, t: usize) -> [usize; 3] {
        let f = self.faces_uv[t];
        [f[0] as usize, f[1] as usize, f[2] as usize]
    }

    /// Color channels of vertex `v`.
    pub(crate) fn color(&self, v: usize) -> &[f64] {
        &self.colors[v * self.nb_colors..(v + 1) * self.nb_colors]
    }

    /// Whether triangle `t` goes through the textured-shaded path.
    /// `textured` without `shaded` falls back to color interpolation so the
    /// interior and edge passes agree on every triangle.
    pub(crate) fn uses_texture(&self, t: usize) -> bool {
        self.textured[t] && self.shaded[t]
    }

    /// Check array shapes and face indices. Every renderer entry point
    /// calls this before touching any buffer.
    pub fn validate(&self) -> Result<(), RenderError> {
        let v = self.nb_vertices();
        let t = self.nb_triangles();
        let c = self.nb_colors;

        if self.faces_uv.len() != t {
            return Err(RenderError::MissingBuffer("faces_uv"));
        }
        if self.depths.len() != v {
            return Err(RenderError::MissingBuffer("depths"));
        }
        if self.shade.len() != v {
            return Err(RenderError::MissingBuffer("shade"));
        }
        if self.colors.len() != v * c {
            return Err(RenderError::MissingBuffer("colors"));
        }
        if self.edgeflags.len() != t {
            return Err(RenderError::MissingBuffer("edgeflags"));
        }
        if self.textured.len() != t {
            return Err(RenderError::MissingBuffer("textured"));
        }
        if self.shaded.len() != t {
            return Err(RenderError::MissingBuffer("shaded"));
        }
        if self.texture.len() != self.texture_height * self.texture_width * c {
            return Err(RenderError::MissingBuffer("texture"));
        }
        if self.background.len() != self.height * self.width * c {
            return Err(RenderError::MissingBuffer("background"));
        }

        // Bilinear sampling clamps the upper-left tap to [0, size - 2], so a
        // texture actually sampled must be at least 2x2.
        let any_textured = (0..t).any(|k| self.uses_texture(k));
        if any_textured && (self.texture_width < 2 || self.texture_height < 2) {
            return Err(RenderError::MissingBuffer("texture"));
        }

        for k in 0..t {
            for i in 0..3 {
                if self.faces[k][i] as usize >= v {
                    return Err(RenderError::IndexOutOfRange {
                        array: "faces",
                        triangle: k,
                        value: self.faces[k][i],
                        bound: v,
                    });
                }
                if self.faces_uv[k][i] as usize >= self.nb_uv() {
                    return Err(RenderError::IndexOutOfRange {
                        array: "faces_uv",
                        triangle: k,
                        value: self.faces_uv[k][i],
                        bound: self.nb_uv(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that every adjoint array mirrors the shape of its primal.
    pub fn validate_grads(&self, grads: &SceneGrads) -> Result<(), RenderError> {
        if grads.ij.len() != self.ij.len() {
            return Err(RenderError::MissingAdjoint("ij_b"));
        }
        if grads.uv.len() != self.uv.len() {
            return Err(RenderError::MissingAdjoint("uv_b"));
        }
        if grads.shade.len() != self.shade.len() {
            return Err(RenderError::MissingAdjoint("shade_b"));
        }
        if grads.colors.len() != self.colors.len() {
            return Err(RenderError::MissingAdjoint("colors_b"));
        }
        if grads.texture.len() != self.texture.len() {
            return Err(RenderError::MissingAdjoint("texture_b"));
        }
        Ok(())
    }
}

/// Adjoint mirror of the differentiable scene arrays.
///
/// The reverse pass only ever adds into these buffers. Call [`reset`] (or
/// zero them yourself) between optimization steps when a fresh gradient is
/// wanted; leaving them untouched accumulates across calls, which is what a
/// multi-view fitting loop needs.
///
/// [`reset`]: SceneGrads::reset
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneGrads {
    pub ij: Vec<Vector2<f64>>,
    pub uv: Vec<Vector2<f64>>,
    pub shade: Vec<f64>,
    pub colors: Vec<f64>,
    pub texture: Vec<f64>,
}

impl SceneGrads {
    /// Zero-filled adjoints matching `scene`'s array shapes.
    pub fn zeros_like(scene: &Scene) -> Self {
        Self {
            ij: vec![Vector2::zeros(); scene.ij.len()],
            uv: vec![Vector2::zeros(); scene.uv.len()],
            shade: vec![0.0; scene.shade.len()],
            colors: vec![0.0; scene.colors.len()],
            texture: vec![0.0; scene.texture.len()],
        }
    }

    /// Zero every adjoint in place, keeping the allocations.
    pub fn reset(&mut self) {
        self.ij.fill(Vector2::zeros());
        self.uv.fill(Vector2::zeros());
        self.shade.fill(0.0);
        self.colors.fill(0.0);
        self.texture.fill(0.0);
    }
}

/// Signed area of a screen-space triangle, with the sign convention chosen
/// by the `clockwise` polarity flag. Front faces have positive area.
pub fn signed_area(ij: &[Vector2<f64>; 3], clockwise: bool) -> f64 {
    let u = ij[1] - ij[0];
    let v = ij[2] - ij[0];
    0.5 * (u.x * v.y - v.x * u.y) * if clockwise { -1.0 } else { 1.0 }
}
