//! Reverse scene driver.
//!
//! Walks the forward driver's work in strict reverse: edges in reverse
//! painter order with edge index reversed, then interiors in reverse index
//! order. The edge reverse relies on that mirror — every un-compositing
//! step reconstructs the image (or error buffer) state its forward twin
//! started from.
//!
//! In error mode the interior seed does not come from the caller: after
//! the edge reverse completes, the driver synthesizes
//! `image_b = -2 (obs - image) * err_b` and runs the interior reverse with
//! that.

use log::debug;
use nalgebra::Vector2;

use crate::core::{RenderError, Scene, SceneGrads};
use crate::diff::edge_grad::{
    rasterize_edge_interpolated_error_grad, rasterize_edge_interpolated_grad,
    rasterize_edge_textured_error_grad, rasterize_edge_textured_grad,
};
use crate::diff::triangle_grad::{
    rasterize_triangle_interpolated_grad, rasterize_triangle_textured_grad,
};
use crate::render::{prepare, TexView, uv_one, EDGE_VERTICES};

/// Accumulate gradients of every differentiable scene input into `grads`,
/// seeded by `image_b` (color mode) or `err_buffer_b` (error mode).
///
/// `image` and `z_buffer` must hold the forward pass's outputs for the
/// same scene and sigma. In color mode `image` is restored to its
/// pre-edge-overdraw state and `image_b` is consumed; in error mode the
/// same applies to `err_buffer`/`err_buffer_b` and `image_b` is unused.
#[allow(clippy::too_many_arguments)]
pub fn render_backward(
    scene: &Scene,
    grads: &mut SceneGrads,
    image: &mut [f64],
    z_buffer: &[f64],
    image_b: &mut [f64],
    sigma: f64,
    antialiase_error: bool,
    obs: Option<&[f64]>,
    mut err_buffer: Option<&mut [f64]>,
    mut err_buffer_b: Option<&mut [f64]>,
) -> Result<(), RenderError> {
    scene.validate()?;
    scene.validate_grads(grads)?;

    let npix = scene.height * scene.width;
    let nb = scene.nb_colors;
    if image.len() != npix * nb {
        return Err(RenderError::MissingBuffer("image"));
    }
    if z_buffer.len() != npix {
        return Err(RenderError::MissingBuffer("z_buffer"));
    }
    let obs = if antialiase_error {
        let obs = obs.ok_or(RenderError::MissingBuffer("obs"))?;
        if obs.len() != npix * nb {
            return Err(RenderError::MissingBuffer("obs"));
        }
        match err_buffer.as_deref() {
            Some(err) if err.len() == npix => {}
            _ => return Err(RenderError::MissingBuffer("err_buffer")),
        }
        match err_buffer_b.as_deref() {
            Some(err_b) if err_b.len() == npix => {}
            _ => return Err(RenderError::MissingAdjoint("err_buffer_b")),
        }
        Some(obs)
    } else {
        if image_b.len() != npix * nb {
            return Err(RenderError::MissingAdjoint("image_b"));
        }
        None
    };

    debug!(
        "backward: {} triangles, sigma {}, error mode {}",
        scene.nb_triangles(),
        sigma,
        antialiase_error
    );

    let prep = prepare(scene);
    let tex = TexView {
        data: &scene.texture,
        width: scene.texture_width,
        height: scene.texture_height,
        channels: nb,
    };

    let mut colors_b_local = vec![0.0; 3 * nb];

    // Edge reverse pass: strict mirror of the forward painter order.
    if sigma > 0.0 {
        for &t in prep.order.iter().rev() {
            if prep.signed_area[t] <= 0.0 {
                continue;
            }
            let face = scene.face(t);
            for n in (0..3).rev() {
                if !scene.edgeflags[t][n] {
                    continue;
                }
                let sub = EDGE_VERTICES[n];
                let vi = [face[sub[0]], face[sub[1]]];
                let v = [scene.ij[vi[0]], scene.ij[vi[1]]];
                let z = [scene.depths[vi[0]], scene.depths[vi[1]]];
                let mut v_b = [Vector2::zeros(); 2];

                if scene.uses_texture(t) {
                    let fuv = scene.face_uv(t);
                    let ui = [fuv[sub[0]], fuv[sub[1]]];
                    let uv = [scene.uv[ui[0]] - uv_one(), scene.uv[ui[1]] - uv_one()];
                    let shade = [scene.shade[vi[0]], scene.shade[vi[1]]];
                    let mut uv_b = [Vector2::zeros(); 2];
                    let mut shade_b = [0.0; 2];

                    if let Some(obs) = obs {
                        rasterize_edge_textured_error_grad(
                            &v,
                            &z,
                            &uv,
                            &shade,
                            &tex,
                            z_buffer,
                            obs,
                            err_buffer.as_deref_mut().expect("validated above"),
                            err_buffer_b.as_deref_mut().expect("validated above"),
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                            &mut v_b,
                            &mut uv_b,
                            &mut shade_b,
                            &mut grads.texture,
                        );
                    } else {
                        rasterize_edge_textured_grad(
                            &v,
                            &z,
                            &uv,
                            &shade,
                            &tex,
                            z_buffer,
                            image,
                            image_b,
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                            &mut v_b,
                            &mut uv_b,
                            &mut shade_b,
                            &mut grads.texture,
                        );
                    }

                    for i in 0..2 {
                        grads.uv[ui[i]] += uv_b[i];
                        grads.shade[vi[i]] += shade_b[i];
                    }
                } else {
                    let colors = [scene.color(vi[0]), scene.color(vi[1])];
                    colors_b_local[..2 * nb].fill(0.0);

                    if let Some(obs) = obs {
                        rasterize_edge_interpolated_error_grad(
                            &v,
                            &z,
                            &colors,
                            z_buffer,
                            obs,
                            err_buffer.as_deref_mut().expect("validated above"),
                            err_buffer_b.as_deref_mut().expect("validated above"),
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                            &mut v_b,
                            &mut colors_b_local[..2 * nb],
                        );
                    } else {
                        rasterize_edge_interpolated_grad(
                            &v,
                            &z,
                            &colors,
                            z_buffer,
                            image,
                            image_b,
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                            &mut v_b,
                            &mut colors_b_local[..2 * nb],
                        );
                    }

                    for i in 0..2 {
                        for c in 0..nb {
                            grads.colors[vi[i] * nb + c] += colors_b_local[i * nb + c];
                        }
                    }
                }

                for i in 0..2 {
                    grads.ij[vi[i]] += v_b[i];
                }
            }
        }
    }

    // Error mode: the interior seed is implied by the error seed.
    let mut seed_storage;
    let seed: &mut [f64] = if let Some(obs) = obs {
        let err_b = err_buffer_b.as_deref().expect("validated above");
        seed_storage = vec![0.0; npix * nb];
        for k in 0..npix {
            for c in 0..nb {
                seed_storage[nb * k + c] =
                    -2.0 * (obs[nb * k + c] - image[nb * k + c]) * err_b[k];
            }
        }
        &mut seed_storage
    } else {
        image_b
    };

    // Interior reverse pass: reverse index order, same culling gate as the
    // forward interior pass.
    for t in (0..scene.nb_triangles()).rev() {
        if prep.signed_area[t] <= 0.0 && scene.backface_culling {
            continue;
        }
        let face = scene.face(t);
        let v = [scene.ij[face[0]], scene.ij[face[1]], scene.ij[face[2]]];
        let z = [
            scene.depths[face[0]],
            scene.depths[face[1]],
            scene.depths[face[2]],
        ];
        let mut v_b = [Vector2::zeros(); 3];

        if scene.uses_texture(t) {
            let fuv = scene.face_uv(t);
            let uv = [
                scene.uv[fuv[0]] - uv_one(),
                scene.uv[fuv[1]] - uv_one(),
                scene.uv[fuv[2]] - uv_one(),
            ];
            let shade = [
                scene.shade[face[0]],
                scene.shade[face[1]],
                scene.shade[face[2]],
            ];
            let mut uv_b = [Vector2::zeros(); 3];
            let mut shade_b = [0.0; 3];
            rasterize_triangle_textured_grad(
                &v,
                &z,
                &uv,
                &shade,
                &tex,
                z_buffer,
                seed,
                scene.height,
                scene.width,
                nb,
                &mut v_b,
                &mut uv_b,
                &mut shade_b,
                &mut grads.texture,
            );
            for i in 0..3 {
                grads.uv[fuv[i]] += uv_b[i];
                grads.shade[face[i]] += shade_b[i];
            }
        } else {
            let colors = [
                scene.color(face[0]),
                scene.color(face[1]),
                scene.color(face[2]),
            ];
            colors_b_local.fill(0.0);
            rasterize_triangle_interpolated_grad(
                &v,
                &z,
                &colors,
                z_buffer,
                seed,
                scene.height,
                scene.width,
                nb,
                &mut v_b,
                &mut colors_b_local,
            );
            for i in 0..3 {
                for c in 0..nb {
                    grads.colors[face[i] * nb + c] += colors_b_local[i * nb + c];
                }
            }
        }

        for i in 0..3 {
            grads.ij[face[i]] += v_b[i];
        }
    }

    Ok(())
}
