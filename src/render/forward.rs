//! Forward scene driver.
//!
//! Renders interiors first (depth-buffered, so order is irrelevant), then
//! overdraws flagged silhouette edges back-to-front. In error mode the
//! edge pass composites per-pixel squared errors against an observation
//! instead of colors, yielding an antialiased scalar loss whose gradient
//! is well-defined at silhouettes.

use log::debug;

use crate::core::{RenderError, Scene};
use crate::render::{
    prepare, rasterize_edge_interpolated, rasterize_edge_interpolated_error,
    rasterize_edge_textured, rasterize_edge_textured_error, rasterize_triangle_interpolated,
    rasterize_triangle_textured, TexView, uv_one, EDGE_VERTICES,
};

/// Render the scene into `image` and `z_buffer`, both overwritten.
///
/// With `sigma > 0`, silhouette edges flagged in the scene are softened
/// over a band of `sigma` pixels. With `antialiase_error`, `err_buffer`
/// receives the per-pixel squared error against `obs`, antialiased
/// consistently with the color path, and `image` is left as the
/// interior-only render.
#[allow(clippy::too_many_arguments)]
pub fn render_forward(
    scene: &Scene,
    image: &mut [f64],
    z_buffer: &mut [f64],
    sigma: f64,
    antialiase_error: bool,
    obs: Option<&[f64]>,
    mut err_buffer: Option<&mut [f64]>,
) -> Result<(), RenderError> {
    scene.validate()?;

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
        Some(obs)
    } else {
        None
    };

    debug!(
        "forward: {} triangles, {}x{}x{}, sigma {}",
        scene.nb_triangles(),
        scene.height,
        scene.width,
        nb,
        sigma
    );

    image.copy_from_slice(&scene.background);
    z_buffer.fill(f64::INFINITY);

    let prep = prepare(scene);
    let tex = TexView {
        data: &scene.texture,
        width: scene.texture_width,
        height: scene.texture_height,
        channels: nb,
    };

    // Interior pass.
    for t in 0..scene.nb_triangles() {
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
            rasterize_triangle_textured(
                &v,
                &z,
                &uv,
                &shade,
                &tex,
                z_buffer,
                image,
                scene.height,
                scene.width,
                nb,
            );
        } else {
            let colors = [
                scene.color(face[0]),
                scene.color(face[1]),
                scene.color(face[2]),
            ];
            rasterize_triangle_interpolated(
                &v,
                &z,
                &colors,
                z_buffer,
                image,
                scene.height,
                scene.width,
                nb,
            );
        }
    }

    // Error mode starts from the interior-only squared error.
    if let Some(obs) = obs {
        let err = err_buffer.as_deref_mut().expect("validated above");
        for k in 0..npix {
            let mut s = 0.0;
            for c in 0..nb {
                let d = image[nb * k + c] - obs[nb * k + c];
                s += d * d;
            }
            err[k] = s;
        }
    }

    // Edge pass, back-to-front: overdraw does not own depth, so painter
    // order is what makes overlapping silhouettes resolve correctly.
    if sigma > 0.0 {
        for &t in &prep.order {
            if prep.signed_area[t] <= 0.0 {
                continue;
            }
            let face = scene.face(t);
            for n in 0..3 {
                if !scene.edgeflags[t][n] {
                    continue;
                }
                let sub = EDGE_VERTICES[n];
                let vi = [face[sub[0]], face[sub[1]]];
                let v = [scene.ij[vi[0]], scene.ij[vi[1]]];
                let z = [scene.depths[vi[0]], scene.depths[vi[1]]];

                if scene.uses_texture(t) {
                    let fuv = scene.face_uv(t);
                    let uv = [
                        scene.uv[fuv[sub[0]]] - uv_one(),
                        scene.uv[fuv[sub[1]]] - uv_one(),
                    ];
                    let shade = [scene.shade[vi[0]], scene.shade[vi[1]]];
                    if let Some(obs) = obs {
                        rasterize_edge_textured_error(
                            &v,
                            &z,
                            &uv,
                            &shade,
                            &tex,
                            z_buffer,
                            obs,
                            err_buffer.as_deref_mut().expect("validated above"),
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                        );
                    } else {
                        rasterize_edge_textured(
                            &v,
                            &z,
                            &uv,
                            &shade,
                            &tex,
                            z_buffer,
                            image,
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                        );
                    }
                } else {
                    let colors = [scene.color(vi[0]), scene.color(vi[1])];
                    if let Some(obs) = obs {
                        rasterize_edge_interpolated_error(
                            &v,
                            &z,
                            &colors,
                            z_buffer,
                            obs,
                            err_buffer.as_deref_mut().expect("validated above"),
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                        );
                    } else {
                        rasterize_edge_interpolated(
                            &v,
                            &z,
                            &colors,
                            z_buffer,
                            image,
                            scene.height,
                            scene.width,
                            nb,
                            sigma,
                            scene.clockwise,
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
