//! Gradient checking: analytical adjoints against centered finite
//! differences, for every differentiable input, in color and error mode.
//!
//! Bugs in backward passes fail silently during optimization, so these
//! tests are the load-bearing ones. Each check perturbs one scalar input
//! by ±h, re-renders, and compares the loss difference quotient with the
//! adjoint accumulated by the reverse pass. Vertex coordinates in the
//! fixture scenes sit away from the pixel lattice so no perturbation
//! flips a pixel in or out of coverage.

mod common;

use common::{render, soft_triangle_scene, textured_scene, two_triangle_scene};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use softrast::optim::l2_image_loss_and_grad;
use softrast::{render_backward, render_forward, Scene, SceneGrads};

fn rel_err(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs()).max(1e-6);
    (a - b).abs() / denom
}

fn assert_close(ana: f64, num: f64, what: &str) {
    let ok = rel_err(ana, num) < 1e-3 || (ana - num).abs() < 1e-6;
    assert!(ok, "{what}: analytical {ana} vs numerical {num}");
}

/// Weighted-sum loss of the color render: `L = Σ w · image`.
fn color_loss(scene: &Scene, sigma: f64, w: &[f64]) -> f64 {
    let (image, _) = render(scene, sigma);
    image.iter().zip(w).map(|(p, wi)| p * wi).sum()
}

/// Run the reverse pass seeded with `w` and return the gradients.
fn color_grads(scene: &Scene, sigma: f64, w: &[f64]) -> SceneGrads {
    let (mut image, z_buffer) = render(scene, sigma);
    let mut grads = SceneGrads::zeros_like(scene);
    let mut image_b = w.to_vec();
    render_backward(
        scene, &mut grads, &mut image, &z_buffer, &mut image_b, sigma, false, None, None, None,
    )
    .expect("backward pass failed");
    grads
}

fn random_weights(len: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

fn check_ij(scene: &Scene, sigma: f64, w: &[f64], grads: &SceneGrads, h: f64) {
    for vtx in 0..scene.ij.len() {
        for axis in 0..2 {
            let mut plus = scene.clone();
            let mut minus = scene.clone();
            if axis == 0 {
                plus.ij[vtx].x += h;
                minus.ij[vtx].x -= h;
            } else {
                plus.ij[vtx].y += h;
                minus.ij[vtx].y -= h;
            }
            let num = (color_loss(&plus, sigma, w) - color_loss(&minus, sigma, w)) / (2.0 * h);
            let ana = if axis == 0 { grads.ij[vtx].x } else { grads.ij[vtx].y };
            assert_close(ana, num, &format!("ij[{vtx}].{axis}"));
        }
    }
}

#[test]
fn test_color_and_ij_gradients_interpolated() {
    let scene = two_triangle_scene();
    let sigma = 1.5;
    let w = random_weights(scene.height * scene.width * scene.nb_colors, 0x5EED_0001);
    let grads = color_grads(&scene, sigma, &w);

    check_ij(&scene, sigma, &w, &grads, 1e-5);

    for i in 0..scene.colors.len() {
        let h = 1e-5;
        let mut plus = scene.clone();
        let mut minus = scene.clone();
        plus.colors[i] += h;
        minus.colors[i] -= h;
        let num = (color_loss(&plus, sigma, &w) - color_loss(&minus, sigma, &w)) / (2.0 * h);
        assert_close(grads.colors[i], num, &format!("colors[{i}]"));
    }
}

#[test]
fn test_uv_shade_texture_gradients_textured() {
    let scene = textured_scene();
    let sigma = 1.5;
    let w = random_weights(scene.height * scene.width * scene.nb_colors, 0x5EED_0002);
    let grads = color_grads(&scene, sigma, &w);

    check_ij(&scene, sigma, &w, &grads, 1e-5);

    for vtx in 0..scene.uv.len() {
        for axis in 0..2 {
            let h = 1e-6;
            let mut plus = scene.clone();
            let mut minus = scene.clone();
            if axis == 0 {
                plus.uv[vtx].x += h;
                minus.uv[vtx].x -= h;
            } else {
                plus.uv[vtx].y += h;
                minus.uv[vtx].y -= h;
            }
            let num = (color_loss(&plus, sigma, &w) - color_loss(&minus, sigma, &w)) / (2.0 * h);
            let ana = if axis == 0 { grads.uv[vtx].x } else { grads.uv[vtx].y };
            assert_close(ana, num, &format!("uv[{vtx}].{axis}"));
        }
    }

    for i in 0..scene.shade.len() {
        let h = 1e-6;
        let mut plus = scene.clone();
        let mut minus = scene.clone();
        plus.shade[i] += h;
        minus.shade[i] -= h;
        let num = (color_loss(&plus, sigma, &w) - color_loss(&minus, sigma, &w)) / (2.0 * h);
        assert_close(grads.shade[i], num, &format!("shade[{i}]"));
    }

    for i in 0..scene.texture.len() {
        let h = 1e-6;
        let mut plus = scene.clone();
        let mut minus = scene.clone();
        plus.texture[i] += h;
        minus.texture[i] -= h;
        let num = (color_loss(&plus, sigma, &w) - color_loss(&minus, sigma, &w)) / (2.0 * h);
        assert_close(grads.texture[i], num, &format!("texture[{i}]"));
    }
}

#[test]
fn test_squared_loss_ij_gradient_round_trip() {
    // Loss = Σ image² against a black target, seeded by its gradient.
    let scene = soft_triangle_scene();
    let sigma = 2.0;

    let (mut image, z_buffer) = render(&scene, sigma);
    let target = vec![0.0; image.len()];
    let (_, mut image_b) = l2_image_loss_and_grad(&image, &target);
    let mut grads = SceneGrads::zeros_like(&scene);
    render_backward(
        &scene, &mut grads, &mut image, &z_buffer, &mut image_b, sigma, false, None, None, None,
    )
    .expect("backward pass failed");

    let squared_loss = |s: &Scene| -> f64 {
        let (img, _) = render(s, sigma);
        l2_image_loss_and_grad(&img, &target).0
    };

    let h = 1e-5;
    for vtx in 0..3 {
        for axis in 0..2 {
            let mut plus = scene.clone();
            let mut minus = scene.clone();
            if axis == 0 {
                plus.ij[vtx].x += h;
                minus.ij[vtx].x -= h;
            } else {
                plus.ij[vtx].y += h;
                minus.ij[vtx].y -= h;
            }
            let num = (squared_loss(&plus) - squared_loss(&minus)) / (2.0 * h);
            let ana = if axis == 0 { grads.ij[vtx].x } else { grads.ij[vtx].y };
            assert!(
                (ana - num).abs() < 1e-4 * ana.abs().max(1.0),
                "ij[{vtx}].{axis}: analytical {ana} vs numerical {num}"
            );
        }
    }
}

#[test]
fn test_reverse_pass_is_additive_in_the_seed() {
    let scene = two_triangle_scene();
    let sigma = 1.5;
    let npix = scene.height * scene.width * scene.nb_colors;
    let w = random_weights(npix, 0x5EED_0003);

    let (image_post, z_buffer) = render(&scene, sigma);

    let run = |grads: &mut SceneGrads, seed: &[f64]| {
        let mut image = image_post.clone();
        let mut image_b = seed.to_vec();
        render_backward(
            &scene, grads, &mut image, &z_buffer, &mut image_b, sigma, false, None, None, None,
        )
        .expect("backward pass failed");
    };

    let mut twice = SceneGrads::zeros_like(&scene);
    run(&mut twice, &w);
    run(&mut twice, &w);

    let mut once_doubled = SceneGrads::zeros_like(&scene);
    let w2: Vec<f64> = w.iter().map(|x| 2.0 * x).collect();
    run(&mut once_doubled, &w2);

    for (a, b) in twice.ij.iter().zip(&once_doubled.ij) {
        assert!(rel_err(a.x, b.x) < 1e-9 || (a.x - b.x).abs() < 1e-12);
        assert!(rel_err(a.y, b.y) < 1e-9 || (a.y - b.y).abs() < 1e-12);
    }
    for (a, b) in twice.colors.iter().zip(&once_doubled.colors) {
        assert!(rel_err(*a, *b) < 1e-9 || (a - b).abs() < 1e-12);
    }
}

#[test]
fn test_error_mode_gradients_match_finite_differences() {
    let scene = two_triangle_scene();
    let sigma = 1.5;
    let npix = scene.height * scene.width;
    let nb = scene.nb_colors;
    let obs = random_weights(npix * nb, 0x5EED_0004)
        .iter()
        .map(|x| 0.5 + 0.4 * x)
        .collect::<Vec<f64>>();
    let w = random_weights(npix, 0x5EED_0005);

    let error_loss = |s: &Scene| -> f64 {
        let mut image = vec![0.0; npix * nb];
        let mut z_buffer = vec![0.0; npix];
        let mut err = vec![0.0; npix];
        render_forward(s, &mut image, &mut z_buffer, sigma, true, Some(&obs), Some(&mut err))
            .expect("forward error mode failed");
        err.iter().zip(&w).map(|(e, wi)| e * wi).sum()
    };

    let mut image = vec![0.0; npix * nb];
    let mut z_buffer = vec![0.0; npix];
    let mut err = vec![0.0; npix];
    render_forward(
        &scene, &mut image, &mut z_buffer, sigma, true, Some(&obs), Some(&mut err),
    )
    .expect("forward error mode failed");

    let mut grads = SceneGrads::zeros_like(&scene);
    let mut err_b = w.clone();
    let mut image_b = vec![];
    render_backward(
        &scene,
        &mut grads,
        &mut image,
        &z_buffer,
        &mut image_b,
        sigma,
        true,
        Some(&obs),
        Some(&mut err),
        Some(&mut err_b),
    )
    .expect("backward error mode failed");

    let h = 1e-5;
    for vtx in 0..scene.ij.len() {
        for axis in 0..2 {
            let mut plus = scene.clone();
            let mut minus = scene.clone();
            if axis == 0 {
                plus.ij[vtx].x += h;
                minus.ij[vtx].x -= h;
            } else {
                plus.ij[vtx].y += h;
                minus.ij[vtx].y -= h;
            }
            let num = (error_loss(&plus) - error_loss(&minus)) / (2.0 * h);
            let ana = if axis == 0 { grads.ij[vtx].x } else { grads.ij[vtx].y };
            assert_close(ana, num, &format!("error-mode ij[{vtx}].{axis}"));
        }
    }

    for i in 0..scene.colors.len() {
        let mut plus = scene.clone();
        let mut minus = scene.clone();
        plus.colors[i] += h;
        minus.colors[i] -= h;
        let num = (error_loss(&plus) - error_loss(&minus)) / (2.0 * h);
        assert_close(grads.colors[i], num, &format!("error-mode colors[{i}]"));
    }
}

#[test]
fn test_zero_seed_leaves_error_mode_adjoints_zero() {
    let scene = two_triangle_scene();
    let npix = scene.height * scene.width;
    let nb = scene.nb_colors;
    let obs = vec![0.25; npix * nb];

    let mut image = vec![0.0; npix * nb];
    let mut z_buffer = vec![0.0; npix];
    let mut err = vec![0.0; npix];
    render_forward(
        &scene, &mut image, &mut z_buffer, 1.5, true, Some(&obs), Some(&mut err),
    )
    .expect("forward error mode failed");

    let mut grads = SceneGrads::zeros_like(&scene);
    let mut err_b = vec![0.0; npix];
    let mut image_b = vec![];
    render_backward(
        &scene,
        &mut grads,
        &mut image,
        &z_buffer,
        &mut image_b,
        1.5,
        true,
        Some(&obs),
        Some(&mut err),
        Some(&mut err_b),
    )
    .expect("backward error mode failed");

    assert!(grads.ij.iter().all(|g| g.x == 0.0 && g.y == 0.0));
    assert!(grads.colors.iter().all(|&g| g == 0.0));
    assert!(grads.shade.iter().all(|&g| g == 0.0));
}

#[test]
fn test_adjoints_accumulate_across_calls() {
    // Two reverse calls into the same SceneGrads sum their contributions.
    let scene = two_triangle_scene();
    let sigma = 1.5;
    let npix = scene.height * scene.width * scene.nb_colors;
    let w = random_weights(npix, 0x5EED_0006);

    let (image_post, z_buffer) = render(&scene, sigma);

    let mut grads = SceneGrads::zeros_like(&scene);
    let mut image = image_post.clone();
    let mut image_b = w.clone();
    render_backward(
        &scene, &mut grads, &mut image, &z_buffer, &mut image_b, sigma, false, None, None, None,
    )
    .unwrap();
    let first: Vec<Vector2<f64>> = grads.ij.clone();

    let mut image = image_post.clone();
    let mut image_b = w.clone();
    render_backward(
        &scene, &mut grads, &mut image, &z_buffer, &mut image_b, sigma, false, None, None, None,
    )
    .unwrap();

    for (total, one) in grads.ij.iter().zip(&first) {
        assert!(rel_err(total.x, 2.0 * one.x) < 1e-9 || total.x.abs() < 1e-12);
        assert!(rel_err(total.y, 2.0 * one.y) < 1e-9 || total.y.abs() < 1e-12);
    }
}
