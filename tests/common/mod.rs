//! Scene builders shared by the integration tests.

#![allow(dead_code)]

use nalgebra::Vector2;
use softrast::{render_forward, Scene};

/// Scenario S1: one flat red triangle on a black 8x8 background.
/// Vertices (1,1), (6,1), (1,6) at depth 1, counter-clockwise winding.
pub fn red_triangle_scene() -> Scene {
    Scene {
        faces: vec![[0, 1, 2]],
        faces_uv: vec![[0, 0, 0]],
        ij: vec![
            Vector2::new(1.0, 1.0),
            Vector2::new(6.0, 1.0),
            Vector2::new(1.0, 6.0),
        ],
        depths: vec![1.0; 3],
        shade: vec![1.0; 3],
        colors: vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        uv: vec![Vector2::new(1.0, 1.0)],
        edgeflags: vec![[false; 3]],
        textured: vec![false],
        shaded: vec![false],
        texture: vec![],
        texture_height: 0,
        texture_width: 0,
        background: vec![0.0; 8 * 8 * 3],
        height: 8,
        width: 8,
        nb_colors: 3,
        clockwise: false,
        backface_culling: true,
    }
}

/// Scenario S4: one red triangle on a white 16x16 background with every
/// edge flagged as a silhouette. Vertices sit off the pixel lattice so no
/// band row degenerates onto the T = 0 or T = 1 boundary.
pub fn soft_triangle_scene() -> Scene {
    Scene {
        faces: vec![[0, 1, 2]],
        faces_uv: vec![[0, 0, 0]],
        ij: vec![
            Vector2::new(2.5, 2.5),
            Vector2::new(12.5, 2.5),
            Vector2::new(2.5, 12.5),
        ],
        depths: vec![1.0; 3],
        shade: vec![1.0; 3],
        colors: vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        uv: vec![Vector2::new(1.0, 1.0)],
        edgeflags: vec![[true; 3]],
        textured: vec![false],
        shaded: vec![false],
        texture: vec![],
        texture_height: 0,
        texture_width: 0,
        background: vec![1.0; 16 * 16 * 3],
        height: 16,
        width: 16,
        nb_colors: 3,
        clockwise: false,
        backface_culling: true,
    }
}

/// Two overlapping triangles with well-separated depths, every edge
/// flagged, generic off-lattice coordinates. Channel count 2.
pub fn two_triangle_scene() -> Scene {
    Scene {
        faces: vec![[0, 1, 2], [3, 4, 5]],
        faces_uv: vec![[0, 0, 0], [0, 0, 0]],
        ij: vec![
            // Far triangle.
            Vector2::new(1.3, 1.6),
            Vector2::new(10.4, 2.1),
            Vector2::new(2.2, 10.8),
            // Near triangle, shifted to overlap the far one's interior.
            Vector2::new(4.6, 3.4),
            Vector2::new(11.2, 5.3),
            Vector2::new(5.1, 11.2),
        ],
        depths: vec![2.0, 2.0, 2.0, 1.0, 1.0, 1.0],
        shade: vec![1.0; 6],
        colors: vec![
            0.9, 0.2, 0.7, 0.4, 0.8, 0.1, // far triangle
            0.2, 0.9, 0.3, 0.6, 0.1, 0.8, // near triangle
        ],
        uv: vec![Vector2::new(1.0, 1.0)],
        edgeflags: vec![[true; 3]; 2],
        textured: vec![false; 2],
        shaded: vec![false; 2],
        texture: vec![],
        texture_height: 0,
        texture_width: 0,
        background: vec![0.5; 12 * 12 * 2],
        height: 12,
        width: 12,
        nb_colors: 2,
        clockwise: false,
        backface_culling: true,
    }
}

/// One textured, Gouraud-shaded triangle over a 4x4 two-channel texture,
/// uv comfortably inside the texture, every edge flagged.
pub fn textured_scene() -> Scene {
    let (tw, th, c) = (4, 4, 2);
    let mut texture = vec![0.0; tw * th * c];
    for v in 0..th {
        for u in 0..tw {
            let base = c * (u + tw * v);
            texture[base] = 0.1 + 0.2 * u as f64 + 0.05 * (v * v) as f64;
            texture[base + 1] = 0.9 - 0.1 * (u as f64) * (v as f64);
        }
    }
    Scene {
        faces: vec![[0, 1, 2]],
        faces_uv: vec![[0, 1, 2]],
        ij: vec![
            Vector2::new(2.3, 2.6),
            Vector2::new(11.4, 3.1),
            Vector2::new(3.2, 11.8),
        ],
        depths: vec![1.0; 3],
        shade: vec![0.8, 1.1, 0.95],
        colors: vec![0.0; 3 * c],
        // One-based: zero-based samples span roughly [0.2, 2.4].
        uv: vec![
            Vector2::new(1.2, 1.3),
            Vector2::new(3.4, 1.5),
            Vector2::new(1.4, 3.2),
        ],
        edgeflags: vec![[true; 3]],
        textured: vec![true],
        shaded: vec![true],
        texture,
        texture_height: th,
        texture_width: tw,
        background: vec![0.3; 12 * 12 * 2],
        height: 12,
        width: 12,
        nb_colors: c,
        clockwise: false,
        backface_culling: true,
    }
}

/// Run the forward pass in color mode, returning fresh buffers.
pub fn render(scene: &Scene, sigma: f64) -> (Vec<f64>, Vec<f64>) {
    let npix = scene.height * scene.width;
    let mut image = vec![0.0; npix * scene.nb_colors];
    let mut z_buffer = vec![0.0; npix];
    render_forward(scene, &mut image, &mut z_buffer, sigma, false, None, None)
        .expect("forward pass failed");
    (image, z_buffer)
}
