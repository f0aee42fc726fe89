//! # softrast: a CPU differentiable soft rasterizer
//!
//! This crate renders triangle meshes whose vertices carry 2D image
//! coordinates, depths, shade values, and either per-vertex colors or
//! texture coordinates — and computes the reverse-mode gradient of the
//! rendered image with respect to every one of those inputs. The gradient is
//! what makes inverse graphics work: fitting mesh parameters to observed
//! images by gradient descent.
//!
//! ## Architecture
//!
//! - `core`: scene data model, validation, small linear algebra
//! - `render`: forward passes (interior rasterization, soft silhouette
//!   edges, bilinear texture sampling, scene driver)
//! - `diff`: reverse-mode companion of every forward operation
//! - `optim`: image-space loss used to seed the reverse pass
//! - `io`: debug conversion between channel buffers and 8-bit images
//!
//! ## Rendering model
//!
//! The forward pass is a painter-style renderer: triangle interiors are
//! depth-buffered with a hard per-pixel test, then silhouette edges are
//! overdrawn back-to-front with a transparency field that falls off linearly
//! over a band of width sigma. Because the overdraw compositing law is
//! invertible, the reverse pass can peel edges off in exact reverse order,
//! restore the image state each edge saw, and accumulate gradients into the
//! adjoint arrays of [`SceneGrads`].

// Scene data model and small math
pub mod core;

// Forward rendering pipeline
pub mod render;

// Differentiable operations (backward passes)
pub mod diff;

// Loss helpers for optimization loops
pub mod optim;

// Debug image conversion
pub mod io;

// Re-export commonly used items at the crate root
pub use crate::core::{RenderError, Scene, SceneGrads};
pub use crate::diff::render_backward;
pub use crate::render::render_forward;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
