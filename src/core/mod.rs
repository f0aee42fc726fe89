//! Core data structures and mathematical operations.
//!
//! This module contains the types shared by the forward and reverse passes:
//! - `Scene`: flat-array mesh description with rendering flags
//! - `SceneGrads`: the adjoint mirror of every differentiable scene array
//! - `RenderError`: fatal validation failures
//! - Small linear algebra: the 3×3 inverse and affine scan-row helpers
//!
//! All types here are "pure data" — no rasterization logic.

pub mod linalg;
mod scene;

pub use scene::{signed_area, RenderError, Scene, SceneGrads};
