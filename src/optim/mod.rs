//! Loss helpers for inverse-graphics fitting loops.

mod loss;

pub use loss::l2_image_loss_and_grad;
