//! Adjoint of the clamped bilinear texture sampler.

use nalgebra::Vector2;

use crate::render::{taps, TexView};

/// Backward pass of [`TexView::sample`]: given the adjoint of the sampled
/// channels, accumulate into the four texel taps and into the sample
/// point.
///
/// On an axis where the point was clamped outside the texture the sample
/// no longer moves with the point, so the point adjoint on that axis is
/// dropped — exactly mirroring the forward clamp.
pub fn sample_grad(
    tex: &TexView<'_>,
    p: Vector2<f64>,
    out_b: &[f64],
    texture_b: &mut [f64],
    p_b: &mut Vector2<f64>,
) {
    let t = taps(p, tex.width, tex.height);
    let i00 = tex.base(t.u0, t.v0);
    let i10 = tex.base(t.u0 + 1, t.v0);
    let i01 = tex.base(t.u0, t.v0 + 1);
    let i11 = tex.base(t.u0 + 1, t.v0 + 1);

    let mut eu_b = 0.0;
    let mut ev_b = 0.0;

    for c in 0..tex.channels {
        let top = (1.0 - t.eu) * tex.data[i00 + c] + t.eu * tex.data[i10 + c];
        let bottom = (1.0 - t.eu) * tex.data[i01 + c] + t.eu * tex.data[i11 + c];

        ev_b += out_b[c] * (bottom - top);
        let top_b = out_b[c] * (1.0 - t.ev);
        let bottom_b = out_b[c] * t.ev;
        eu_b += top_b * (tex.data[i10 + c] - tex.data[i00 + c]);
        eu_b += bottom_b * (tex.data[i11 + c] - tex.data[i01 + c]);

        texture_b[i00 + c] += (1.0 - t.eu) * (1.0 - t.ev) * out_b[c];
        texture_b[i10 + c] += t.eu * (1.0 - t.ev) * out_b[c];
        texture_b[i01 + c] += (1.0 - t.eu) * t.ev * out_b[c];
        texture_b[i11 + c] += t.eu * t.ev * out_b[c];
    }

    if !t.clamped_u {
        p_b.x += eu_b;
    }
    if !t.clamped_v {
        p_b.y += ev_b;
    }
}
