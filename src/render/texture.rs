//! Clamped bilinear texture sampling.

use nalgebra::Vector2;

/// Borrowed view of a row-major `height × width × channels` texture.
#[derive(Clone, Copy, Debug)]
pub struct TexView<'a> {
    pub data: &'a [f64],
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

/// Integer taps and fractional weights of a bilinear sample.
///
/// The upper-left tap is clamped to `[0, size − 2]` on each axis so the
/// `+1` taps always stay inside the texture; when a point is clamped its
/// fractional weight snaps to the nearest texel and the `clamped_*` flag
/// records that the sample no longer moves with the point on that axis.
pub(crate) struct Taps {
    pub u0: usize,
    pub v0: usize,
    pub eu: f64,
    pub ev: f64,
    pub clamped_u: bool,
    pub clamped_v: bool,
}

pub(crate) fn taps(p: Vector2<f64>, width: usize, height: usize) -> Taps {
    let clamp_axis = |coord: f64, size: usize| -> (usize, f64, bool) {
        let mut cell = coord.floor() as i64;
        let mut frac = coord - cell as f64;
        let mut clamped = false;
        if cell < 0 {
            cell = 0;
            frac = 0.0;
            clamped = true;
        }
        if cell > size as i64 - 2 {
            cell = size as i64 - 2;
            frac = 1.0;
            clamped = true;
        }
        (cell as usize, frac, clamped)
    };

    let (u0, eu, clamped_u) = clamp_axis(p.x, width);
    let (v0, ev, clamped_v) = clamp_axis(p.y, height);
    Taps {
        u0,
        v0,
        eu,
        ev,
        clamped_u,
        clamped_v,
    }
}

impl<'a> TexView<'a> {
    /// Offset of the first channel of texel `(u, v)`.
    #[inline]
    pub(crate) fn base(&self, u: usize, v: usize) -> usize {
        self.channels * (u + self.width * v)
    }

    /// Sample every channel at a real-valued point, clamping to the
    /// texture border. `p.x` runs along the width, `p.y` along the height.
    pub fn sample(&self, p: Vector2<f64>, out: &mut [f64]) {
        let t = taps(p, self.width, self.height);
        let i00 = self.base(t.u0, t.v0);
        let i10 = self.base(t.u0 + 1, t.v0);
        let i01 = self.base(t.u0, t.v0 + 1);
        let i11 = self.base(t.u0 + 1, t.v0 + 1);

        for c in 0..self.channels {
            out[c] = ((1.0 - t.eu) * self.data[i00 + c] + t.eu * self.data[i10 + c])
                * (1.0 - t.ev)
                + ((1.0 - t.eu) * self.data[i01 + c] + t.eu * self.data[i11 + c]) * t.ev;
        }
    }
}
