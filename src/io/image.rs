//! Lossy conversion between the renderer's channel-major `f64` buffers and
//! 8-bit RGB images, for dumping renders to disk while debugging a fit.
//!
//! Values are treated as linear in `[0, 1]` and clamped; no color
//! management is applied.

use image::{Rgb, RgbImage};

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Convert a `height × width × channels` buffer to an `RgbImage`.
///
/// Single-channel buffers are replicated to gray; buffers with three or
/// more channels use the first three.
///
/// # Panics
///
/// Panics if `image.len() != width * height * channels` or if `channels`
/// is 2.
pub fn channels_to_rgb8(image: &[f64], width: usize, height: usize, channels: usize) -> RgbImage {
    assert_eq!(image.len(), width * height * channels);
    assert!(channels == 1 || channels >= 3, "no rgb layout for {channels} channels");

    let mut out = RgbImage::new(width as u32, height as u32);
    for y in 0..height {
        for x in 0..width {
            let base = channels * (y * width + x);
            let px = if channels == 1 {
                let g = to_u8(image[base]);
                [g, g, g]
            } else {
                [
                    to_u8(image[base]),
                    to_u8(image[base + 1]),
                    to_u8(image[base + 2]),
                ]
            };
            out.put_pixel(x as u32, y as u32, Rgb(px));
        }
    }
    out
}

/// Convert an `RgbImage` to a channel-major buffer with the given channel
/// count, scaling into `[0, 1]`. Single-channel output averages RGB;
/// channel counts above 3 are zero-padded.
pub fn rgb8_to_channels(img: &RgbImage, channels: usize) -> Vec<f64> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let mut out = vec![0.0; width * height * channels];
    for y in 0..height {
        for x in 0..width {
            let p = img.get_pixel(x as u32, y as u32);
            let base = channels * (y * width + x);
            if channels == 1 {
                out[base] =
                    (p[0] as f64 + p[1] as f64 + p[2] as f64) / (3.0 * 255.0);
            } else {
                for c in 0..channels.min(3) {
                    out[base + c] = p[c] as f64 / 255.0;
                }
            }
        }
    }
    out
}
