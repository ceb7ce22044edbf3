//! Conversions between 8-bit images and normalized float planes.

use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
use ndarray::Array3;

/// 8-bit RGB → `(height, width, 3)` float array in [0, 1].
pub fn rgb_to_unit(img: &RgbImage) -> Array3<f32> {
    let (w, h) = img.dimensions();
    Array3::from_shape_fn((h as usize, w as usize, 3), |(y, x, c)| {
        img.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Round-half-up quantization of a [0, 1] value (`x·255 + 0.5`, truncated).
#[inline]
pub fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// Float array in [0, 1] → 8-bit RGB.
pub fn unit_to_rgb(arr: &Array3<f32>) -> RgbImage {
    let (h, w, _) = arr.dim();
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgb([
            quantize(arr[[y, x, 0]]),
            quantize(arr[[y, x, 1]]),
            quantize(arr[[y, x, 2]]),
        ])
    })
}

/// 8-bit RGB → float image in [0, 1], for imageproc filters.
pub fn rgb_to_rgb32f(img: &RgbImage) -> Rgb32FImage {
    let (w, h) = img.dimensions();
    let data = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    Rgb32FImage::from_raw(w, h, data).unwrap_or_else(|| Rgb32FImage::new(w, h))
}

/// Float image in [0, 1] → 8-bit RGB, quantized like [`unit_to_rgb`].
pub fn rgb32f_to_rgb(img: &Rgb32FImage) -> RgbImage {
    let (w, h) = img.dimensions();
    let data = img.as_raw().iter().map(|&v| quantize(v)).collect();
    RgbImage::from_raw(w, h, data).unwrap_or_else(|| RgbImage::new(w, h))
}

/// Luma with ITU-R BT.601 weights, rounded to 8 bits.
pub fn to_gray(img: &RgbImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y);
        let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([(luma + 0.5).min(255.0) as u8])
    })
}
