//! Resampling helpers.

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array3;

use super::planes::{rgb_to_unit, unit_to_rgb};

/// Per-output-index source contributions for one axis of an area resample.
fn area_weights(src: usize, dst: usize) -> Vec<Vec<(usize, f32)>> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|o| {
            let start = o as f64 * scale;
            let end = start + scale;
            let mut taps = Vec::new();
            let mut i = start.floor() as usize;
            while (i as f64) < end && i < src {
                let lo = start.max(i as f64);
                let hi = end.min(i as f64 + 1.0);
                if hi > lo {
                    taps.push((i, ((hi - lo) / scale) as f32));
                }
                i += 1;
            }
            if taps.is_empty() {
                taps.push((src.saturating_sub(1).min(start as usize), 1.0));
            }
            taps
        })
        .collect()
}

/// Area-weighted resample: each output pixel is the coverage-weighted mean
/// of the source pixels its footprint overlaps.
pub fn resize_area(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    let src = rgb_to_unit(img);
    let (h, w, _) = src.dim();
    let (dw, dh) = (width.max(1) as usize, height.max(1) as usize);
    let xs = area_weights(w, dw);
    let ys = area_weights(h, dh);

    let mut rows = Array3::<f32>::zeros((h, dw, 3));
    for y in 0..h {
        for (ox, taps) in xs.iter().enumerate() {
            for c in 0..3 {
                rows[[y, ox, c]] = taps.iter().map(|&(sx, wt)| wt * src[[y, sx, c]]).sum();
            }
        }
    }

    let mut out = Array3::<f32>::zeros((dh, dw, 3));
    for (oy, taps) in ys.iter().enumerate() {
        for ox in 0..dw {
            for c in 0..3 {
                out[[oy, ox, c]] = taps.iter().map(|&(sy, wt)| wt * rows[[sy, ox, c]]).sum();
            }
        }
    }
    unit_to_rgb(&out)
}

/// Resample with one of `image`'s interpolation filters.
pub fn resize_with(img: &RgbImage, width: u32, height: u32, filter: FilterType) -> RgbImage {
    if img.dimensions() == (width, height) {
        return img.clone();
    }
    imageops::resize(img, width.max(1), height.max(1), filter)
}

/// Bring `reference` to the size of `target` (area resampling), as the
/// metric pipeline does with ground truth before comparing.
pub fn match_size(reference: &RgbImage, target: &RgbImage) -> RgbImage {
    let (w, h) = target.dimensions();
    resize_area(reference, w, h)
}
