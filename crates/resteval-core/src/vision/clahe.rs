//! Contrast-limited adaptive histogram equalization on luminance.

use image::{GrayImage, Luma, Rgb, RgbImage};

use super::planes::to_gray;

const BINS: usize = 256;

/// Per-tile lookup table: clipped histogram, excess spread over all bins,
/// then the scaled cumulative distribution.
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let pixels = ((x1 - x0) * (y1 - y0)).max(1);

    let clip = ((clip_limit * pixels as f32 / BINS as f32) as u32).max(1);
    let mut excess = 0u32;
    for h in hist.iter_mut() {
        if *h > clip {
            excess += *h - clip;
            *h = clip;
        }
    }
    let per_bin = excess / BINS as u32;
    let remainder = (excess % BINS as u32) as usize;
    for (i, h) in hist.iter_mut().enumerate() {
        *h += per_bin + u32::from(i < remainder);
    }

    let scale = 255.0 / pixels as f32;
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (i, &h) in hist.iter().enumerate() {
        cdf += h;
        lut[i] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Equalize a gray image with a `grid × grid` tiling. `clip_limit` is
/// relative to a uniform histogram (1.0 disables amplification).
pub fn clahe_gray(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let gx = grid.clamp(1, w);
    let gy = grid.clamp(1, h);
    let tw = w.div_ceil(gx);
    let th = h.div_ceil(gy);

    let luts: Vec<Vec<[u8; BINS]>> = (0..gy)
        .map(|ty| {
            (0..gx)
                .map(|tx| {
                    let x0 = (tx * tw).min(w - 1);
                    let y0 = (ty * th).min(h - 1);
                    let x1 = ((tx + 1) * tw).min(w).max(x0 + 1);
                    let y1 = ((ty + 1) * th).min(h).max(y0 + 1);
                    tile_lut(gray, x0, y0, x1, y1, clip_limit)
                })
                .collect()
        })
        .collect();

    // Position of a pixel between tile centres along one axis.
    let locate = |p: u32, size: u32, tiles: u32| -> (usize, usize, f32) {
        let f = (p as f32 + 0.5) / size as f32 - 0.5;
        let i0 = f.floor().clamp(0.0, (tiles - 1) as f32) as usize;
        let i1 = (i0 + 1).min(tiles as usize - 1);
        let a = (f - i0 as f32).clamp(0.0, 1.0);
        (i0, i1, a)
    };

    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (x0, x1, ax) = locate(x, tw, gx);
        let (y0, y1, ay) = locate(y, th, gy);
        let top = luts[y0][x0][v] as f32 * (1.0 - ax) + luts[y0][x1][v] as f32 * ax;
        let bottom = luts[y1][x0][v] as f32 * (1.0 - ax) + luts[y1][x1][v] as f32 * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// CLAHE on the luminance of an RGB image. The luminance change is added
/// to every channel, which leaves both chroma differences untouched.
pub fn clahe_rgb(img: &RgbImage, clip_limit: f32, grid: u32) -> RgbImage {
    let y = to_gray(img);
    let eq = clahe_gray(&y, clip_limit, grid);
    RgbImage::from_fn(img.width(), img.height(), |px, py| {
        let delta = eq.get_pixel(px, py)[0] as i16 - y.get_pixel(px, py)[0] as i16;
        let p = img.get_pixel(px, py);
        let shift = |c: u8| (c as i16 + delta).clamp(0, 255) as u8;
        Rgb([shift(p[0]), shift(p[1]), shift(p[2])])
    })
}
