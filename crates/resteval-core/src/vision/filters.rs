//! Spatial filters.
//!
//! Linear filters on whole images go through `imageproc`, which replicates
//! the edge pixel. The NIQE normalization needs "reflect 101" borders
//! (`gfedcb|abcdefgh|gfedcba`) and keeps its own separable Gaussian on
//! ndarray planes. Order-statistic and box filters clip their window at the
//! image edge.

use image::{Rgb32FImage, RgbImage};
use imageproc::filter::{filter3x3, gaussian_blur_f32, separable_filter_equal};
use ndarray::{Array2, Array3};

use super::planes::{rgb32f_to_rgb, rgb_to_rgb32f, rgb_to_unit, unit_to_rgb};

/// 4-neighbour Laplacian.
const LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

/// Map an out-of-range index into `[0, n)` by reflection without repeating
/// the edge sample.
#[inline]
pub(crate) fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Summed-area table over an `h × w` grid, accumulated in f64.
pub(crate) struct Integral {
    stride: usize,
    data: Vec<f64>,
}

impl Integral {
    pub(crate) fn new<F>(h: usize, w: usize, value: F) -> Self
    where
        F: Fn(usize, usize) -> f64,
    {
        let stride = w + 1;
        let mut data = vec![0.0f64; (h + 1) * stride];
        for y in 0..h {
            let mut row = 0.0;
            for x in 0..w {
                row += value(y, x);
                data[(y + 1) * stride + x + 1] = data[y * stride + x + 1] + row;
            }
        }
        Self { stride, data }
    }

    /// Sum over rows `y0..y1` and columns `x0..x1` (exclusive ends).
    #[inline]
    pub(crate) fn sum(&self, y0: usize, x0: usize, y1: usize, x1: usize) -> f64 {
        let s = self.stride;
        self.data[y1 * s + x1] - self.data[y0 * s + x1] - self.data[y1 * s + x0]
            + self.data[y0 * s + x0]
    }
}

/// Normalized 1-D Gaussian kernel. A non-positive sigma is derived from the size.
pub fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let ksize = ksize.max(1) | 1;
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (ksize / 2) as f32;
    let mut kernel: Vec<f32> = (0..ksize)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= total);
    kernel
}

/// Separable convolution with reflect-101 borders, same kernel on both axes.
fn convolve_separable(plane: &Array2<f32>, kernel: &[f32]) -> Array2<f32> {
    let (h, w) = plane.dim();
    let r = (kernel.len() / 2) as isize;

    let mut tmp = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &kv) in kernel.iter().enumerate() {
                let sx = reflect101(x as isize + k as isize - r, w);
                acc += kv * plane[[y, sx]];
            }
            tmp[[y, x]] = acc;
        }
    }

    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, &kv) in kernel.iter().enumerate() {
                let sy = reflect101(y as isize + k as isize - r, h);
                acc += kv * tmp[[sy, x]];
            }
            out[[y, x]] = acc;
        }
    }
    out
}

/// Gaussian blur of a single plane with reflect-101 borders (NIQE local
/// statistics).
pub fn gaussian_blur_plane(plane: &Array2<f32>, ksize: usize, sigma: f32) -> Array2<f32> {
    convolve_separable(plane, &gaussian_kernel(ksize, sigma))
}

/// Gaussian smoothing with an explicit `ksize × ksize` kernel.
pub fn gaussian_smooth(img: &RgbImage, ksize: usize, sigma: f32) -> RgbImage {
    let unit = rgb_to_rgb32f(img);
    rgb32f_to_rgb(&separable_filter_equal(&unit, &gaussian_kernel(ksize, sigma)))
}

/// Gaussian blur with the kernel extent imageproc derives from `sigma`.
pub fn gaussian_blur(img: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    rgb32f_to_rgb(&gaussian_blur_f32(&rgb_to_rgb32f(img), sigma))
}

/// Local mean over a `(2r+1)²` window clipped to the image.
pub fn box_mean(plane: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (h, w) = plane.dim();
    let integral = Integral::new(h, w, |y, x| plane[[y, x]] as f64);
    Array2::from_shape_fn((h, w), |(y, x)| {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius + 1).min(h);
        let x0 = x.saturating_sub(radius);
        let x1 = (x + radius + 1).min(w);
        let count = ((y1 - y0) * (x1 - x0)) as f64;
        (integral.sum(y0, x0, y1, x1) / count) as f32
    })
}

/// Grayscale erosion with a `size × size` square, window clipped at borders.
pub fn min_filter(plane: &Array2<f32>, size: usize) -> Array2<f32> {
    let (h, w) = plane.dim();
    let r = size / 2;

    let mut rows = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        for x in 0..w {
            let x1 = (x + r).min(w - 1);
            let mut m = f32::INFINITY;
            for sx in x.saturating_sub(r)..=x1 {
                m = m.min(plane[[y, sx]]);
            }
            rows[[y, x]] = m;
        }
    }

    let mut out = Array2::<f32>::zeros((h, w));
    for y in 0..h {
        let y1 = (y + r).min(h - 1);
        for x in 0..w {
            let mut m = f32::INFINITY;
            for sy in y.saturating_sub(r)..=y1 {
                m = m.min(rows[[sy, x]]);
            }
            out[[y, x]] = m;
        }
    }
    out
}

/// Edge-preserving bilateral filter on an RGB array in [0, 1].
///
/// `sigma_color` is expressed on the 8-bit scale and compared against the
/// L1 color distance, `sigma_space` in pixels. The window is the disc of
/// diameter `diameter`.
pub fn bilateral(arr: &Array3<f32>, diameter: usize, sigma_color: f32, sigma_space: f32) -> Array3<f32> {
    let (h, w, _) = arr.dim();
    let r = (diameter / 2) as isize;
    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let space_coeff = -0.5 / (sigma_space * sigma_space);

    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let d2 = (dy * dy + dx * dx) as f32;
            if d2 <= (r * r) as f32 {
                offsets.push((dy, dx, (d2 * space_coeff).exp()));
            }
        }
    }

    let mut out = Array3::<f32>::zeros((h, w, 3));
    for y in 0..h {
        for x in 0..w {
            let center = [arr[[y, x, 0]], arr[[y, x, 1]], arr[[y, x, 2]]];
            let mut acc = [0.0f32; 3];
            let mut wsum = 0.0f32;
            for &(dy, dx, ws) in &offsets {
                let sy = y as isize + dy;
                let sx = x as isize + dx;
                if sy < 0 || sx < 0 || sy >= h as isize || sx >= w as isize {
                    continue;
                }
                let (sy, sx) = (sy as usize, sx as usize);
                let dist: f32 = (0..3)
                    .map(|c| (arr[[sy, sx, c]] - center[c]).abs())
                    .sum::<f32>()
                    * 255.0;
                let wgt = ws * (dist * dist * color_coeff).exp();
                for c in 0..3 {
                    acc[c] += wgt * arr[[sy, sx, c]];
                }
                wsum += wgt;
            }
            for c in 0..3 {
                out[[y, x, c]] = acc[c] / wsum;
            }
        }
    }
    out
}

/// Non-local means on an RGB array in [0, 1].
///
/// Patch distances are mean squared differences on the 8-bit scale, taken
/// over a `template × template` patch and all channels; weights are
/// `exp(-d / h²)`. One summed-area table per search offset keeps the cost at
/// `O(search² · pixels)`.
pub fn non_local_means(arr: &Array3<f32>, h_param: f32, template: usize, search: usize) -> Array3<f32> {
    let (h, w, _) = arr.dim();
    let t = template / 2;
    let s = (search / 2) as isize;
    let h2 = (h_param * h_param).max(1e-6);
    let scaled = arr.mapv(|v| v * 255.0);

    let mut acc = Array3::<f32>::zeros((h, w, 3));
    let mut wsum = Array2::<f32>::zeros((h, w));

    for dy in -s..=s {
        for dx in -s..=s {
            let neighbour = |y: usize, x: usize| {
                (
                    reflect101(y as isize + dy, h),
                    reflect101(x as isize + dx, w),
                )
            };
            let integral = Integral::new(h, w, |y, x| {
                let (ny, nx) = neighbour(y, x);
                (0..3)
                    .map(|c| {
                        let d = (scaled[[y, x, c]] - scaled[[ny, nx, c]]) as f64;
                        d * d
                    })
                    .sum()
            });

            for y in 0..h {
                let y0 = y.saturating_sub(t);
                let y1 = (y + t + 1).min(h);
                for x in 0..w {
                    let x0 = x.saturating_sub(t);
                    let x1 = (x + t + 1).min(w);
                    let count = ((y1 - y0) * (x1 - x0) * 3) as f64;
                    let d = (integral.sum(y0, x0, y1, x1) / count) as f32;
                    let wgt = (-d / h2).exp();
                    let (ny, nx) = neighbour(y, x);
                    for c in 0..3 {
                        acc[[y, x, c]] += wgt * arr[[ny, nx, c]];
                    }
                    wsum[[y, x]] += wgt;
                }
            }
        }
    }

    for y in 0..h {
        for x in 0..w {
            let ws = wsum[[y, x]];
            for c in 0..3 {
                acc[[y, x, c]] /= ws;
            }
        }
    }
    acc
}

/// Median filter with a `ksize × ksize` window.
pub fn median(img: &RgbImage, ksize: u32) -> RgbImage {
    let r = ksize / 2;
    imageproc::filter::median_filter(img, r, r)
}

/// Pixelwise `a + weight·b` on two images of equal size.
fn add_weighted(a: &Rgb32FImage, b: &Rgb32FImage, weight: f32) -> Rgb32FImage {
    let mut out = a.clone();
    for (o, &d) in out.iter_mut().zip(b.iter()) {
        *o += weight * d;
    }
    out
}

/// High-pass boost: `in·(1 + amount) − blur(in)·amount`.
pub fn unsharp_mask(img: &RgbImage, sigma: f32, amount: f32) -> RgbImage {
    if sigma <= 0.0 {
        return img.clone();
    }
    let unit = rgb_to_rgb32f(img);
    let mut detail = gaussian_blur_f32(&unit, sigma);
    for (d, &v) in detail.iter_mut().zip(unit.iter()) {
        *d = v - *d;
    }
    rgb32f_to_rgb(&add_weighted(&unit, &detail, amount))
}

/// Sharpen by subtracting the 4-neighbour Laplacian scaled by `strength`.
pub fn laplacian_sharpen(img: &RgbImage, strength: f32) -> RgbImage {
    let unit = rgb_to_rgb32f(img);
    let lap: Rgb32FImage = filter3x3(&unit, &LAPLACIAN);
    rgb32f_to_rgb(&add_weighted(&unit, &lap, -strength))
}

/// Power-law tone curve on normalized intensities.
pub fn gamma_correct(img: &RgbImage, gamma: f32) -> RgbImage {
    let arr = rgb_to_unit(img);
    unit_to_rgb(&arr.mapv(|v| v.max(0.0).powf(gamma)))
}
