//! NIQE-style no-reference quality score (lower is better).
//!
//! Eight aggregate statistics of the MSCN field are compared with a fixed
//! natural-image prior under a diagonal Mahalanobis distance. The prior is
//! a local reproducibility target, not a published NIQE model.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, RgbImage};
use ndarray::{s, Array2};

use super::filters::gaussian_blur_plane;
use super::planes::to_gray;
use crate::domain::{EvalError, Result};

const TARGET_MIN_SIDE: u32 = 256;
const MSCN_C: f32 = 1.0;
const PRIOR_MEAN: [f64; 8] = [0.0, 0.5, 0.0, 3.0, 0.0, 0.2, 0.0, 0.2];
const PRIOR_VAR: [f64; 8] = [0.2, 0.8, 0.5, 2.0, 0.3, 0.6, 0.3, 0.6];

/// Float luma in [0, 1]; `imageops::resize` clamps f32 samples to that range.
type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 8-bit luma of `img`, then bicubically upscaled in float so the short side
/// reaches 256 (each side at least 8). Returned on the 8-bit scale.
pub fn luma_plane(img: &RgbImage) -> Array2<f32> {
    let gray = to_gray(img);
    let mut luma: GrayF32 = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([gray.get_pixel(x, y)[0] as f32 / 255.0])
    });
    let (w, h) = luma.dimensions();
    let short = w.min(h);
    if short > 0 && short < TARGET_MIN_SIDE {
        let scale = TARGET_MIN_SIDE as f64 / short as f64;
        let nw = ((w as f64 * scale) as u32).max(8);
        let nh = ((h as f64 * scale) as u32).max(8);
        luma = imageops::resize(&luma, nw, nh, FilterType::CatmullRom);
    }
    let (w, h) = luma.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        luma.get_pixel(x as u32, y as u32)[0] * 255.0
    })
}

/// Mean-subtracted contrast-normalized coefficients of an 8-bit-scale plane.
pub fn mscn(plane: &Array2<f32>) -> Array2<f32> {
    let sigma_g = 7.0 / 6.0;
    let mu = gaussian_blur_plane(plane, 7, sigma_g);
    let sq = gaussian_blur_plane(&plane.mapv(|v| v * v), 7, sigma_g);
    let mut out = plane - &mu;
    ndarray::Zip::from(&mut out)
        .and(&mu)
        .and(&sq)
        .for_each(|o, &m, &s2| {
            let sigma = (s2 - m * m).abs().sqrt();
            *o /= sigma + MSCN_C;
        });
    out
}

fn mean_var<'a>(values: impl Iterator<Item = &'a f32> + Clone) -> (f64, f64) {
    let (mut sum, mut n) = (0.0f64, 0usize);
    for &v in values.clone() {
        sum += v as f64;
        n += 1;
    }
    let mean = sum / n as f64;
    let var = values.map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var)
}

/// `[mean, var, skew, kurt, h_mean, h_var, v_mean, v_var]` of an MSCN field.
///
/// Kurtosis is the plain fourth standardized moment (a Gaussian scores 3).
pub fn features(field: &Array2<f32>) -> [f64; 8] {
    let (mean, var) = mean_var(field.iter());
    let std = var.sqrt() + 1e-9;
    let n = field.len() as f64;
    let (mut m3, mut m4) = (0.0f64, 0.0f64);
    for &v in field.iter() {
        let z = (v as f64 - mean) / std;
        m3 += z.powi(3);
        m4 += z.powi(4);
    }

    let h_prod = &field.slice(s![.., ..-1]) * &field.slice(s![.., 1..]);
    let v_prod = &field.slice(s![..-1, ..]) * &field.slice(s![1.., ..]);
    let (hm, hv) = mean_var(h_prod.iter());
    let (vm, vv) = mean_var(v_prod.iter());

    [mean, var, m3 / n, m4 / n, hm, hv, vm, vv]
}

/// Distance of the feature vector to the prior.
pub fn distance(feat: &[f64; 8]) -> f64 {
    feat.iter()
        .zip(PRIOR_MEAN.iter().zip(PRIOR_VAR.iter()))
        .map(|(&f, (&mu, &var))| {
            let d = (f - mu) / (var.sqrt() + 1e-6);
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Score an RGB image; see [`luma_plane`] for the upscaling of small inputs.
pub fn niqe_score(img: &RgbImage) -> Result<f64> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(EvalError::metric("NIQE", "img_is_empty"));
    }
    let plane = luma_plane(img);
    // Neighbour products need at least two samples per axis.
    if plane.nrows() < 2 || plane.ncols() < 2 {
        return Err(EvalError::metric("NIQE", "image too small"));
    }

    let field = mscn(&plane);
    let score = distance(&features(&field));
    if !score.is_finite() {
        return Err(EvalError::metric("NIQE", "niqe_score_not_finite"));
    }
    Ok(score)
}
