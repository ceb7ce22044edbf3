//! Full-reference metrics on RGB images normalized to [0, 1].

use image::RgbImage;

use super::filters::Integral;
use crate::domain::{EvalError, Result};

const SSIM_WIN: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

fn check_shapes(metric: &str, a: &RgbImage, b: &RgbImage) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(EvalError::metric(
            metric,
            format!(
                "shape mismatch: {:?} vs {:?}",
                a.dimensions(),
                b.dimensions()
            ),
        ));
    }
    if a.width() == 0 || a.height() == 0 {
        return Err(EvalError::metric(metric, "empty image"));
    }
    Ok(())
}

/// Peak signal-to-noise ratio in dB with a data range of 1.
///
/// Identical images yield `f64::INFINITY`.
pub fn psnr(pred: &RgbImage, gt: &RgbImage) -> Result<f64> {
    check_shapes("PSNR", pred, gt)?;
    let n = pred.as_raw().len() as f64;
    let sse: f64 = pred
        .as_raw()
        .iter()
        .zip(gt.as_raw())
        .map(|(&p, &g)| {
            let d = (p as f64 - g as f64) / 255.0;
            d * d
        })
        .sum();
    let mse = sse / n;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (1.0 / mse).log10())
}

/// Mean structural similarity over all channels.
///
/// 7×7 uniform window, sample covariance, and a 3-pixel border excluded
/// from the mean. Images smaller than the window are rejected.
pub fn ssim(pred: &RgbImage, gt: &RgbImage) -> Result<f64> {
    check_shapes("SSIM", pred, gt)?;
    let (w, h) = (pred.width() as usize, pred.height() as usize);
    if w < SSIM_WIN || h < SSIM_WIN {
        return Err(EvalError::metric(
            "SSIM",
            format!("image {w}x{h} smaller than {SSIM_WIN}x{SSIM_WIN} window"),
        ));
    }

    let c1 = SSIM_K1 * SSIM_K1;
    let c2 = SSIM_K2 * SSIM_K2;
    let np = (SSIM_WIN * SSIM_WIN) as f64;
    let cov_norm = np / (np - 1.0);
    let r = SSIM_WIN / 2;

    let a = pred.as_raw();
    let b = gt.as_raw();
    let px = |buf: &[u8], y: usize, x: usize, c: usize| buf[(y * w + x) * 3 + c] as f64 / 255.0;

    let mut total = 0.0;
    for c in 0..3 {
        let sx = Integral::new(h, w, |y, x| px(a, y, x, c));
        let sy = Integral::new(h, w, |y, x| px(b, y, x, c));
        let sxx = Integral::new(h, w, |y, x| px(a, y, x, c).powi(2));
        let syy = Integral::new(h, w, |y, x| px(b, y, x, c).powi(2));
        let sxy = Integral::new(h, w, |y, x| px(a, y, x, c) * px(b, y, x, c));

        let mut acc = 0.0;
        let mut count = 0usize;
        for y in r..h - r {
            for x in r..w - r {
                let (y0, x0, y1, x1) = (y - r, x - r, y + r + 1, x + r + 1);
                let ux = sx.sum(y0, x0, y1, x1) / np;
                let uy = sy.sum(y0, x0, y1, x1) / np;
                let vx = cov_norm * (sxx.sum(y0, x0, y1, x1) / np - ux * ux);
                let vy = cov_norm * (syy.sum(y0, x0, y1, x1) / np - uy * uy);
                let vxy = cov_norm * (sxy.sum(y0, x0, y1, x1) / np - ux * uy);

                let num = (2.0 * ux * uy + c1) * (2.0 * vxy + c2);
                let den = (ux * ux + uy * uy + c1) * (vx + vy + c2);
                acc += num / den;
                count += 1;
            }
        }
        total += acc / count as f64;
    }
    Ok(total / 3.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn textured(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 256) as u8,
                ((x * 5 + y * 53) % 256) as u8,
                ((x ^ y) * 9 % 256) as u8,
            ])
        })
    }

    #[test]
    fn identical_images_are_perfect() {
        let img = textured(32, 24);
        assert_eq!(psnr(&img, &img).unwrap(), f64::INFINITY);
        assert!((ssim(&img, &img).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn psnr_of_uniform_offset() {
        let a = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let b = RgbImage::from_pixel(8, 8, Rgb([110, 110, 110]));
        let expected = 10.0 * (1.0 / (10.0f64 / 255.0).powi(2)).log10();
        assert!((psnr(&a, &b).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn degraded_image_scores_lower() {
        let gt = textured(40, 40);
        let noisy = RgbImage::from_fn(40, 40, |x, y| {
            let p = gt.get_pixel(x, y);
            let n = if (x + y) % 2 == 0 { 30 } else { 0 };
            Rgb([p[0].saturating_add(n), p[1].saturating_sub(n), p[2]])
        });
        let s = ssim(&noisy, &gt).unwrap();
        assert!(s < 0.99 && s > -1.0);
        assert!(psnr(&noisy, &gt).unwrap().is_finite());
    }

    #[test]
    fn shape_mismatch_is_metric_failure() {
        let a = textured(10, 10);
        let b = textured(12, 10);
        assert!(matches!(psnr(&a, &b), Err(EvalError::MetricFailure { .. })));
        assert!(matches!(ssim(&a, &b), Err(EvalError::MetricFailure { .. })));
    }

    #[test]
    fn ssim_rejects_tiny_images() {
        let a = textured(6, 20);
        match ssim(&a, &a) {
            Err(EvalError::MetricFailure { metric, .. }) => assert_eq!(metric, "SSIM"),
            other => panic!("expected MetricFailure, got {other:?}"),
        }
    }
}
