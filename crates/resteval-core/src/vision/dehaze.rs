//! Dark channel prior dehazing with guided-filter refinement.

use image::RgbImage;
use ndarray::{Array2, Array3, Axis, Zip};

use super::filters::{box_mean, min_filter};
use super::planes::{rgb_to_unit, unit_to_rgb};

/// Tunables for [`dehaze_dcp`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcpParams {
    pub patch: usize,
    pub omega: f32,
    pub t0: f32,
    pub radius: usize,
    pub eps: f32,
    pub refine: bool,
}

impl Default for DcpParams {
    fn default() -> Self {
        Self {
            patch: 15,
            omega: 0.95,
            t0: 0.1,
            radius: 40,
            eps: 1e-3,
            refine: true,
        }
    }
}

/// Per-pixel channel minimum, eroded by a `patch × patch` square.
pub fn dark_channel(img: &Array3<f32>, patch: usize) -> Array2<f32> {
    let min_rgb = img.map_axis(Axis(2), |px| px.iter().copied().fold(f32::INFINITY, f32::min));
    min_filter(&min_rgb, patch)
}

/// Per-channel maximum over the brightest 0.1% of the dark channel
/// (at least one pixel).
pub fn atmospheric_light(img: &Array3<f32>, dark: &Array2<f32>) -> [f32; 3] {
    let (h, w) = dark.dim();
    let num = ((h * w) as f64 * 0.001) as usize;
    let num = num.max(1);

    let flat: Vec<f32> = dark.iter().copied().collect();
    let mut order: Vec<usize> = (0..flat.len()).collect();
    order.sort_unstable_by(|&a, &b| flat[b].total_cmp(&flat[a]));

    let mut a = [0.0f32; 3];
    for &idx in order.iter().take(num) {
        let (y, x) = (idx / w, idx % w);
        for (c, slot) in a.iter_mut().enumerate() {
            *slot = slot.max(img[[y, x, c]]);
        }
    }
    a
}

/// Coarse transmission `1 − ω · dark(I / A)`, clamped to [0, 1].
pub fn transmission(img: &Array3<f32>, a: [f32; 3], omega: f32, patch: usize) -> Array2<f32> {
    let mut norm = img.clone();
    for (c, &ac) in a.iter().enumerate() {
        norm.index_axis_mut(Axis(2), c)
            .mapv_inplace(|v| v / (ac + 1e-6));
    }
    dark_channel(&norm, patch).mapv(|d| (1.0 - omega * d).clamp(0.0, 1.0))
}

/// Edge-preserving guided filter of `p` steered by `guide`.
pub fn guided_filter(guide: &Array2<f32>, p: &Array2<f32>, radius: usize, eps: f32) -> Array2<f32> {
    let mean_i = box_mean(guide, radius);
    let mean_p = box_mean(p, radius);
    let corr_i = box_mean(&(guide * guide), radius);
    let corr_ip = box_mean(&(guide * p), radius);

    let var_i = &corr_i - &(&mean_i * &mean_i);
    let cov_ip = &corr_ip - &(&mean_i * &mean_p);

    let a = Zip::from(&cov_ip)
        .and(&var_i)
        .map_collect(|&cov, &var| cov / (var + eps));
    let b = &mean_p - &(&a * &mean_i);

    let mean_a = box_mean(&a, radius);
    let mean_b = box_mean(&b, radius);
    &mean_a * guide + &mean_b
}

fn luma(img: &Array3<f32>) -> Array2<f32> {
    img.map_axis(Axis(2), |px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
}

/// Scene radiance `J = (I − A) / max(t, t0) + A`, clamped to [0, 1].
pub fn recover(img: &Array3<f32>, t: &Array2<f32>, a: [f32; 3], t0: f32) -> Array3<f32> {
    let (h, w, _) = img.dim();
    Array3::from_shape_fn((h, w, 3), |(y, x, c)| {
        let tt = t[[y, x]].max(t0);
        ((img[[y, x, c]] - a[c]) / tt + a[c]).clamp(0.0, 1.0)
    })
}

/// Full DCP pipeline on an 8-bit RGB image.
pub fn dehaze_dcp(input: &RgbImage, params: &DcpParams) -> RgbImage {
    let img = rgb_to_unit(input);
    let dark = dark_channel(&img, params.patch);
    let a = atmospheric_light(&img, &dark);
    let mut t = transmission(&img, a, params.omega, params.patch);
    if params.refine {
        t = guided_filter(&luma(&img), &t, params.radius, params.eps).mapv(|v| v.clamp(0.0, 1.0));
    }
    unit_to_rgb(&recover(&img, &t, a, params.t0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::metrics::psnr;
    use crate::vision::niqe::niqe_score;
    use image::Rgb;

    fn scene(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (20 + (x * 3) % 180) as u8,
                (10 + (y * 5) % 160) as u8,
                (30 + ((x + y) * 2) % 140) as u8,
            ])
        })
    }

    fn hazed(gt: &RgbImage) -> RgbImage {
        let h = gt.height() as f32;
        RgbImage::from_fn(gt.width(), gt.height(), |x, y| {
            let t = (0.35 + 0.55 * (1.0 - y as f32 / h)).clamp(0.1, 0.95);
            let p = gt.get_pixel(x, y);
            let mix = |v: u8| {
                let j = v as f32 / 255.0;
                crate::vision::planes::quantize(j * t + 0.9 * (1.0 - t))
            };
            Rgb([mix(p[0]), mix(p[1]), mix(p[2])])
        })
    }

    #[test]
    fn dark_channel_of_saturated_color_is_zero() {
        let img = rgb_to_unit(&RgbImage::from_pixel(9, 9, Rgb([255, 0, 255])));
        let dark = dark_channel(&img, 3);
        assert!(dark.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn atmospheric_light_picks_haziest_pixel() {
        let mut src = RgbImage::from_pixel(20, 20, Rgb([10, 10, 10]));
        src.put_pixel(5, 5, Rgb([230, 240, 250]));
        let img = rgb_to_unit(&src);
        let dark = dark_channel(&img, 1);
        let a = atmospheric_light(&img, &dark);
        assert!((a[0] - 230.0 / 255.0).abs() < 1e-6);
        assert!((a[2] - 250.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn guided_filter_keeps_constant_input() {
        let guide = Array2::<f32>::from_shape_fn((16, 16), |(y, x)| ((x + y) % 5) as f32 / 5.0);
        let p = Array2::<f32>::from_elem((16, 16), 0.7);
        let q = guided_filter(&guide, &p, 4, 1e-3);
        assert!(q.iter().all(|&v| (v - 0.7).abs() < 1e-3));
    }

    #[test]
    fn dehazing_improves_fidelity_on_synthetic_haze() {
        let gt = scene(96, 64);
        let hazy = hazed(&gt);
        let params = DcpParams {
            radius: 8,
            ..DcpParams::default()
        };
        let out = dehaze_dcp(&hazy, &params);
        assert_eq!(out.dimensions(), hazy.dimensions());
        assert!(psnr(&out, &gt).unwrap() > psnr(&hazy, &gt).unwrap());
    }

    #[test]
    fn haze_free_dark_image_is_not_degraded_much() {
        // Dark channel ~0 everywhere means t ~1 and J ~I.
        let img = RgbImage::from_fn(48, 48, |x, y| {
            Rgb([(x * 5) as u8, 0, (y * 5) as u8])
        });
        let out = dehaze_dcp(&img, &DcpParams::default());
        assert!(psnr(&out, &img).unwrap() > 30.0);
    }

    #[test]
    fn haze_free_texture_keeps_its_quality_score() {
        // One near-zero channel in every patch: a clear scene to the prior.
        let img = RgbImage::from_fn(64, 64, |x, y| {
            Rgb([
                (60 + (x * 7 + y * 3) % 120) as u8,
                ((x * 13 + y * 7) % 17) as u8,
                (40 + ((x ^ y) * 3) % 150) as u8,
            ])
        });
        let out = dehaze_dcp(&img, &DcpParams::default());
        let before = niqe_score(&img).unwrap();
        let after = niqe_score(&out).unwrap();
        assert!(after - before < 0.5, "NIQE {before} -> {after}");
        assert!(psnr(&out, &img).unwrap() > 25.0);
    }
}
