//! Seeded synthetic (ground truth, degraded input) pairs.
//!
//! Used when a dataset has nothing to pair, so every run still produces
//! real metrics. Identical seeds give byte-identical images.

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use resteval_state::TaskType;

use crate::vision::filters::gaussian_blur;
use crate::vision::planes::quantize;
use crate::vision::resize_area;

pub const SYNTHETIC_NAME: &str = "synthetic";

const NOISE_SIGMA: f64 = 18.0;
const BLUR_SIGMA: f32 = 2.0;
const DARKEN: f32 = 0.25;
const HAZE_AIRLIGHT: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticPair {
    pub gt: RgbImage,
    pub input: RgbImage,
}

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

fn random_rgb(rng: &mut StdRng, width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |_, _| Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

/// Haze model `I = J·t + A·(1 − t)` over a textured gradient scene, with
/// transmission falling from the top row to the bottom row.
fn dehaze_pair(rng: &mut StdRng, width: u32, height: u32) -> SyntheticPair {
    let span = |n: u32, i: u32| if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
    let mut gt_unit = Vec::with_capacity((width * height) as usize);
    for _y in 0..height {
        for x in 0..width {
            let g = 0.35 * span(width, x);
            let px: [f32; 3] = [
                (0.65 * rng.gen::<f32>() + g).clamp(0.0, 1.0),
                (0.65 * rng.gen::<f32>() + g).clamp(0.0, 1.0),
                (0.65 * rng.gen::<f32>() + g).clamp(0.0, 1.0),
            ];
            gt_unit.push(px);
        }
    }

    let mut gt = RgbImage::new(width, height);
    let mut input = RgbImage::new(width, height);
    for y in 0..height {
        let t = (0.35 + 0.55 * (1.0 - span(height, y))).clamp(0.1, 0.95);
        for x in 0..width {
            let j = gt_unit[(y * width + x) as usize];
            gt.put_pixel(x, y, Rgb(j.map(quantize)));
            input.put_pixel(
                x,
                y,
                Rgb(j.map(|v| quantize(v * t + HAZE_AIRLIGHT * (1.0 - t)))),
            );
        }
    }
    SyntheticPair { gt, input }
}

/// Build the fallback pair for `task` at `(height, width)`.
pub fn synthesize(task: TaskType, seed: u64, size: (u32, u32)) -> SyntheticPair {
    let (height, width) = (size.0.max(8), size.1.max(8));
    let mut rng = StdRng::seed_from_u64(seed);

    if task == TaskType::Dehaze {
        return dehaze_pair(&mut rng, width, height);
    }

    let gt = random_rgb(&mut rng, width, height);
    let input = match task {
        TaskType::Denoise | TaskType::VideoDenoise => {
            let mut noisy = gt.clone();
            for p in noisy.pixels_mut() {
                for c in p.0.iter_mut() {
                    let v = *c as f64 + NOISE_SIGMA * standard_normal(&mut rng);
                    *c = v.clamp(0.0, 255.0) as u8;
                }
            }
            noisy
        }
        TaskType::Deblur => {
            gaussian_blur(&gt, BLUR_SIGMA)
        }
        TaskType::Sr | TaskType::VideoSr => resize_area(&gt, width / 2, height / 2),
        TaskType::Lowlight => {
            let mut dark = gt.clone();
            for p in dark.pixels_mut() {
                for c in p.0.iter_mut() {
                    *c = (*c as f32 * DARKEN) as u8;
                }
            }
            dark
        }
        // built by dehaze_pair
        TaskType::Dehaze => gt.clone(),
    };
    SyntheticPair { gt, input }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: (u32, u32) = (24, 40);

    #[test]
    fn same_seed_gives_identical_bytes() {
        for task in [
            TaskType::Denoise,
            TaskType::Deblur,
            TaskType::Dehaze,
            TaskType::Sr,
            TaskType::Lowlight,
        ] {
            let a = synthesize(task, 7, SIZE);
            let b = synthesize(task, 7, SIZE);
            assert_eq!(a.gt.as_raw(), b.gt.as_raw(), "{task}");
            assert_eq!(a.input.as_raw(), b.input.as_raw(), "{task}");
        }
    }

    #[test]
    fn different_seeds_differ() {
        let a = synthesize(TaskType::Denoise, 1, SIZE);
        let b = synthesize(TaskType::Denoise, 2, SIZE);
        assert_ne!(a.gt.as_raw(), b.gt.as_raw());
    }

    #[test]
    fn sr_input_is_half_size() {
        let pair = synthesize(TaskType::Sr, 3, SIZE);
        assert_eq!(pair.gt.dimensions(), (40, 24));
        assert_eq!(pair.input.dimensions(), (20, 12));
    }

    #[test]
    fn lowlight_darkens_by_quarter() {
        let pair = synthesize(TaskType::Lowlight, 4, SIZE);
        for (g, i) in pair.gt.as_raw().iter().zip(pair.input.as_raw()) {
            assert_eq!(*i, (*g as f32 * 0.25) as u8);
        }
    }

    #[test]
    fn dehaze_input_is_brighter_towards_bottom() {
        let pair = synthesize(TaskType::Dehaze, 5, (64, 64));
        let row_mean = |img: &RgbImage, y: u32| {
            (0..img.width()).map(|x| img.get_pixel(x, y)[0] as f64).sum::<f64>() / img.width() as f64
        };
        // Haze lifts dark values more where transmission is lower.
        let lift_top = row_mean(&pair.input, 0) - row_mean(&pair.gt, 0);
        let lift_bottom = row_mean(&pair.input, 63) - row_mean(&pair.gt, 63);
        assert!(lift_bottom > lift_top);
    }

    #[test]
    fn noise_is_roughly_sigma_18() {
        let pair = synthesize(TaskType::Denoise, 9, (64, 64));
        let n = pair.gt.as_raw().len() as f64;
        let mse: f64 = pair
            .gt
            .as_raw()
            .iter()
            .zip(pair.input.as_raw())
            .map(|(&g, &i)| (g as f64 - i as f64).powi(2))
            .sum::<f64>()
            / n;
        // clipping at the range ends pulls this a bit under 18
        assert!(mse.sqrt() > 12.0 && mse.sqrt() < 20.0);
    }
}
