//! Algorithm dispatch table.
//!
//! Maps `(task, algorithm id)` to a pure image transform with a declared
//! parameter schema. The first entry of each task is its baseline, used for
//! unknown ids. Nothing here holds state, so concurrent calls are safe.

use image::imageops::FilterType;
use image::RgbImage;
use tracing::warn;

use resteval_state::{RunParams, TaskType};

use crate::params::{sanitize, ParamSpec, Preset, SanitizedParams};
use crate::vision::clahe::clahe_rgb;
use crate::vision::filters::{
    bilateral, gamma_correct, gaussian_smooth, laplacian_sharpen, median, non_local_means,
    unsharp_mask,
};
use crate::vision::planes::{rgb_to_unit, unit_to_rgb};
use crate::vision::resize::resize_with;
use crate::vision::{dehaze_dcp, DcpParams};

/// Which transform an entry runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    NonLocalMeans,
    Bilateral,
    GaussianSmooth,
    Median,
    UnsharpMask,
    LaplacianSharpen,
    DarkChannelPrior,
    Clahe,
    Gamma,
    Resample(Interp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interp {
    Bicubic,
    Nearest,
    Lanczos,
}

impl Interp {
    fn filter(self) -> FilterType {
        match self {
            Interp::Bicubic => FilterType::CatmullRom,
            Interp::Nearest => FilterType::Nearest,
            Interp::Lanczos => FilterType::Lanczos3,
        }
    }
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlgorithmSpec {
    pub id: &'static str,
    pub task: TaskType,
    pub display_name: &'static str,
    /// Short family name recorded on finished runs (`real_algo`).
    pub real_algo: &'static str,
    pub kind: AlgorithmKind,
    pub schema: &'static [ParamSpec],
    pub presets: &'static [Preset],
}

impl AlgorithmSpec {
    pub fn sanitize(&self, raw: &RunParams) -> SanitizedParams {
        sanitize(self.schema, self.presets, raw)
    }
}

/// Per-call information that is not part of the input image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformContext {
    /// Ground-truth `(width, height)`; super-resolution targets it.
    pub reference_size: Option<(u32, u32)>,
}

const NLM_SCHEMA: &[ParamSpec] = &[
    ParamSpec::float("h", 10.0, 1.0, 50.0),
    ParamSpec::odd_int("template_window", 7, 3, 21),
    ParamSpec::odd_int("search_window", 21, 7, 51),
];
const NLM_PRESETS: &[Preset] = &[
    Preset {
        name: "speed",
        values: &[("template_window", 5.0), ("search_window", 11.0)],
    },
    Preset {
        name: "quality",
        values: &[("template_window", 7.0), ("search_window", 31.0)],
    },
];

const BILATERAL_SCHEMA: &[ParamSpec] = &[
    ParamSpec::odd_int("diameter", 9, 3, 25),
    ParamSpec::float("sigma_color", 75.0, 1.0, 200.0),
    ParamSpec::float("sigma_space", 75.0, 1.0, 200.0),
];
const BILATERAL_PRESETS: &[Preset] = &[
    Preset {
        name: "speed",
        values: &[("diameter", 5.0)],
    },
    Preset {
        name: "quality",
        values: &[("diameter", 13.0), ("sigma_color", 50.0)],
    },
];

const GAUSSIAN_SCHEMA: &[ParamSpec] = &[
    ParamSpec::odd_int("ksize", 5, 3, 31),
    ParamSpec::float("sigma", 1.2, 0.1, 10.0),
];

const MEDIAN_SCHEMA: &[ParamSpec] = &[ParamSpec::odd_int("ksize", 5, 3, 15)];

const UNSHARP_SCHEMA: &[ParamSpec] = &[
    ParamSpec::float("sigma", 1.0, 0.1, 10.0),
    ParamSpec::float("amount", 0.6, 0.0, 5.0),
];
const UNSHARP_PRESETS: &[Preset] = &[Preset {
    name: "quality",
    values: &[("sigma", 1.5), ("amount", 0.8)],
}];

const LAPLACIAN_SCHEMA: &[ParamSpec] = &[ParamSpec::float("strength", 1.0, 0.0, 5.0)];

const DCP_SCHEMA: &[ParamSpec] = &[
    ParamSpec::odd_int("patch", 15, 3, 61),
    ParamSpec::float("omega", 0.95, 0.5, 1.0),
    ParamSpec::float("t0", 0.1, 0.01, 0.5),
    ParamSpec::int("radius", 40, 1, 120),
    ParamSpec::float("eps", 1e-3, 1e-6, 1.0),
    ParamSpec::flag("refine", true),
];
const DCP_PRESETS: &[Preset] = &[
    Preset {
        name: "speed",
        values: &[("patch", 7.0), ("radius", 20.0)],
    },
    Preset {
        name: "quality",
        values: &[("patch", 15.0), ("radius", 60.0), ("refine", 1.0)],
    },
];

const CLAHE_SCHEMA: &[ParamSpec] = &[
    ParamSpec::float("clip_limit", 2.0, 0.5, 40.0),
    ParamSpec::int("tile_grid", 8, 1, 32),
];

const DEHAZE_GAMMA_SCHEMA: &[ParamSpec] = &[ParamSpec::float("gamma", 1.5, 0.1, 5.0)];
const LOWLIGHT_GAMMA_SCHEMA: &[ParamSpec] = &[ParamSpec::float("gamma", 0.6, 0.1, 5.0)];

const SR_SCHEMA: &[ParamSpec] = &[ParamSpec::int("scale", 2, 1, 8)];

const NO_PRESETS: &[Preset] = &[];

/// Every known algorithm, baselines first within each task.
pub static ALGORITHMS: &[AlgorithmSpec] = &[
    AlgorithmSpec {
        id: "alg_denoise_nlm",
        task: TaskType::Denoise,
        display_name: "Non-local means",
        real_algo: "FastNLMeans",
        kind: AlgorithmKind::NonLocalMeans,
        schema: NLM_SCHEMA,
        presets: NLM_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_denoise_bilateral",
        task: TaskType::Denoise,
        display_name: "Bilateral filter",
        real_algo: "Bilateral",
        kind: AlgorithmKind::Bilateral,
        schema: BILATERAL_SCHEMA,
        presets: BILATERAL_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_denoise_gaussian",
        task: TaskType::Denoise,
        display_name: "Gaussian smoothing",
        real_algo: "GaussianBlur",
        kind: AlgorithmKind::GaussianSmooth,
        schema: GAUSSIAN_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_denoise_median",
        task: TaskType::Denoise,
        display_name: "Median filter",
        real_algo: "Median",
        kind: AlgorithmKind::Median,
        schema: MEDIAN_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_deblur_unsharp",
        task: TaskType::Deblur,
        display_name: "Unsharp mask",
        real_algo: "UnsharpMask",
        kind: AlgorithmKind::UnsharpMask,
        schema: UNSHARP_SCHEMA,
        presets: UNSHARP_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_deblur_laplacian",
        task: TaskType::Deblur,
        display_name: "Laplacian sharpening",
        real_algo: "Laplacian",
        kind: AlgorithmKind::LaplacianSharpen,
        schema: LAPLACIAN_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_dehaze_dcp",
        task: TaskType::Dehaze,
        display_name: "Dark channel prior",
        real_algo: "DCP",
        kind: AlgorithmKind::DarkChannelPrior,
        schema: DCP_SCHEMA,
        presets: DCP_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_dehaze_clahe",
        task: TaskType::Dehaze,
        display_name: "CLAHE",
        real_algo: "CLAHE",
        kind: AlgorithmKind::Clahe,
        schema: CLAHE_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_dehaze_gamma",
        task: TaskType::Dehaze,
        display_name: "Gamma correction",
        real_algo: "Gamma",
        kind: AlgorithmKind::Gamma,
        schema: DEHAZE_GAMMA_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_sr_bicubic",
        task: TaskType::Sr,
        display_name: "Bicubic upscaling",
        real_algo: "Bicubic",
        kind: AlgorithmKind::Resample(Interp::Bicubic),
        schema: SR_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_sr_nearest",
        task: TaskType::Sr,
        display_name: "Nearest-neighbour upscaling",
        real_algo: "Nearest",
        kind: AlgorithmKind::Resample(Interp::Nearest),
        schema: SR_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_sr_lanczos",
        task: TaskType::Sr,
        display_name: "Lanczos upscaling",
        real_algo: "Lanczos",
        kind: AlgorithmKind::Resample(Interp::Lanczos),
        schema: SR_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_lowlight_gamma",
        task: TaskType::Lowlight,
        display_name: "Gamma correction",
        real_algo: "Gamma",
        kind: AlgorithmKind::Gamma,
        schema: LOWLIGHT_GAMMA_SCHEMA,
        presets: NO_PRESETS,
    },
    AlgorithmSpec {
        id: "alg_lowlight_clahe",
        task: TaskType::Lowlight,
        display_name: "CLAHE",
        real_algo: "CLAHE",
        kind: AlgorithmKind::Clahe,
        schema: CLAHE_SCHEMA,
        presets: NO_PRESETS,
    },
];

/// Algorithms registered for `task`, baseline first.
pub fn algorithms_for(task: TaskType) -> impl Iterator<Item = &'static AlgorithmSpec> {
    ALGORITHMS.iter().filter(move |a| a.task == task)
}

/// Baseline of `task`; `None` for tasks without image algorithms.
pub fn baseline(task: TaskType) -> Option<&'static AlgorithmSpec> {
    algorithms_for(task).next()
}

/// Look up `algorithm_id` for `task`, falling back to the task baseline.
pub fn resolve(task: TaskType, algorithm_id: &str) -> Option<&'static AlgorithmSpec> {
    if let Some(spec) = algorithms_for(task).find(|a| a.id == algorithm_id) {
        return Some(spec);
    }
    let fallback = baseline(task)?;
    warn!(
        task = %task,
        algorithm_id,
        fallback = fallback.id,
        "unknown algorithm for task, using baseline"
    );
    Some(fallback)
}

/// Run `spec` on `input`.
pub fn apply(
    spec: &AlgorithmSpec,
    params: &SanitizedParams,
    input: &RgbImage,
    ctx: &TransformContext,
) -> RgbImage {
    match spec.kind {
        AlgorithmKind::NonLocalMeans => unit_to_rgb(&non_local_means(
            &rgb_to_unit(input),
            params.float("h") as f32,
            params.int("template_window") as usize,
            params.int("search_window") as usize,
        )),
        AlgorithmKind::Bilateral => unit_to_rgb(&bilateral(
            &rgb_to_unit(input),
            params.int("diameter") as usize,
            params.float("sigma_color") as f32,
            params.float("sigma_space") as f32,
        )),
        AlgorithmKind::GaussianSmooth => gaussian_smooth(
            input,
            params.int("ksize") as usize,
            params.float("sigma") as f32,
        ),
        AlgorithmKind::Median => median(input, params.int("ksize") as u32),
        AlgorithmKind::UnsharpMask => unsharp_mask(
            input,
            params.float("sigma") as f32,
            params.float("amount") as f32,
        ),
        AlgorithmKind::LaplacianSharpen => {
            laplacian_sharpen(input, params.float("strength") as f32)
        }
        AlgorithmKind::DarkChannelPrior => {
            let dcp = DcpParams {
                patch: params.int("patch") as usize,
                omega: params.float("omega") as f32,
                t0: params.float("t0") as f32,
                radius: params.int("radius") as usize,
                eps: params.float("eps") as f32,
                refine: params.flag("refine"),
            };
            dehaze_dcp(input, &dcp)
        }
        AlgorithmKind::Clahe => clahe_rgb(
            input,
            params.float("clip_limit") as f32,
            params.int("tile_grid") as u32,
        ),
        AlgorithmKind::Gamma => gamma_correct(input, params.float("gamma") as f32),
        AlgorithmKind::Resample(interp) => {
            let (w, h) = ctx.reference_size.unwrap_or_else(|| {
                let scale = params.int("scale").max(1) as u32;
                (input.width() * scale, input.height() * scale)
            });
            resize_with(input, w, h, interp.filter())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamKind;
    use image::Rgb;
    use serde_json::json;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 9) as u8, (y * 9) as u8, 120]))
    }

    #[test]
    fn every_image_task_has_a_baseline() {
        let expected = [
            (TaskType::Denoise, "alg_denoise_nlm"),
            (TaskType::Deblur, "alg_deblur_unsharp"),
            (TaskType::Dehaze, "alg_dehaze_dcp"),
            (TaskType::Sr, "alg_sr_bicubic"),
            (TaskType::Lowlight, "alg_lowlight_gamma"),
        ];
        for (task, id) in expected {
            assert_eq!(baseline(task).map(|a| a.id), Some(id));
        }
        assert!(baseline(TaskType::VideoSr).is_none());
    }

    #[test]
    fn ids_are_unique_and_odd_maxima_are_odd() {
        for (i, a) in ALGORITHMS.iter().enumerate() {
            assert!(ALGORITHMS[i + 1..].iter().all(|b| b.id != a.id), "{}", a.id);
            for spec in a.schema {
                if spec.kind == (ParamKind::Int { odd: true }) {
                    assert_eq!(spec.max as i64 % 2, 1, "{}.{}", a.id, spec.name);
                }
                assert!(spec.min <= spec.default && spec.default <= spec.max);
            }
        }
    }

    #[test]
    fn unknown_id_falls_back_to_baseline() {
        let spec = resolve(TaskType::Dehaze, "alg_does_not_exist").unwrap();
        assert_eq!(spec.id, "alg_dehaze_dcp");
        // an id registered for another task is unknown here too
        let spec = resolve(TaskType::Denoise, "alg_sr_lanczos").unwrap();
        assert_eq!(spec.id, "alg_denoise_nlm");
        assert_eq!(resolve(TaskType::Sr, "alg_sr_lanczos").unwrap().id, "alg_sr_lanczos");
    }

    #[test]
    fn sr_targets_reference_size_or_scale() {
        let spec = resolve(TaskType::Sr, "alg_sr_nearest").unwrap();
        let input = gradient(10, 6);
        let ctx = TransformContext {
            reference_size: Some((25, 13)),
        };
        let out = apply(spec, &spec.sanitize(&RunParams::new()), &input, &ctx);
        assert_eq!(out.dimensions(), (25, 13));

        let raw: RunParams = [("scale".to_string(), json!(3))].into_iter().collect();
        let out = apply(spec, &spec.sanitize(&raw), &input, &TransformContext::default());
        assert_eq!(out.dimensions(), (30, 18));
    }

    #[test]
    fn every_transform_preserves_size_outside_sr() {
        let input = gradient(24, 20);
        for spec in ALGORITHMS.iter().filter(|a| a.task != TaskType::Sr) {
            let raw: RunParams = [("preset".to_string(), json!("speed"))].into_iter().collect();
            let out = apply(spec, &spec.sanitize(&raw), &input, &TransformContext::default());
            assert_eq!(out.dimensions(), input.dimensions(), "{}", spec.id);
        }
    }

    #[test]
    fn lowlight_gamma_brightens() {
        let spec = baseline(TaskType::Lowlight).unwrap();
        let dark = RgbImage::from_pixel(8, 8, Rgb([30, 30, 30]));
        let out = apply(spec, &spec.sanitize(&RunParams::new()), &dark, &TransformContext::default());
        assert!(out.get_pixel(0, 0)[0] > 30);
    }
}
