//! Pairing degraded inputs with ground truth by file name.
//!
//! Layout: `<data_root>/<dataset_id>/<input_dir>/**/<name>` pairs with
//! `<data_root>/<dataset_id>/gt/<name>`.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::{EvalError, Result};

pub const GT_DIR: &str = "gt";
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "webp"];

/// One (degraded input, ground truth) pair on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedSample {
    pub input_path: PathBuf,
    pub gt_path: PathBuf,
    pub name: String,
}

impl PairedSample {
    /// Decode both images as 8-bit RGB.
    pub fn load(&self) -> Result<(RgbImage, RgbImage)> {
        let input = image::open(&self.input_path)?.to_rgb8();
        let gt = image::open(&self.gt_path)?.to_rgb8();
        Ok((input, gt))
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Up to `limit` pairs, in lexicographic order of the input paths.
///
/// At most `max(limit * 5, 50)` input candidates are examined. A missing
/// dataset or directory yields an empty list.
pub fn find_pairs(
    data_root: &Path,
    dataset_id: &str,
    input_dir: &str,
    limit: usize,
) -> Vec<PairedSample> {
    let ds_dir = data_root.join(dataset_id);
    let in_dir = ds_dir.join(input_dir);
    let gt_dir = ds_dir.join(GT_DIR);
    if !in_dir.is_dir() || !gt_dir.is_dir() {
        debug!(dataset_id, input_dir, "dataset directories missing");
        return Vec::new();
    }

    let mut inputs: Vec<PathBuf> = WalkDir::new(&in_dir)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e.into_path()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable dataset entry");
                None
            }
        })
        .filter(|p| is_image_file(p))
        .collect();
    inputs.sort();

    let mut pairs = Vec::new();
    for input_path in inputs.into_iter().take(limit.saturating_mul(5).max(50)) {
        let Some(name) = input_path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let gt_path = gt_dir.join(&name);
        if is_image_file(&gt_path) {
            pairs.push(PairedSample {
                input_path,
                gt_path,
                name,
            });
            if pairs.len() >= limit {
                break;
            }
        }
    }
    pairs
}

/// Preflight for strict runs: at least one pair must exist.
pub fn ensure_real_pairs(
    data_root: &Path,
    dataset_id: &str,
    input_dir: &str,
    limit: usize,
) -> Result<Vec<PairedSample>> {
    let pairs = find_pairs(data_root, dataset_id, input_dir, limit);
    if pairs.is_empty() {
        return Err(EvalError::DataAbsent {
            dataset_id: dataset_id.to_string(),
            input_dir: input_dir.to_string(),
        });
    }
    Ok(pairs)
}
