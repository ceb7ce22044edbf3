//! Pixel-level building blocks: filters, resampling, metrics, dehazing and
//! the no-reference quality score.
//!
//! Everything here is synchronous and CPU-bound; the engine runs it on the
//! blocking pool.

pub mod clahe;
pub mod dehaze;
pub mod filters;
pub mod metrics;
pub mod niqe;
pub mod planes;
pub mod resize;

pub use dehaze::{dehaze_dcp, DcpParams};
pub use metrics::{psnr, ssim};
pub use niqe::niqe_score;
pub use resize::{match_size, resize_area};
