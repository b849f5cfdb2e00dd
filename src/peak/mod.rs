//! Keypoint candidate extraction from part heatmaps.
//!
//! A [`PeakFinder`] smooths a heatmap, max-pools it and keeps every cell that
//! is above threshold and equal to its pooled value. [`group_by_part`] then
//! buckets the resulting peak ids per body part for skeleton assembly.

mod finder;

pub use finder::PeakFinder;

use crate::device::DeviceFallback;
use crate::parallel::Executor;
use crate::tensor::Point2;
use crate::util::{PosePeakError, PosePeakResult};

/// Number of body-part channels in the COCO layout. Heatmap channels at or
/// beyond this index (background) are never scanned.
pub const COCO_N_PARTS: usize = 18;

/// Kernel size used by [`FinderConfig::default`].
pub const DEFAULT_KSIZE: usize = 17;

/// One local maximum of one part channel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Peak<T = f32> {
    /// Channel index, always below [`COCO_N_PARTS`].
    pub part_id: usize,
    /// Heatmap cell, `x` = column and `y` = row.
    pub pos: Point2<i32>,
    /// Unsmoothed heatmap value at `pos`.
    pub score: T,
    /// Position of this peak in the result list.
    pub id: usize,
}

/// Configuration for a [`PeakFinder`].
#[derive(Clone, Debug)]
pub struct FinderConfig {
    /// Gaussian kernel size for smoothing; `0` or `1` disables smoothing.
    pub ksize: usize,
    /// Scan channels through the executor with per-thread peak lists.
    pub parallel_scan: bool,
    /// Backend used for per-channel fan-out.
    pub executor: Executor,
    /// Behaviour when device pooling fails.
    pub device_fallback: DeviceFallback,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            ksize: DEFAULT_KSIZE,
            parallel_scan: false,
            executor: Executor::preferred(),
            device_fallback: DeviceFallback::Fail,
        }
    }
}

impl FinderConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> PosePeakResult<()> {
        if self.ksize > 1 && self.ksize % 2 == 0 {
            return Err(PosePeakError::InvalidKernelSize(self.ksize));
        }
        Ok(())
    }
}

/// Buckets peak ids by part.
///
/// Returns [`COCO_N_PARTS`] lists; list `p` holds the `id` of every peak
/// with `part_id == p`, in input order.
///
/// # Panics
///
/// Panics if a peak has `part_id >= COCO_N_PARTS`.
pub fn group_by_part<T>(peaks: &[Peak<T>]) -> Vec<Vec<usize>> {
    let mut by_part = vec![Vec::new(); COCO_N_PARTS];
    for peak in peaks {
        by_part[peak.part_id].push(peak.id);
    }
    by_part
}
