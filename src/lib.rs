//! posepeak turns part-confidence heatmaps into keypoint candidates.
//!
//! The pipeline smooths each heatmap channel, max-pools it over 3x3
//! neighbourhoods (on the CPU or an attached device) and keeps cells that are
//! above threshold and equal to their pooled value. Peaks are then grouped
//! per body part for skeleton assembly.
//!
//! Per-channel work fans out through [`Executor`], which runs sequentially,
//! on scoped threads, or on rayon (`rayon` feature). [`Combinable`] collects
//! per-thread results during such fan-outs.

pub mod device;
#[cfg(feature = "image-io")]
pub mod ingest;
pub mod ops;
pub mod parallel;
pub mod peak;
pub mod tensor;
mod trace;
pub mod util;

pub use device::{DeviceFallback, MaxPoolDevice};
#[cfg(feature = "gpu")]
pub use device::WgpuMaxPool;
pub use ops::{resize_area, same_max_pool_3x3, smooth};
pub use parallel::{Combinable, Executor};
pub use peak::{group_by_part, FinderConfig, Peak, PeakFinder, COCO_N_PARTS};
pub use tensor::{Dims3, Element, FeatureMap, Point2, Tensor, TensorView};
pub use util::{DeviceError, PosePeakError, PosePeakResult};
