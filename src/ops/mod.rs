//! Per-channel tensor operators.
//!
//! Every operator takes CHW input and output tensors and fans the work out
//! over channels through an [`Executor`](crate::parallel::Executor). Channels
//! are independent, so each worker writes only its own output plane.

pub mod pool;
pub mod resize;
pub mod smooth;

#[cfg(feature = "simd")]
pub(crate) mod simd;

pub use pool::{same_max_pool_3x3, same_max_pool_3x3_plane};
pub use resize::resize_area;
pub use smooth::{smooth, SMOOTH_SIGMA};
