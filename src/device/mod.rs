//! Offloaded 3x3 max pooling.
//!
//! A [`MaxPoolDevice`] is created for a fixed CHW shape (batch of one) and is
//! handed host buffers on every call. Implementations copy the input to
//! device memory, run the pooling kernel and copy the result back before
//! returning; nothing overlaps with the caller. Results must equal
//! [`same_max_pool_3x3`](crate::ops::same_max_pool_3x3) exactly.

use crate::tensor::Dims3;
use crate::util::DeviceError;

#[cfg(feature = "gpu")]
pub mod gpu;

#[cfg(feature = "gpu")]
pub use gpu::WgpuMaxPool;

/// A max-pooling operator running outside the host CPU path.
pub trait MaxPoolDevice<T>: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Shape the device buffers were allocated for.
    fn dims(&self) -> Dims3;

    /// Pools `input` into `output`, both `dims().len()` elements in CHW order.
    ///
    /// Blocks until the result is back in `output`.
    fn max_pool_3x3(&mut self, input: &[T], output: &mut [T]) -> Result<(), DeviceError>;
}

/// What the peak finder does when device pooling is requested but fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeviceFallback {
    /// Return the device error to the caller.
    #[default]
    Fail,
    /// Record the failure and pool on the CPU instead.
    Cpu,
}

/// Checks buffer lengths against the device shape.
pub fn check_buffers<T>(dims: Dims3, input: &[T], output: &[T]) -> Result<(), DeviceError> {
    let expected = dims.len();
    for got in [input.len(), output.len()] {
        if got != expected {
            return Err(DeviceError::ShapeMismatch { expected, got });
        }
    }
    Ok(())
}
