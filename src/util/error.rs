//! Error types for posepeak.

use crate::tensor::Dims3;
use thiserror::Error;

/// Result alias for posepeak operations.
pub type PosePeakResult<T> = std::result::Result<T, PosePeakError>;

/// Errors that can occur when running the peak pipeline.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PosePeakError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Tensor dimensions are zero or overflow.
    #[error("invalid dimensions: {channels}x{height}x{width}")]
    InvalidDimensions {
        channels: usize,
        height: usize,
        width: usize,
    },
    /// The provided buffer is smaller than required.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A tensor does not have the dimensions the operation was built for.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Dims3, got: Dims3 },
    /// Input and output tensors disagree on channel count.
    #[error("channel mismatch: input has {input} channels, output has {output}")]
    ChannelMismatch { input: usize, output: usize },
    /// Gaussian kernel sizes above one must be odd.
    #[error("invalid kernel size {0}: must be odd or <= 1")]
    InvalidKernelSize(usize),
    /// An image in a batch differs in size from the first image.
    #[error("image {index} is {got:?}, expected {expected:?}")]
    ImageSizeMismatch {
        index: usize,
        expected: (u32, u32),
        got: (u32, u32),
    },
    /// The pooling device failed and no fallback was configured.
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Failures reported by a max-pooling device.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DeviceError {
    /// No device is attached or the adapter could not be acquired.
    #[error("device unavailable: {0}")]
    Unavailable(String),
    /// A host/device copy failed.
    #[error("device transfer failed: {0}")]
    Transfer(String),
    /// The pooling kernel failed to run.
    #[error("device kernel failed: {0}")]
    Kernel(String),
    /// The buffers handed to the device do not match its configured shape.
    #[error("device shape mismatch: expected {expected} elements, got {got}")]
    ShapeMismatch { expected: usize, got: usize },
}
