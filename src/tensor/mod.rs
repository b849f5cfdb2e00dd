//! Channel-planar tensors and small value types.
//!
//! Tensors are stored channel-major (`[channel][row][col]`, i.e. CHW) in one
//! contiguous buffer. `TensorView` borrows such a buffer, `Tensor` owns one.
//! Strides are implied by the dimensions: a channel plane is `height * width`
//! elements and a row is `width` elements. Accessors are bounds-checked and
//! return `None` outside the tensor.

use crate::util::{PosePeakError, PosePeakResult};
use num_traits::Float;
use std::fmt;

pub mod feature_map;
pub mod point;

pub use feature_map::FeatureMap;
pub use point::Point2;

/// Floating-point element type accepted by the tensor operators.
pub trait Element: Float + Send + Sync + fmt::Debug + 'static {
    /// Replaces every `dst[i]` with `max(dst[i], src[i])`.
    ///
    /// Both slices must have the same length.
    #[inline]
    fn max_assign_row(dst: &mut [Self], src: &[Self]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            if *d < s {
                *d = s;
            }
        }
    }
}

impl Element for f64 {}

impl Element for f32 {
    #[cfg(feature = "simd")]
    #[inline]
    fn max_assign_row(dst: &mut [Self], src: &[Self]) {
        crate::ops::simd::max_assign_row_f32(dst, src);
    }
}

/// Dimensions of a CHW tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dims3 {
    /// Number of channels (body parts plus any auxiliary channels).
    pub channels: usize,
    /// Rows per channel.
    pub height: usize,
    /// Columns per row.
    pub width: usize,
}

impl Dims3 {
    /// Creates a dimension triple.
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
        }
    }

    /// Number of elements in one channel plane.
    pub const fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Total number of elements.
    pub const fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Returns true when any dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element strides for (channel, row, col).
    pub const fn strides(&self) -> [usize; 3] {
        [self.height * self.width, self.width, 1]
    }

    /// Checks that every dimension is non-zero and the element count fits
    /// in `usize`, returning that count.
    pub fn checked_len(&self) -> PosePeakResult<usize> {
        let invalid = PosePeakError::InvalidDimensions {
            channels: self.channels,
            height: self.height,
            width: self.width,
        };
        if self.channels == 0 || self.height == 0 || self.width == 0 {
            return Err(invalid);
        }
        self.height
            .checked_mul(self.width)
            .and_then(|plane| plane.checked_mul(self.channels))
            .ok_or(invalid)
    }

    #[inline]
    pub(crate) fn offset(&self, channel: usize, y: usize, x: usize) -> usize {
        (channel * self.height + y) * self.width + x
    }
}

impl fmt::Display for Dims3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}

/// Borrowed CHW tensor.
#[derive(Copy, Clone, Debug)]
pub struct TensorView<'a, T> {
    data: &'a [T],
    dims: Dims3,
}

impl<'a, T> TensorView<'a, T> {
    /// Creates a view over the first `dims.len()` elements of `data`.
    pub fn from_slice(data: &'a [T], dims: Dims3) -> PosePeakResult<Self> {
        let needed = dims.checked_len()?;
        if data.len() < needed {
            return Err(PosePeakError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data: &data[..needed],
            dims,
        })
    }

    /// Returns the tensor dimensions.
    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    /// Returns the whole backing slice in CHW order.
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Returns the plane of channel `k`.
    pub fn channel(&self, k: usize) -> Option<&'a [T]> {
        if k >= self.dims.channels {
            return None;
        }
        let plane = self.dims.plane_len();
        self.data.get(k * plane..(k + 1) * plane)
    }

    /// Returns row `y` of channel `k`.
    pub fn row(&self, k: usize, y: usize) -> Option<&'a [T]> {
        if k >= self.dims.channels || y >= self.dims.height {
            return None;
        }
        let start = self.dims.offset(k, y, 0);
        self.data.get(start..start + self.dims.width)
    }

    /// Returns the element at `(k, y, x)` if it is within bounds.
    pub fn get(&self, k: usize, y: usize, x: usize) -> Option<&'a T> {
        if k >= self.dims.channels || y >= self.dims.height || x >= self.dims.width {
            return None;
        }
        self.data.get(self.dims.offset(k, y, x))
    }
}

/// Owned contiguous CHW tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor<T> {
    data: Vec<T>,
    dims: Dims3,
}

impl<T: Element> Tensor<T> {
    /// Allocates a zero-filled tensor.
    pub fn zeros(dims: Dims3) -> PosePeakResult<Self> {
        let len = dims.checked_len()?;
        Ok(Self {
            data: vec![T::zero(); len],
            dims,
        })
    }
}

impl<T> Tensor<T> {
    /// Wraps a CHW buffer whose length must equal `dims.len()`.
    pub fn from_vec(data: Vec<T>, dims: Dims3) -> PosePeakResult<Self> {
        let needed = dims.checked_len()?;
        if data.len() < needed {
            return Err(PosePeakError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        if data.len() > needed {
            return Err(PosePeakError::InvalidInput(
                "tensor buffer is longer than its dimensions",
            ));
        }
        Ok(Self { data, dims })
    }

    /// Returns a borrowed view of the tensor.
    pub fn view(&self) -> TensorView<'_, T> {
        TensorView {
            data: &self.data,
            dims: self.dims,
        }
    }

    /// Returns the tensor dimensions.
    pub fn dims(&self) -> Dims3 {
        self.dims
    }

    /// Returns the backing slice in CHW order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the backing slice mutably.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Returns the plane of channel `k` mutably.
    pub fn channel_mut(&mut self, k: usize) -> Option<&mut [T]> {
        if k >= self.dims.channels {
            return None;
        }
        let plane = self.dims.plane_len();
        self.data.get_mut(k * plane..(k + 1) * plane)
    }

    /// Returns the element at `(k, y, x)` mutably if it is within bounds.
    pub fn get_mut(&mut self, k: usize, y: usize, x: usize) -> Option<&mut T> {
        if k >= self.dims.channels || y >= self.dims.height || x >= self.dims.width {
            return None;
        }
        let idx = self.dims.offset(k, y, x);
        self.data.get_mut(idx)
    }

    /// Consumes the tensor and returns its buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}
