//! Numeric helpers shared by the tensor operators.

use std::ops::Mul;

/// Squares a value.
#[inline]
pub(crate) fn sqr<T: Mul<Output = T> + Copy>(x: T) -> T {
    x * x
}

/// Builds a normalized 1D Gaussian kernel of `ksize` taps.
///
/// Taps are `exp(-(i - (ksize - 1) / 2)^2 / (2 sigma^2))` scaled to sum to one.
pub(crate) fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f64> {
    let center = (ksize as f64 - 1.0) * 0.5;
    let scale = -0.5 / sqr(sigma);
    let mut taps: Vec<f64> = (0..ksize)
        .map(|i| (scale * sqr(i as f64 - center)).exp())
        .collect();
    let sum: f64 = taps.iter().sum();
    for tap in taps.iter_mut() {
        *tap /= sum;
    }
    taps
}

/// Maps an out-of-range coordinate back into `[0, len)` by mirroring around
/// the edge pixels without repeating them (`gfedcb|abcdefgh|gfedcba`).
pub(crate) fn reflect_101(mut p: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    while p < 0 || p >= len {
        if p < 0 {
            p = -p;
        }
        if p >= len {
            p = 2 * len - 2 - p;
        }
    }
    p as usize
}
