//! Gaussian smoothing of heatmap channels.

use crate::parallel::Executor;
use crate::tensor::{Element, Tensor, TensorView};
use crate::trace::trace_span;
use crate::util::math::{gaussian_kernel, reflect_101};
use crate::util::{PosePeakError, PosePeakResult};

/// Standard deviation of the smoothing kernel, in pixels.
pub const SMOOTH_SIGMA: f64 = 3.0;

/// Blurs every channel of `input` into `output` with a `ksize x ksize`
/// Gaussian (sigma [`SMOOTH_SIGMA`]), mirroring borders reflect-101 style.
///
/// A `ksize` of 0 or 1 copies `input` unchanged. Larger kernel sizes must be
/// odd.
pub fn smooth<T: Element>(
    input: TensorView<'_, T>,
    output: &mut Tensor<T>,
    ksize: usize,
    executor: &Executor,
) -> PosePeakResult<()> {
    let dims = input.dims();
    if output.dims() != dims {
        return Err(PosePeakError::ShapeMismatch {
            expected: dims,
            got: output.dims(),
        });
    }
    if ksize > 1 && ksize % 2 == 0 {
        return Err(PosePeakError::InvalidKernelSize(ksize));
    }
    let _span = trace_span!("smooth", channels = dims.channels, ksize = ksize).entered();

    if ksize <= 1 {
        output.as_mut_slice().copy_from_slice(input.as_slice());
        return Ok(());
    }

    let taps: Vec<T> = gaussian_kernel(ksize, SMOOTH_SIGMA)
        .into_iter()
        .map(|w| num_traits::cast(w).unwrap_or_else(T::zero))
        .collect();
    let plane = dims.plane_len();
    let src = input.as_slice();
    executor.for_each_chunk_mut(output.as_mut_slice(), plane, |k, out| {
        gaussian_blur_plane(
            dims.height,
            dims.width,
            &src[k * plane..(k + 1) * plane],
            out,
            &taps,
        );
    });
    Ok(())
}

/// Reflect-101 source index for every tap position `-radius..len + radius`.
fn border_table(len: usize, radius: usize) -> Vec<usize> {
    (0..len + 2 * radius)
        .map(|p| reflect_101(p as isize - radius as isize, len))
        .collect()
}

/// Separable blur of one plane: horizontal pass into a scratch buffer, then
/// vertical pass into `output`.
fn gaussian_blur_plane<T: Element>(
    height: usize,
    width: usize,
    input: &[T],
    output: &mut [T],
    taps: &[T],
) {
    let radius = taps.len() / 2;
    let cols = border_table(width, radius);
    let rows = border_table(height, radius);

    let mut horizontal = vec![T::zero(); height * width];
    for y in 0..height {
        let src_row = &input[y * width..(y + 1) * width];
        let dst_row = &mut horizontal[y * width..(y + 1) * width];
        for (x, dst) in dst_row.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (i, &tap) in taps.iter().enumerate() {
                acc = acc + tap * src_row[cols[x + i]];
            }
            *dst = acc;
        }
    }

    for y in 0..height {
        let dst_row = &mut output[y * width..(y + 1) * width];
        for (x, dst) in dst_row.iter_mut().enumerate() {
            let mut acc = T::zero();
            for (i, &tap) in taps.iter().enumerate() {
                acc = acc + tap * horizontal[rows[y + i] * width + x];
            }
            *dst = acc;
        }
    }
}
