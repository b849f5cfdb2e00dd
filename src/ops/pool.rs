//! 3x3 "same" max pooling.
//!
//! Each output cell is the maximum over the in-bounds cells of its 3x3
//! neighbourhood. Cells outside the plane are skipped rather than padded, so
//! border cells only compare against their real neighbours.

use crate::parallel::Executor;
use crate::tensor::{Element, Tensor, TensorView};
use crate::trace::trace_span;
use crate::util::{PosePeakError, PosePeakResult};

/// Max-pools one `height x width` plane from `input` into `output`.
///
/// The max is separable: a vertical pass merges up to three rows, then a
/// horizontal pass merges up to three columns of that result.
pub fn same_max_pool_3x3_plane<T: Element>(
    height: usize,
    width: usize,
    input: &[T],
    output: &mut [T],
) {
    debug_assert!(input.len() >= height * width);
    debug_assert!(output.len() >= height * width);

    let mut vmax = vec![T::zero(); width];
    for y in 0..height {
        vmax.copy_from_slice(&input[y * width..(y + 1) * width]);
        if y > 0 {
            T::max_assign_row(&mut vmax, &input[(y - 1) * width..y * width]);
        }
        if y + 1 < height {
            T::max_assign_row(&mut vmax, &input[(y + 1) * width..(y + 2) * width]);
        }

        let out_row = &mut output[y * width..(y + 1) * width];
        for x in 0..width {
            let mut best = vmax[x];
            if x > 0 && best < vmax[x - 1] {
                best = vmax[x - 1];
            }
            if x + 1 < width && best < vmax[x + 1] {
                best = vmax[x + 1];
            }
            out_row[x] = best;
        }
    }
}

/// Max-pools every channel of `input` into `output`.
pub fn same_max_pool_3x3<T: Element>(
    input: TensorView<'_, T>,
    output: &mut Tensor<T>,
    executor: &Executor,
) -> PosePeakResult<()> {
    let dims = input.dims();
    if output.dims() != dims {
        return Err(PosePeakError::ShapeMismatch {
            expected: dims,
            got: output.dims(),
        });
    }
    let _span = trace_span!("max_pool_cpu", channels = dims.channels).entered();

    let plane = dims.plane_len();
    let src = input.as_slice();
    executor.for_each_chunk_mut(output.as_mut_slice(), plane, |k, out| {
        same_max_pool_3x3_plane(
            dims.height,
            dims.width,
            &src[k * plane..(k + 1) * plane],
            out,
        );
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::same_max_pool_3x3_plane;

    /// Direct neighbourhood scan used as the reference.
    fn naive(height: usize, width: usize, input: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; height * width];
        for i in 0..height as isize {
            for j in 0..width as isize {
                let mut best = input[i as usize * width + j as usize];
                for di in -1..=1 {
                    for dj in -1..=1 {
                        let (ni, nj) = (i + di, j + dj);
                        if ni >= 0 && ni < height as isize && nj >= 0 && nj < width as isize {
                            best = best.max(input[ni as usize * width + nj as usize]);
                        }
                    }
                }
                out[i as usize * width + j as usize] = best;
            }
        }
        out
    }

    #[test]
    fn negative_plane_is_not_zero_padded() {
        let input = vec![-5.0f32, -4.0, -3.0, -2.0];
        let mut out = vec![0.0f32; 4];
        same_max_pool_3x3_plane(2, 2, &input, &mut out);
        assert_eq!(out, vec![-2.0; 4]);
    }

    #[test]
    fn matches_naive_scan() {
        let (h, w) = (7, 11);
        let input: Vec<f32> = (0..h * w)
            .map(|i| (((i * 37) % 23) as f32) - 11.0)
            .collect();
        let mut out = vec![0.0f32; h * w];
        same_max_pool_3x3_plane(h, w, &input, &mut out);
        assert_eq!(out, naive(h, w, &input));
    }

    #[test]
    fn single_row_and_single_column() {
        let input = vec![1.0f64, 3.0, 2.0, 0.0];
        let mut out = vec![0.0f64; 4];
        same_max_pool_3x3_plane(1, 4, &input, &mut out);
        assert_eq!(out, vec![3.0, 3.0, 3.0, 2.0]);
        same_max_pool_3x3_plane(4, 1, &input, &mut out);
        assert_eq!(out, vec![3.0, 3.0, 3.0, 2.0]);
    }
}
