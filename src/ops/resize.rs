//! Area-interpolation resize of CHW tensors.
//!
//! Matches the `INTER_AREA` mode of common image libraries. When both axes
//! shrink, every output cell is the area-weighted mean of the source cells it
//! covers, including fractional coverage at cell edges. Otherwise each axis
//! uses two-tap linear interpolation with area-derived coefficients, which
//! degenerates to pixel replication for integer upscales.

use crate::parallel::Executor;
use crate::tensor::{Element, Tensor, TensorView};
use crate::trace::trace_span;
use crate::util::{PosePeakError, PosePeakResult};

/// Source taps `(index, weight)` for one output coordinate.
type Taps = Vec<(usize, f64)>;

/// Resamples every channel of `input` to the height and width of `output`.
///
/// Channel counts must match. Equal dimensions copy the input unchanged.
pub fn resize_area<T: Element>(
    input: TensorView<'_, T>,
    output: &mut Tensor<T>,
    executor: &Executor,
) -> PosePeakResult<()> {
    let src = input.dims();
    let dst = output.dims();
    if src.channels != dst.channels {
        return Err(PosePeakError::ChannelMismatch {
            input: src.channels,
            output: dst.channels,
        });
    }
    if src == dst {
        output.as_mut_slice().copy_from_slice(input.as_slice());
        return Ok(());
    }
    let _span = trace_span!(
        "resize_area",
        channels = src.channels,
        from_h = src.height,
        from_w = src.width,
        to_h = dst.height,
        to_w = dst.width
    )
    .entered();

    let scale_x = src.width as f64 / dst.width as f64;
    let scale_y = src.height as f64 / dst.height as f64;
    let (x_taps, y_taps) = if scale_x >= 1.0 && scale_y >= 1.0 {
        (
            area_taps(src.width, dst.width),
            area_taps(src.height, dst.height),
        )
    } else {
        (
            linear_area_taps(src.width, dst.width),
            linear_area_taps(src.height, dst.height),
        )
    };
    let x_taps = cast_taps::<T>(x_taps);
    let y_taps = cast_taps::<T>(y_taps);

    let src_plane = src.plane_len();
    let data = input.as_slice();
    executor.for_each_chunk_mut(output.as_mut_slice(), dst.plane_len(), |k, out| {
        resample_plane(
            &data[k * src_plane..(k + 1) * src_plane],
            src.height,
            src.width,
            out,
            dst.width,
            &x_taps,
            &y_taps,
        );
    });
    Ok(())
}

/// Fractional-coverage weights for shrinking `src` cells into `dst` cells.
fn area_taps(src: usize, dst: usize) -> Vec<Taps> {
    let scale = src as f64 / dst as f64;
    let last = src as isize - 1;
    (0..dst)
        .map(|d| {
            let f1 = d as f64 * scale;
            let f2 = f1 + scale;
            let cell = scale.min(src as f64 - f1);

            let s2 = (f2.floor() as isize).min(last);
            let s1 = (f1.ceil() as isize).min(s2);

            let mut taps = Taps::new();
            if s1 as f64 - f1 > 1e-3 {
                taps.push(((s1 - 1) as usize, (s1 as f64 - f1) / cell));
            }
            for s in s1..s2 {
                taps.push((s as usize, 1.0 / cell));
            }
            if f2 - s2 as f64 > 1e-3 {
                let covered = (f2 - s2 as f64).min(1.0).min(cell);
                taps.push((s2 as usize, covered / cell));
            }
            taps
        })
        .collect()
}

/// Two-tap linear weights with area-mode coefficients.
fn linear_area_taps(src: usize, dst: usize) -> Vec<Taps> {
    let scale = src as f64 / dst as f64;
    let inv_scale = dst as f64 / src as f64;
    let last = src - 1;
    (0..dst)
        .map(|d| {
            let mut s = (d as f64 * scale).floor() as isize;
            let mut f = (d + 1) as f64 - (s + 1) as f64 * inv_scale;
            f = if f <= 0.0 { 0.0 } else { f - f.floor() };
            if s < 0 {
                s = 0;
                f = 0.0;
            }
            if s as usize >= last {
                s = last as isize;
                f = 0.0;
            }
            let s = s as usize;
            vec![(s, 1.0 - f), ((s + 1).min(last), f)]
        })
        .collect()
}

fn cast_taps<T: Element>(taps: Vec<Taps>) -> Vec<Vec<(usize, T)>> {
    taps.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(i, w)| (i, num_traits::cast(w).unwrap_or_else(T::zero)))
                .collect()
        })
        .collect()
}

fn resample_plane<T: Element>(
    input: &[T],
    src_height: usize,
    src_width: usize,
    output: &mut [T],
    dst_width: usize,
    x_taps: &[Vec<(usize, T)>],
    y_taps: &[Vec<(usize, T)>],
) {
    let mut horizontal = vec![T::zero(); src_height * dst_width];
    for y in 0..src_height {
        let src_row = &input[y * src_width..(y + 1) * src_width];
        let dst_row = &mut horizontal[y * dst_width..(y + 1) * dst_width];
        for (dst, taps) in dst_row.iter_mut().zip(x_taps) {
            *dst = taps
                .iter()
                .fold(T::zero(), |acc, &(sx, w)| acc + w * src_row[sx]);
        }
    }

    for (dy, taps) in y_taps.iter().enumerate() {
        let dst_row = &mut output[dy * dst_width..(dy + 1) * dst_width];
        for (dx, dst) in dst_row.iter_mut().enumerate() {
            *dst = taps.iter().fold(T::zero(), |acc, &(sy, w)| {
                acc + w * horizontal[sy * dst_width + dx]
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{area_taps, linear_area_taps};

    fn weight_sum(taps: &[(usize, f64)]) -> f64 {
        taps.iter().map(|(_, w)| w).sum()
    }

    #[test]
    fn integer_shrink_averages_blocks() {
        let taps = area_taps(6, 3);
        assert_eq!(taps[0], vec![(0, 0.5), (1, 0.5)]);
        assert_eq!(taps[2], vec![(4, 0.5), (5, 0.5)]);
    }

    #[test]
    fn fractional_shrink_weights_sum_to_one() {
        for (src, dst) in [(5, 3), (7, 2), (46, 20), (10, 10)] {
            for taps in area_taps(src, dst) {
                assert!((weight_sum(&taps) - 1.0).abs() < 1e-9, "{src}->{dst}");
            }
        }
        let taps = area_taps(5, 3);
        assert_eq!(taps[0].len(), 2);
        assert!((taps[0][1].1 - 0.4).abs() < 1e-9);
    }

    #[test]
    fn integer_upscale_replicates_pixels() {
        let taps = linear_area_taps(2, 4);
        let sources: Vec<(usize, f64)> = taps.iter().map(|t| t[0]).collect();
        assert_eq!(sources, vec![(0, 1.0), (0, 1.0), (1, 1.0), (1, 1.0)]);
    }

    #[test]
    fn fractional_upscale_blends_neighbours() {
        let taps = linear_area_taps(2, 3);
        for t in &taps {
            assert!((weight_sum(t) - 1.0).abs() < 1e-9);
        }
        assert_eq!(taps[0][0], (0, 1.0));
        assert!((taps[1][1].1 - 0.5).abs() < 1e-9);
    }
}
