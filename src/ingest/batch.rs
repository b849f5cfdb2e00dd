//! Planar float batches from interleaved RGB images.

use crate::parallel::Executor;
use crate::trace::trace_span;
use crate::util::{PosePeakError, PosePeakResult};
use image::RgbImage;

const KEEP_ORDER: [usize; 3] = [0, 1, 2];
const SWAP_RB: [usize; 3] = [2, 1, 0];

/// Appends `images` to `data` as an NCHW float batch.
///
/// Each image adds `3 * height * width` values: its three channel planes in
/// order, each value `pixel[c] as f32 * factor`. With `flip_rb` the planes
/// are written blue, green, red. All images must share the size of the
/// first one; an empty slice leaves `data` untouched.
pub fn append_nchw_batch(
    data: &mut Vec<f32>,
    images: &[RgbImage],
    factor: f32,
    flip_rb: bool,
    executor: &Executor,
) -> PosePeakResult<()> {
    let Some(first) = images.first() else {
        return Ok(());
    };
    let expected = first.dimensions();
    for (index, image) in images.iter().enumerate() {
        let got = image.dimensions();
        if got != expected {
            return Err(PosePeakError::ImageSizeMismatch {
                index,
                expected,
                got,
            });
        }
    }
    let _span = trace_span!("append_nchw_batch", images = images.len()).entered();

    let pixels = expected.0 as usize * expected.1 as usize;
    let per_image = 3 * pixels;
    if per_image == 0 {
        return Ok(());
    }
    let start = data.len();
    data.resize(start + per_image * images.len(), 0.0);

    let order = if flip_rb { SWAP_RB } else { KEEP_ORDER };
    executor.for_each_chunk_mut(&mut data[start..], per_image, |i, out| {
        let raw = images[i].as_raw();
        for (plane, &c) in out.chunks_mut(pixels).zip(order.iter()) {
            for (dst, px) in plane.iter_mut().zip(raw.chunks_exact(3)) {
                *dst = f32::from(px[c]) * factor;
            }
        }
    });
    Ok(())
}
