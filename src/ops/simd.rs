//! SIMD row helpers using the `wide` crate.

use wide::{f32x8, CmpLt};

const LANES: usize = 8;

#[inline]
fn load_f32x8(slice: &[f32]) -> f32x8 {
    f32x8::from([
        slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
    ])
}

/// Lane-wise `dst = max(dst, src)`, eight elements at a time.
///
/// A lane is replaced only when `dst < src`, so NaN lanes resolve the same
/// way as the scalar row max.
pub(crate) fn max_assign_row_f32(dst: &mut [f32], src: &[f32]) {
    let len = dst.len().min(src.len());
    let body = len - len % LANES;
    for i in (0..body).step_by(LANES) {
        let (d, s) = (load_f32x8(&dst[i..]), load_f32x8(&src[i..]));
        let merged = CmpLt::cmp_lt(d, s).blend(s, d);
        dst[i..i + LANES].copy_from_slice(&merged.to_array());
    }
    for i in body..len {
        if dst[i] < src[i] {
            dst[i] = src[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::max_assign_row_f32;

    #[test]
    fn matches_scalar_max_with_tail() {
        let mut dst: Vec<f32> = (0..19).map(|i| ((i * 7) % 5) as f32).collect();
        let src: Vec<f32> = (0..19).map(|i| ((i * 3) % 4) as f32).collect();
        let expected: Vec<f32> = dst.iter().zip(&src).map(|(a, b)| a.max(*b)).collect();
        max_assign_row_f32(&mut dst, &src);
        assert_eq!(dst, expected);
    }

    #[test]
    fn nan_lanes_follow_scalar_compare() {
        let mut dst = vec![f32::NAN, 1.0, 2.0, f32::NAN, 0.0, 0.0, 0.0, 0.0, f32::NAN];
        let src = vec![3.0, f32::NAN, 1.0, f32::NAN, 1.0, -1.0, 0.0, 5.0, 2.0];
        let mut scalar = dst.clone();
        for (d, &s) in scalar.iter_mut().zip(&src) {
            if *d < s {
                *d = s;
            }
        }
        max_assign_row_f32(&mut dst, &src);
        for (got, want) in dst.iter().zip(&scalar) {
            assert_eq!(got.to_bits(), want.to_bits());
        }
    }
}
