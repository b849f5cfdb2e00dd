#![cfg(feature = "image-io")]

use image::{Rgb, RgbImage};
use posepeak::ingest::{append_nchw_batch, letterbox, letterbox_size};
use posepeak::{Executor, PosePeakError};

fn gradient(width: u32, height: u32, seed: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let base = (x as u8).wrapping_mul(7) ^ (y as u8).wrapping_mul(13) ^ seed;
        Rgb([base, base.wrapping_add(50), base.wrapping_add(100)])
    })
}

#[test]
fn batch_grows_by_three_planes_per_image() {
    let images: Vec<_> = (0..3).map(|i| gradient(6, 4, i * 17)).collect();
    let mut data = vec![-1.0f32; 5];
    append_nchw_batch(&mut data, &images, 0.5, false, &Executor::scoped(2)).unwrap();
    assert_eq!(data.len(), 5 + 3 * 6 * 4 * 3);
    assert!(data[..5].iter().all(|&v| v == -1.0));

    let pixels = 6 * 4;
    for (n, image) in images.iter().enumerate() {
        let base = 5 + n * 3 * pixels;
        for (i, px) in image.pixels().enumerate() {
            for c in 0..3 {
                assert_eq!(data[base + c * pixels + i], f32::from(px[c]) * 0.5);
            }
        }
    }
}

#[test]
fn flipped_batch_reverses_channel_planes() {
    let images = vec![gradient(5, 3, 1), gradient(5, 3, 2)];
    let pixels = 15;
    let mut plain = Vec::new();
    let mut flipped = Vec::new();
    append_nchw_batch(&mut plain, &images, 1.0 / 255.0, false, &Executor::Sequential).unwrap();
    append_nchw_batch(&mut flipped, &images, 1.0 / 255.0, true, &Executor::Sequential).unwrap();
    for n in 0..images.len() {
        let base = n * 3 * pixels;
        for c in 0..3 {
            let a = &plain[base + c * pixels..base + (c + 1) * pixels];
            let b = &flipped[base + (2 - c) * pixels..base + (3 - c) * pixels];
            assert_eq!(a, b);
        }
    }
}

#[test]
fn empty_batch_is_a_no_op() {
    let mut data = vec![1.0f32, 2.0];
    append_nchw_batch(&mut data, &[], 1.0, true, &Executor::Sequential).unwrap();
    assert_eq!(data, vec![1.0, 2.0]);
}

#[test]
fn mixed_sizes_are_rejected() {
    let images = vec![gradient(4, 4, 0), gradient(4, 5, 0)];
    let mut data = Vec::new();
    let err = append_nchw_batch(&mut data, &images, 1.0, false, &Executor::Sequential).unwrap_err();
    assert_eq!(
        err,
        PosePeakError::ImageSizeMismatch {
            index: 1,
            expected: (4, 4),
            got: (4, 5),
        }
    );
    assert!(data.is_empty());
}

#[test]
fn letterbox_hits_target_and_keeps_aspect() {
    let cases = [(640, 480), (480, 640), (100, 100), (960, 540), (37, 211)];
    let (tw, th) = (368u32, 256u32);
    for (w, h) in cases {
        let image = gradient(w, h, 3);
        let boxed = letterbox(&image, tw, th, Rgb([0, 0, 0])).unwrap();
        assert_eq!(boxed.dimensions(), (tw, th));

        let (sw, sh) = letterbox_size(w, h, tw, th);
        assert!(sw <= tw && sh <= th);
        assert!(sw == tw || sh == th);
        let aspect = f64::from(w) / f64::from(h);
        let err = if sh == th {
            f64::from(sw) - f64::from(th) * aspect
        } else {
            f64::from(sh) - f64::from(tw) / aspect
        };
        assert!(err.abs() <= 1.0, "{w}x{h} -> {sw}x{sh}");
    }
}

#[test]
fn letterbox_pads_bottom_and_right() {
    let image = RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]));
    let border = Rgb([9, 8, 7]);
    let boxed = letterbox(&image, 100, 100, border).unwrap();
    assert_eq!(letterbox_size(200, 100, 100, 100), (100, 50));
    assert_eq!(*boxed.get_pixel(0, 0), Rgb([255, 255, 255]));
    assert_eq!(*boxed.get_pixel(99, 49), Rgb([255, 255, 255]));
    assert_eq!(*boxed.get_pixel(0, 50), border);
    assert_eq!(*boxed.get_pixel(99, 99), border);
}

#[test]
fn letterbox_rejects_empty_images() {
    let image = RgbImage::new(0, 10);
    assert!(matches!(
        letterbox(&image, 10, 10, Rgb([0, 0, 0])),
        Err(PosePeakError::InvalidInput(_))
    ));
}
