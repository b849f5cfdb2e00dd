//! Aspect-preserving resize with constant padding.

use crate::util::{PosePeakError, PosePeakResult};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Size of the scaled image inside a `target_width x target_height`
/// letterbox.
///
/// The image is scaled to the full target width if the resulting height
/// fits, otherwise to the full target height. Fractional sizes truncate and
/// never drop below one pixel.
pub fn letterbox_size(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> (u32, u32) {
    let scaled_height = f64::from(target_width) * (f64::from(height) / f64::from(width));
    if scaled_height <= f64::from(target_height) {
        (target_width, (scaled_height as u32).max(1))
    } else {
        let scaled_width = f64::from(target_height) * (f64::from(width) / f64::from(height));
        ((scaled_width as u32).clamp(1, target_width), target_height)
    }
}

/// Resizes `image` into a `target_width x target_height` canvas without
/// distorting it, filling the right and bottom margins with `border`.
pub fn letterbox(
    image: &RgbImage,
    target_width: u32,
    target_height: u32,
    border: Rgb<u8>,
) -> PosePeakResult<RgbImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PosePeakError::InvalidInput("letterbox source image is empty"));
    }
    if target_width == 0 || target_height == 0 {
        return Err(PosePeakError::InvalidInput("letterbox target size is empty"));
    }
    let (w, h) = letterbox_size(width, height, target_width, target_height);
    let scaled = imageops::resize(image, w, h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(target_width, target_height, border);
    imageops::replace(&mut canvas, &scaled, 0, 0);
    Ok(canvas)
}
