//! Face crop normalization.
//!
//! Crops are cut from a grayscale frame and resized with area averaging:
//! each output pixel is the coverage-weighted mean of the source pixels its
//! footprint overlaps, which avoids aliasing when shrinking large faces.

use crate::types::BoundingBox;
use image::{GrayImage, Luma};
use std::path::Path;

/// Load any supported image file as 8-bit grayscale.
pub fn load_gray(path: &Path) -> Result<GrayImage, image::ImageError> {
    Ok(image::open(path)?.to_luma8())
}

/// Crop `face` out of `gray` and resize it to `size`×`size`.
///
/// The box is clamped to the image first. Returns `None` when nothing of the
/// box lies inside the image.
pub fn normalize_face(gray: &GrayImage, face: &BoundingBox, size: u32) -> Option<GrayImage> {
    let region = face.clamp_to(gray.width(), gray.height())?;
    let crop = image::imageops::crop_imm(
        gray,
        region.x as u32,
        region.y as u32,
        region.width,
        region.height,
    )
    .to_image();
    Some(resize_area(&crop, size, size))
}

/// Source pixel indices and their coverage weights for one output pixel.
type Footprint = Vec<(u32, f32)>;

/// Per-axis footprints: output index `i` covers source range `[i*scale, (i+1)*scale)`.
fn footprints(src_len: u32, dst_len: u32) -> Vec<Footprint> {
    let scale = src_len as f32 / dst_len as f32;

    (0..dst_len)
        .map(|i| {
            let start = i as f32 * scale;
            let end = start + scale;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src_len);

            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(s as f32 + 1.0) - start.max(s as f32);
                    (overlap > 0.0).then_some((s, overlap))
                })
                .collect()
        })
        .collect()
}

/// Resize a grayscale image using area averaging.
pub fn resize_area(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = src.dimensions();
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }
    if (src_w, src_h) == (width, height) {
        return src.clone();
    }

    let cols = footprints(src_w, width);
    let rows = footprints(src_h, height);

    let mut out = GrayImage::new(width, height);
    for (oy, row) in rows.iter().enumerate() {
        for (ox, col) in cols.iter().enumerate() {
            let mut acc = 0.0f32;
            let mut weight = 0.0f32;
            for &(sy, wy) in row {
                for &(sx, wx) in col {
                    let w = wx * wy;
                    acc += src.get_pixel(sx, sy)[0] as f32 * w;
                    weight += w;
                }
            }
            let val = if weight > 0.0 { acc / weight } else { 0.0 };
            out.put_pixel(ox as u32, oy as u32, Luma([val.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}
