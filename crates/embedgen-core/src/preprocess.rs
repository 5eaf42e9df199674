//! CLIP ViT-B/32 pixel preprocessing.
//!
//! Centered square crop, resized to 224 (bicubic), scale to [0, 1],
//! per-channel normalization, CHW layout.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;

use crate::error::EmbedResult;

pub const CLIP_IMAGE_SIZE: u32 = 224;
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];

pub fn clip_pixel_values(img: &DynamicImage, size: u32) -> Vec<f32> {
    // Square crop before resizing: the resize target is always `size` x `size`.
    let (w, h) = (img.width(), img.height());
    let side = w.min(h).max(1);
    let cropped = img
        .crop_imm(w.saturating_sub(side) / 2, h.saturating_sub(side) / 2, side, side)
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut out = vec![0f32; 3 * plane];
    for (x, y, pixel) in cropped.enumerate_pixels() {
        let idx = (y * size + x) as usize;
        for c in 0..3 {
            out[c * plane + idx] = (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }
    out
}

pub fn load_clip_pixel_values(path: &Path) -> EmbedResult<Vec<f32>> {
    let img = image::open(path)?;
    Ok(clip_pixel_values(&img, CLIP_IMAGE_SIZE))
}
