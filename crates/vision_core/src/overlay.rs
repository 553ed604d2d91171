use image::{GrayImage, Luma};
use std::path::Path;

/// Render a row-major mask as 8-bit grayscale, scaled so the max value maps to 255.
/// An all-zero (or empty) mask renders black.
pub fn mask_to_luma(values: &[f32], width: u32, height: u32) -> GrayImage {
    let max = values.iter().copied().fold(0.0f32, f32::max);
    GrayImage::from_fn(width, height, |x, y| {
        let v = values
            .get((y * width + x) as usize)
            .copied()
            .unwrap_or(0.0);
        if max <= 0.0 {
            Luma([0])
        } else {
            Luma([((v / max) * 255.0).clamp(0.0, 255.0) as u8])
        }
    })
}

/// Write a mask PNG, creating parent directories as needed.
pub fn save_mask_png(
    path: &Path,
    values: &[f32],
    width: u32,
    height: u32,
) -> Result<(), image::ImageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(image::ImageError::IoError)?;
    }
    mask_to_luma(values, width, height).save(path)
}
