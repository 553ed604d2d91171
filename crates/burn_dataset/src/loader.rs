//! Decoding catalog rows into normalized sample records.

use crate::aug::augment;
use crate::types::{ChwImage, DatasetError, DatasetResult, SampleRecord};
use data_contracts::{CatalogRow, DatasetMode};
use rayon::prelude::*;
use std::path::Path;

/// Decode an image as RGB CHW f32, rescaled so its brightest value becomes 255.
///
/// The brightest value is taken over every decoded channel, alpha included, before alpha
/// is dropped.
pub fn decode_image(path: &Path) -> DatasetResult<ChwImage> {
    let decoded = image::open(path).map_err(|e| DatasetError::Image {
        path: path.to_path_buf(),
        source: e,
    })?;
    let alpha_peak = if decoded.color().has_alpha() {
        decoded.to_rgba8().pixels().map(|px| px[3]).max().unwrap_or(0) as f32
    } else {
        0.0
    };
    let rgb = decoded.to_rgb8();
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut chw = ChwImage::zeros(3, h, w);
    for (x, y, px) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let idx = chw.index(c, y as usize, x as usize);
            chw.data[idx] = px[c] as f32;
        }
    }
    let peak = chw.data.iter().copied().fold(alpha_peak, f32::max);
    scale_to_peak(&mut chw.data, peak);
    Ok(chw)
}

/// Decode a label mask as single-channel CHW f32 in 0..=255.
pub fn decode_label(path: &Path) -> DatasetResult<ChwImage> {
    let luma = image::open(path)
        .map_err(|e| DatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_luma8();
    let (w, h) = (luma.width() as usize, luma.height() as usize);
    let data = luma.as_raw().iter().map(|v| *v as f32).collect();
    Ok(ChwImage::new(1, h, w, data))
}

/// Rescale in place to `v / max * 255`. All-zero buffers are left untouched.
pub fn normalize_to_max(data: &mut [f32]) {
    let max = data.iter().copied().fold(0.0f32, f32::max);
    scale_to_peak(data, max);
}

/// Rescale in place to `v / peak * 255`; a non-positive peak leaves the data alone.
fn scale_to_peak(data: &mut [f32], peak: f32) {
    if peak <= 0.0 {
        return;
    }
    let scale = 255.0 / peak;
    data.iter_mut().for_each(|v| *v *= scale);
}

/// Build the record for one catalog row. Training rows expand into six variants.
pub fn load_record(row: &CatalogRow, mode: DatasetMode) -> DatasetResult<SampleRecord> {
    let image = decode_image(&row.image)?;
    let label = match (&row.label, mode.is_labelled()) {
        (Some(path), true) => {
            let label = decode_label(path)?;
            if (label.height, label.width) != (image.height, image.width) {
                return Err(DatasetError::ShapeMismatch {
                    id: row.id.clone(),
                    image_w: image.width as u32,
                    image_h: image.height as u32,
                    label_w: label.width as u32,
                    label_h: label.height as u32,
                });
            }
            Some(label)
        }
        _ => None,
    };

    let (images, labels) = if mode.augments() {
        (augment(&image), label.as_ref().map(augment))
    } else {
        (vec![image], label.map(|l| vec![l]))
    };

    Ok(SampleRecord {
        id: row.id.clone(),
        images,
        labels,
        original: row.original_dims(),
    })
}

/// Decode every row in parallel; output order follows catalog order.
pub fn load_records(rows: &[CatalogRow], mode: DatasetMode) -> DatasetResult<Vec<SampleRecord>> {
    rows.par_iter().map(|row| load_record(row, mode)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_maps_max_to_255() {
        let mut data = vec![0.0, 10.0, 20.0, 40.0];
        normalize_to_max(&mut data);
        assert_eq!(data, vec![0.0, 63.75, 127.5, 255.0]);

        let mut dark = vec![0.0; 3];
        normalize_to_max(&mut dark);
        assert_eq!(dark, vec![0.0; 3]);
    }

    #[test]
    fn alpha_channel_counts_toward_the_brightest_value() {
        let dir = tempfile::tempdir().unwrap();

        // Opaque alpha at 255 caps the scale: a dim RGBA image stays unscaled.
        let rgba =
            image::RgbaImage::from_fn(2, 2, |x, _| image::Rgba([(x * 50) as u8, 100, 0, 255]));
        let rgba_path = dir.path().join("dim_rgba.png");
        rgba.save(&rgba_path).unwrap();
        let decoded = decode_image(&rgba_path).unwrap();
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.get(1, 0, 0), 100.0);
        assert_eq!(decoded.get(0, 0, 1), 50.0);

        // Without alpha the same pixels are stretched to 255.
        let rgb = image::RgbImage::from_fn(2, 2, |x, _| image::Rgb([(x * 50) as u8, 100, 0]));
        let rgb_path = dir.path().join("dim_rgb.png");
        rgb.save(&rgb_path).unwrap();
        let decoded = decode_image(&rgb_path).unwrap();
        assert!((decoded.get(1, 0, 0) - 255.0).abs() < 1e-3);
        assert!((decoded.get(0, 0, 1) - 127.5).abs() < 1e-3);
    }
}
