//! Integration tests for catalog → records → cache workflows.

use burn_dataset::{cache_path, load_or_build, DatasetError, Transform};
use data_contracts::DatasetMode;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// Write an `n`-row labelled catalog with 4x2 images and matching masks.
fn write_labelled_catalog(root: &Path, n: usize) -> anyhow::Result<std::path::PathBuf> {
    let mut csv = String::from("Image,Label,ID,Width,Height\n");
    for i in 0..n {
        let img = RgbImage::from_fn(4, 2, |x, y| Rgb([(x * 10 + y) as u8, 0, (i * 5) as u8]));
        img.save(root.join(format!("img_{i}.png")))?;
        let mask = GrayImage::from_fn(4, 2, |x, _| Luma([if x < 2 { 255 } else { 0 }]));
        mask.save(root.join(format!("mask_{i}.png")))?;
        csv.push_str(&format!("img_{i}.png,mask_{i}.png,sample_{i},,\n"));
    }
    let path = root.join("samples.csv");
    fs::write(&path, csv)?;
    Ok(path)
}

#[test]
fn training_records_hold_six_index_matched_variants() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog = write_labelled_catalog(dir.path(), 2)?;
    let dataset = load_or_build(&catalog, &dir.path().join("cache"), DatasetMode::Train)?;

    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.records[0].id, "sample_0");
    let record = &dataset.records[1];
    assert_eq!(record.variants(), 6);
    let labels = record.labels.as_ref().expect("labels");
    assert_eq!(labels.len(), 6);

    // Brightest value is rescaled to 255.
    let max = record.images[0].data.iter().copied().fold(0.0f32, f32::max);
    assert!((max - 255.0).abs() < 1e-4);

    // Label i is the label transformed like image i.
    let rot = Transform::Rot90.apply(&labels[0]);
    assert_eq!(labels[1], rot);
    assert_eq!((record.images[1].height, record.images[1].width), (4, 2));
    assert_eq!(labels[1].data[0], 0.0);
    assert_eq!(labels[1].data[7], 255.0);
    Ok(())
}

#[test]
fn cache_is_written_then_reused() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog = write_labelled_catalog(dir.path(), 1)?;
    let cache_dir = dir.path().join("cache");

    let first = load_or_build(&catalog, &cache_dir, DatasetMode::Val)?;
    assert!(cache_path(&cache_dir, DatasetMode::Val).exists());
    assert_eq!(first.records[0].variants(), 1);

    // Source images gone: only the cache can satisfy the second load.
    fs::remove_file(dir.path().join("img_0.png"))?;
    let second = load_or_build(&catalog, &cache_dir, DatasetMode::Val)?;
    assert_eq!(first.records, second.records);
    Ok(())
}

#[test]
fn stale_or_corrupt_cache_is_rebuilt() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let catalog = write_labelled_catalog(dir.path(), 1)?;
    let cache_dir = dir.path().join("cache");
    let path = cache_path(&cache_dir, DatasetMode::Val);

    load_or_build(&catalog, &cache_dir, DatasetMode::Val)?;
    fs::write(&path, b"NSC1garbage")?;
    let rebuilt = load_or_build(&catalog, &cache_dir, DatasetMode::Val)?;
    assert_eq!(rebuilt.len(), 1);

    // Editing the catalog changes the fingerprint.
    let extra = write_labelled_catalog(dir.path(), 2)?;
    let grown = load_or_build(&extra, &cache_dir, DatasetMode::Val)?;
    assert_eq!(grown.len(), 2);
    Ok(())
}

#[test]
fn test_records_keep_original_dims_and_no_labels() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])).save(dir.path().join("t.png"))?;
    let catalog = dir.path().join("samples.csv");
    fs::write(&catalog, "Image,ID,Width,Height\nt.png,t0,7,5\n")?;

    let dataset = load_or_build(&catalog, &dir.path().join("cache"), DatasetMode::Test)?;
    let record = &dataset.records[0];
    assert!(record.labels.is_none());
    assert_eq!(record.variants(), 1);
    let dims = record.original.expect("dims");
    assert_eq!((dims.width, dims.height), (7, 5));
    // All-black image stays zero instead of dividing by zero.
    assert!(record.images[0].data.iter().all(|v| *v == 0.0));
    Ok(())
}

#[test]
fn label_shape_mismatch_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    RgbImage::from_pixel(4, 4, Rgb([9, 9, 9])).save(dir.path().join("a.png"))?;
    GrayImage::from_pixel(4, 2, Luma([0])).save(dir.path().join("a_mask.png"))?;
    let catalog = dir.path().join("samples.csv");
    fs::write(&catalog, "Image,Label,ID\na.png,a_mask.png,a\n")?;

    let err = load_or_build(&catalog, &dir.path().join("cache"), DatasetMode::Train)
        .expect_err("mismatch");
    assert!(matches!(err, DatasetError::ShapeMismatch { .. }));
    Ok(())
}
