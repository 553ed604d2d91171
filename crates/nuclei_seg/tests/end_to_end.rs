//! Train for one epoch on a tiny synthetic set, then segment the test split.

use image::{GrayImage, Luma, Rgb, RgbImage};
use nuclei_seg::{run_pipeline, AppArgs, RunConfig};
use std::fs;
use std::path::{Path, PathBuf};
use training::TrainingState;

const SIZE: u32 = 8;

fn write_sample(root: &Path, stem: &str) -> anyhow::Result<()> {
    let img = RgbImage::from_fn(SIZE, SIZE, |x, y| {
        Rgb([(x * 20 + y) as u8, (y * 15) as u8, ((x + y) * 7) as u8])
    });
    img.save(root.join(format!("{stem}.png")))?;
    let mask = GrayImage::from_fn(SIZE, SIZE, |x, y| {
        Luma([if (2..5).contains(&x) && (3..6).contains(&y) { 255 } else { 0 }])
    });
    mask.save(root.join(format!("{stem}_mask.png")))?;
    Ok(())
}

fn write_catalogs(root: &Path) -> anyhow::Result<RunConfig> {
    for stem in ["a", "b", "c"] {
        write_sample(root, stem)?;
    }
    fs::write(
        root.join("train.csv"),
        "Image,Label,ID,Width,Height\na.png,a_mask.png,a,,\nb.png,b_mask.png,b,,\n",
    )?;
    fs::write(
        root.join("val.csv"),
        "Image,Label,ID,Width,Height\nc.png,c_mask.png,c,,\n",
    )?;
    fs::write(
        root.join("test.csv"),
        "Image,Label,ID,Width,Height\nc.png,,t1,6,5\n",
    )?;
    Ok(RunConfig {
        inputs_root: root.to_path_buf(),
        train_catalog: root.join("train.csv"),
        val_catalog: root.join("val.csv"),
        test_catalog: root.join("test.csv"),
        cache_dir: root.join("cache"),
        outputs_root: root.join("runs"),
        test_group: "stage_2_test".into(),
        tile_size: 4,
        threshold: 0.5,
        checkpoint_every: 1,
        base_channels: 2,
        depth: 2,
        seed: Some(3),
    })
}

fn args(output: &str, skip_inference: bool) -> AppArgs {
    AppArgs {
        output: output.into(),
        epochs: 1,
        lr: 1e-3,
        decay: 20,
        config: None,
        skip_inference,
    }
}

#[test]
fn pipeline_writes_model_predictions_and_submission() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_catalogs(dir.path())?;

    let summary = run_pipeline(&args("run1", false), &cfg)?;
    let out: PathBuf = dir.path().join("runs/run1");
    assert_eq!(summary.output, out);
    assert_eq!(summary.training.state, TrainingState::Completed);
    assert_eq!(summary.training.epochs_run, 1);
    assert!(out.join("unet-final.bin").exists());
    assert!(out.join("unet-1/model.bin").exists());

    let inference = summary.inference.expect("inference ran");
    assert_eq!(inference.images, 1);
    let png = out.join("stage_2_test/t1_pred.png");
    let pred = image::open(&png)?.to_luma8();
    assert_eq!(pred.dimensions(), (6, 5));
    let csv = fs::read_to_string(out.join("stage_2_test_sub.csv"))?;
    assert!(csv.starts_with("ImageId,EncodedPixels\n"));
    assert_eq!(csv.lines().count(), 1 + inference.instances);

    for split in ["train", "val", "test"] {
        assert!(cfg.cache_dir.join(format!("{split}.bin")).exists());
    }
    Ok(())
}

#[test]
fn skip_inference_stops_after_training() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_catalogs(dir.path())?;

    let summary = run_pipeline(&args("run2", true), &cfg)?;
    assert!(summary.inference.is_none());
    assert!(summary.output.join("unet-final.bin").exists());
    assert!(!summary.output.join("stage_2_test_sub.csv").exists());
    Ok(())
}

#[test]
fn zero_decay_pace_is_rejected_before_training() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let cfg = write_catalogs(dir.path())?;
    let mut bad = args("run3", true);
    bad.decay = 0;

    assert!(run_pipeline(&bad, &cfg).is_err());
    assert!(!dir.path().join("runs/run3/unet-final.bin").exists());
    Ok(())
}
