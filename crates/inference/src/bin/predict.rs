use burn_dataset::load_or_build;
use clap::Parser;
use data_contracts::DatasetMode;
use inference::{run_inference, InferenceBackend, InferenceFactory, InferenceSettings};
use models::UNetConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "predict", about = "Segment test images with a trained U-Net and write a submission")]
struct Args {
    /// Trained weights (e.g. `<output>/unet-final.bin`).
    #[arg(long)]
    model: PathBuf,
    /// Test catalog (Image, ID, Width, Height).
    #[arg(long, default_value = "inputs/stage_2_test/samples.csv")]
    catalog: PathBuf,
    /// Directory holding per-split dataset caches.
    #[arg(long, default_value = "inputs/cropped")]
    cache_dir: PathBuf,
    /// Output directory for prediction images and the submission CSV.
    #[arg(long, default_value = ".")]
    output: PathBuf,
    /// Name used for the prediction subdirectory and `<group>_sub.csv`.
    #[arg(long, default_value = "stage_2_test")]
    group: String,
    #[arg(long, default_value_t = vision_core::DEFAULT_TILE_SIZE)]
    tile_size: usize,
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
    #[arg(long, default_value_t = 16)]
    base_channels: usize,
    #[arg(long, default_value_t = 7)]
    depth: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let device = <InferenceBackend as burn::tensor::backend::Backend>::Device::default();
    let cfg = UNetConfig {
        base_channels: args.base_channels,
        depth: args.depth,
        ..Default::default()
    };
    let settings = InferenceSettings {
        tile_size: args.tile_size,
        threshold: args.threshold,
    };
    let predictor =
        InferenceFactory.build::<InferenceBackend>(cfg, settings, &args.model, &device)?;
    let dataset = load_or_build(&args.catalog, &args.cache_dir, DatasetMode::Test)?;
    let summary = run_inference(&predictor, &dataset, &args.output, &args.group)?;
    log::info!(
        "{} images, {} instances -> {}",
        summary.images,
        summary.instances,
        summary.submission.display()
    );
    Ok(())
}
