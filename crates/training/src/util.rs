use burn::backend::Autodiff;
use burn::optim::AdamConfig;
use burn::tensor::backend::AutodiffBackend;
use burn_dataset::{load_or_build, Dataset};
use clap::{Parser, ValueEnum};
use data_contracts::DatasetMode;
use models::{UNet, UNetConfig};
use std::fs;
use std::path::{Path, PathBuf};

use crate::checkpoint::save_final_model;
use crate::controller::{ControllerConfig, TrainingController, TrainingOutcome};
use crate::plot::write_loss_artifacts;
use crate::runner::SegmentationRunner;
use crate::schedule::StepDecay;
use crate::TrainBackend;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "train", about = "Train the nucleus segmentation U-Net on tiled images")]
pub struct TrainArgs {
    /// Output directory for checkpoints, the final model, and loss curves.
    #[arg(long, default_value = "run")]
    pub output: PathBuf,
    /// Number of epochs.
    #[arg(long, default_value_t = 50)]
    pub epochs: usize,
    /// Initial learning rate.
    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,
    /// Epochs per factor-of-ten learning-rate decay.
    #[arg(long, default_value_t = 20)]
    pub decay: usize,
    /// Training catalog (Image, Label, ID).
    #[arg(long, default_value = "inputs/stage_1_train/samples.csv")]
    pub train_catalog: PathBuf,
    /// Validation catalog (Image, Label, ID).
    #[arg(long, default_value = "inputs/stage_1_test/vsamples.csv")]
    pub val_catalog: PathBuf,
    /// Directory holding per-split dataset caches.
    #[arg(long, default_value = "inputs/cropped")]
    pub cache_dir: PathBuf,
    /// Tile edge length; image dimensions must be multiples of it.
    #[arg(long, default_value_t = vision_core::DEFAULT_TILE_SIZE)]
    pub tile_size: usize,
    /// Write a checkpoint every N epochs.
    #[arg(long, default_value_t = 10)]
    pub checkpoint_every: usize,
    /// Channels at the first encoder level.
    #[arg(long, default_value_t = 16)]
    pub base_channels: usize,
    /// Encoder levels.
    #[arg(long, default_value_t = 7)]
    pub depth: usize,
    /// Shuffle the training order per epoch with this seed.
    #[arg(long)]
    pub seed: Option<u64>,
    /// Backend to use (ndarray or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
}

/// Knobs for one training run, independent of where the datasets came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub output: PathBuf,
    pub epochs: usize,
    pub schedule: StepDecay,
    pub tile_size: usize,
    pub checkpoint_every: usize,
    pub model: UNetConfig,
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn options(&self) -> TrainOptions {
        TrainOptions {
            output: self.output.clone(),
            epochs: self.epochs,
            schedule: StepDecay::new(self.lr, self.decay),
            tile_size: self.tile_size,
            checkpoint_every: self.checkpoint_every,
            model: UNetConfig {
                base_channels: self.base_channels,
                depth: self.depth,
                ..Default::default()
            },
            seed: self.seed,
        }
    }
}

pub fn validate_options(opts: &TrainOptions) -> anyhow::Result<()> {
    if opts.schedule.pace == 0 {
        anyhow::bail!("learning-rate decay pace must be at least 1 epoch");
    }
    if opts.schedule.initial_lr.is_nan() || opts.schedule.initial_lr <= 0.0 {
        anyhow::bail!("initial learning rate must be positive");
    }
    if !opts.model.supports_tile(opts.tile_size) {
        anyhow::bail!(
            "tile size {} is not divisible by {} (required by a depth-{} network)",
            opts.tile_size,
            opts.model.min_tile_size(),
            opts.model.depth
        );
    }
    Ok(())
}

/// Train a fresh U-Net on already-loaded datasets.
///
/// Writes checkpoints, the final model, and loss curves under `opts.output`.
pub fn train_model<B: AutodiffBackend>(
    train: &Dataset,
    val: &Dataset,
    opts: &TrainOptions,
    device: &B::Device,
) -> anyhow::Result<(UNet<B>, TrainingOutcome)> {
    validate_options(opts)?;
    if train.is_empty() {
        anyhow::bail!("training set is empty");
    }
    if val.is_empty() {
        log::warn!("validation set is empty; early stopping will watch training loss only");
    }
    fs::create_dir_all(&opts.output)?;

    let model = UNet::<B>::new(opts.model, device);
    let optim = AdamConfig::new().init::<B, UNet<B>>();
    let mut runner = SegmentationRunner::new(
        model,
        optim,
        train,
        val,
        opts.tile_size,
        opts.seed,
        opts.output.clone(),
        device.clone(),
    );
    let mut controller = TrainingController::new(ControllerConfig {
        epochs: opts.epochs,
        schedule: opts.schedule,
        checkpoint_every: opts.checkpoint_every,
    });
    let outcome = controller.run(&mut runner)?;
    log::info!(
        "training finished in state {:?} after {} epochs",
        outcome.state,
        outcome.epochs_run
    );

    write_loss_artifacts(&opts.output, &outcome.history)?;
    let model = runner.into_model();
    let path = save_final_model(&opts.output, &model)?;
    log::info!("saved final model to {}", path.display());
    Ok((model, outcome))
}

/// Load train/val splits through the dataset cache.
pub fn load_splits(
    train_catalog: &Path,
    val_catalog: &Path,
    cache_dir: &Path,
) -> anyhow::Result<(Dataset, Dataset)> {
    let train = load_or_build(train_catalog, cache_dir, DatasetMode::Train).map_err(|e| {
        anyhow::anyhow!("failed to load training set {}: {e}", train_catalog.display())
    })?;
    let val = load_or_build(val_catalog, cache_dir, DatasetMode::Val).map_err(|e| {
        anyhow::anyhow!("failed to load validation set {}: {e}", val_catalog.display())
    })?;
    Ok((train, val))
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<TrainingOutcome> {
    validate_backend_choice(args.backend)?;
    let opts = args.options();
    validate_options(&opts)?;
    let (train, val) = load_splits(&args.train_catalog, &args.val_catalog, &args.cache_dir)?;
    let device = <Autodiff<TrainBackend> as burn::tensor::backend::Backend>::Device::default();
    let (_, outcome) = train_model::<Autodiff<TrainBackend>>(&train, &val, &opts, &device)?;
    Ok(outcome)
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            log::warn!("built with backend-wgpu; training will still use the WGPU backend despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}
