//! Train, then segment the test set with the freshly trained network.

use std::path::PathBuf;

use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::tensor::backend::Backend;
use burn_dataset::load_or_build;
use data_contracts::DatasetMode;
use inference::{run_inference, InferenceSettings, InferenceSummary, Predictor};
use models::UNetConfig;
use training::util::{load_splits, train_model};
use training::{StepDecay, TrainBackend, TrainOptions, TrainingOutcome};

use crate::cli::AppArgs;
use crate::config::RunConfig;

#[derive(Debug)]
pub struct RunSummary {
    pub output: PathBuf,
    pub training: TrainingOutcome,
    pub inference: Option<InferenceSummary>,
}

/// `<outputs_root>/<output>`
pub fn output_dir(args: &AppArgs, cfg: &RunConfig) -> PathBuf {
    cfg.outputs_root.join(&args.output)
}

pub fn train_options(args: &AppArgs, cfg: &RunConfig) -> TrainOptions {
    TrainOptions {
        output: output_dir(args, cfg),
        epochs: args.epochs,
        schedule: StepDecay::new(args.lr, args.decay),
        tile_size: cfg.tile_size,
        checkpoint_every: cfg.checkpoint_every,
        model: UNetConfig {
            base_channels: cfg.base_channels,
            depth: cfg.depth,
            ..Default::default()
        },
        seed: cfg.seed,
    }
}

pub fn run_pipeline(args: &AppArgs, cfg: &RunConfig) -> anyhow::Result<RunSummary> {
    let opts = train_options(args, cfg);
    log::info!(
        "run {}: {} epochs, lr {}, decay every {} epochs",
        opts.output.display(),
        args.epochs,
        args.lr,
        args.decay
    );

    let (train, val) = load_splits(&cfg.train_catalog, &cfg.val_catalog, &cfg.cache_dir)?;
    log::info!(
        "loaded {} training and {} validation samples",
        train.len(),
        val.len()
    );
    let device = <Autodiff<TrainBackend> as Backend>::Device::default();
    let (model, training) = train_model::<Autodiff<TrainBackend>>(&train, &val, &opts, &device)?;

    if args.skip_inference {
        log::info!("skipping test-set inference");
        return Ok(RunSummary {
            output: opts.output,
            training,
            inference: None,
        });
    }

    let test = load_or_build(&cfg.test_catalog, &cfg.cache_dir, DatasetMode::Test)
        .with_context(|| format!("failed to load test set {}", cfg.test_catalog.display()))?;
    let settings = InferenceSettings {
        tile_size: cfg.tile_size,
        threshold: cfg.threshold,
    };
    let predictor = Predictor::<TrainBackend>::new(model.valid(), settings, device);
    let summary = run_inference(&predictor, &test, &opts.output, &cfg.test_group)?;

    Ok(RunSummary {
        output: opts.output,
        training,
        inference: Some(summary),
    })
}
