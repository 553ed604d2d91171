//! End-to-end nucleus segmentation run: load cached splits, train the U-Net, and write
//! per-image masks plus a run-length encoded submission for the test set.

#![recursion_limit = "256"]

pub mod cli;
pub mod config;
pub mod pipeline;

pub use cli::AppArgs;
pub use config::RunConfig;
pub use pipeline::{output_dir, run_pipeline, train_options, RunSummary};

pub fn run_app(args: AppArgs) -> anyhow::Result<RunSummary> {
    let cfg = match &args.config {
        Some(path) => RunConfig::from_path(path)?,
        None => RunConfig::load(),
    };
    log::debug!("run config: {cfg:?}");
    run_pipeline(&args, &cfg)
}
