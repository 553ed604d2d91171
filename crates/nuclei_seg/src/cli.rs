use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "nuclei_seg",
    about = "Train a tiled U-Net on nucleus masks, then segment the test set"
)]
pub struct AppArgs {
    /// Output directory name (created under `outputs_root`).
    pub output: String,
    /// Number of training epochs.
    pub epochs: usize,
    /// Initial learning rate.
    pub lr: f64,
    /// Epochs per factor-of-ten learning-rate decay.
    pub decay: usize,
    /// Run configuration file (defaults to `$NUCLEI_SEG_CONFIG` or `nuclei-seg.toml`).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Stop after training; skip test-set inference.
    #[arg(long, default_value_t = false)]
    pub skip_inference: bool,
}
