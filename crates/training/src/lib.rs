//! Training for the nucleus segmentation U-Net.
//!
//! The [`controller::TrainingController`] owns the epoch loop (step decay, checkpoint cadence,
//! early stopping); [`runner::SegmentationRunner`] does the per-tile work against a burn
//! autodiff backend.

#![recursion_limit = "256"]

pub mod checkpoint;
pub mod controller;
pub mod loss;
pub mod metric;
pub mod plot;
pub mod runner;
pub mod schedule;
pub mod util;

pub use checkpoint::{save_checkpoint, save_final_model, CheckpointError, CheckpointMeta};
pub use controller::{
    ControllerConfig, EpochReport, EpochRunner, LossHistory, TrainingController, TrainingOutcome,
    TrainingState,
};
pub use loss::{bce_with_logits, LossWeighting};
pub use metric::{ppv_score, RunningMean};
pub use runner::SegmentationRunner;
pub use schedule::StepDecay;
pub use util::{run_train, train_model, TrainArgs, TrainOptions};

/// Backend alias for training (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;
