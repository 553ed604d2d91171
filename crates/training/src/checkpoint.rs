//! Checkpoint persistence.
//!
//! A checkpoint is a directory `<output>/unet-<epoch>/` holding `model.bin`, `optim.bin`
//! (both via `BinFileRecorder<FullPrecisionSettings>`), and `meta.json`.

use crate::controller::LossHistory;
use burn::module::{AutodiffModule, Module};
use burn::optim::Optimizer;
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder, RecorderError};
use burn::tensor::backend::AutodiffBackend;
use models::UNet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FINAL_MODEL_STEM: &str = "unet-final";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("recorder error at {path}: {source}")]
    Recorder {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },
    #[error("metadata error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    /// Number of completed epochs.
    pub epoch: usize,
    /// Learning rate in effect when the checkpoint was written.
    pub learning_rate: f64,
    pub history: LossHistory,
}

pub fn checkpoint_dir(output: &Path, epoch: usize) -> PathBuf {
    output.join(format!("unet-{epoch}"))
}

/// Path of the final model file, including the recorder's `.bin` extension.
pub fn final_model_path(output: &Path) -> PathBuf {
    output.join(format!("{FINAL_MODEL_STEM}.bin"))
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> {
    BinFileRecorder::<FullPrecisionSettings>::new()
}

fn create_dir(path: &Path) -> Result<(), CheckpointError> {
    fs::create_dir_all(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write model parameters, optimizer state, and metadata for one epoch boundary.
pub fn save_checkpoint<B, O>(
    output: &Path,
    model: &UNet<B>,
    optim: &O,
    meta: &CheckpointMeta,
) -> Result<PathBuf, CheckpointError>
where
    B: AutodiffBackend,
    O: Optimizer<UNet<B>, B>,
{
    let dir = checkpoint_dir(output, meta.epoch);
    create_dir(&dir)?;
    let recorder = recorder();

    let model_path = dir.join("model");
    model
        .clone()
        .save_file(model_path.clone(), &recorder)
        .map_err(|source| CheckpointError::Recorder {
            path: model_path,
            source,
        })?;

    let optim_path = dir.join("optim");
    Recorder::<B>::record(&recorder, optim.to_record(), optim_path.clone()).map_err(|source| {
        CheckpointError::Recorder {
            path: optim_path,
            source,
        }
    })?;

    let meta_path = dir.join("meta.json");
    let data = serde_json::to_vec_pretty(meta).map_err(|source| CheckpointError::Json {
        path: meta_path.clone(),
        source,
    })?;
    fs::write(&meta_path, data).map_err(|source| CheckpointError::Io {
        path: meta_path,
        source,
    })?;
    Ok(dir)
}

/// Write the trained parameters as `<output>/unet-final.bin`.
pub fn save_final_model<B: AutodiffBackend>(
    output: &Path,
    model: &UNet<B>,
) -> Result<PathBuf, CheckpointError> {
    create_dir(output)?;
    let path = final_model_path(output);
    model
        .valid()
        .save_file(output.join(FINAL_MODEL_STEM), &recorder())
        .map_err(|source| CheckpointError::Recorder {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

pub fn load_meta(dir: &Path) -> Result<CheckpointMeta, CheckpointError> {
    let path = dir.join("meta.json");
    let raw = fs::read(&path).map_err(|source| CheckpointError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&raw).map_err(|source| CheckpointError::Json { path, source })
}
