use crate::driver::Predictor;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use models::{UNet, UNetConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Knobs for turning logits into a binary mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceSettings {
    pub tile_size: usize,
    /// Probabilities strictly above this are foreground.
    pub threshold: f32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            tile_size: vision_core::DEFAULT_TILE_SIZE,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model weights not found at {0}")]
    Missing(PathBuf),
    #[error("failed to load model weights {path}: {source}")]
    Recorder {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },
}

/// Builds predictors from saved U-Net weights.
pub struct InferenceFactory;

impl InferenceFactory {
    pub fn load_model<B: Backend>(
        &self,
        cfg: UNetConfig,
        weights: &Path,
        device: &B::Device,
    ) -> Result<UNet<B>, ModelLoadError> {
        if !weights.exists() {
            return Err(ModelLoadError::Missing(weights.to_path_buf()));
        }
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        UNet::<B>::new(cfg, device)
            .load_file(weights.to_path_buf(), &recorder, device)
            .map_err(|source| ModelLoadError::Recorder {
                path: weights.to_path_buf(),
                source,
            })
    }

    pub fn build<B: Backend>(
        &self,
        cfg: UNetConfig,
        settings: InferenceSettings,
        weights: &Path,
        device: &B::Device,
    ) -> Result<Predictor<B>, ModelLoadError> {
        let model = self.load_model::<B>(cfg, weights, device)?;
        log::info!("loaded model weights from {}", weights.display());
        Ok(Predictor::new(model, settings, device.clone()))
    }
}
