//! Tiled inference: partition, forward, sigmoid, threshold, reassemble, crop.

use crate::factory::InferenceSettings;
use crate::submission::SubmissionWriter;
use anyhow::Context;
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use burn_dataset::{ChwImage, Dataset};
use data_contracts::OriginalDims;
use models::UNet;
use std::path::{Path, PathBuf};
use vision_core::overlay::save_mask_png;
use vision_core::rle::BinaryMask;
use vision_core::{partition, reassemble, CropWindow};

/// Runs a trained U-Net over padded images without tracking gradients.
pub struct Predictor<B: Backend> {
    model: UNet<B>,
    settings: InferenceSettings,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    pub fn new(model: UNet<B>, settings: InferenceSettings, device: B::Device) -> Self {
        Self {
            model,
            settings,
            device,
        }
    }

    pub fn settings(&self) -> InferenceSettings {
        self.settings
    }

    /// Binarized `[1, 1, H, W]` mask at the padded size.
    pub fn predict_padded(&self, image: &ChwImage) -> anyhow::Result<Tensor<B, 4>> {
        let tile = self.settings.tile_size;
        let (tiles, grid) = partition(image.to_tensor::<B>(&self.device), tile)?;
        log::debug!("{} tiles ({}x{} grid)", grid.len(), grid.rows(), grid.cols());
        let masks = tiles
            .into_iter()
            .map(|t| {
                let logits = self.model.forward(t.unsqueeze::<4>());
                let [_, c, h, w] = logits.dims();
                sigmoid(logits)
                    .greater_elem(self.settings.threshold)
                    .float()
                    .reshape([c, h, w])
            })
            .collect();
        Ok(reassemble(masks, &grid)?)
    }

    /// Binarized mask cropped back to the image's original size.
    pub fn predict(&self, image: &ChwImage, original: OriginalDims) -> anyhow::Result<BinaryMask> {
        let padded = self.predict_padded(image)?;
        let [_, _, height, width] = padded.dims();
        let window = CropWindow::centered(
            height,
            width,
            original.width as usize,
            original.height as usize,
        )?;
        let cropped = window.apply_tensor(padded);
        let values = cropped
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("mask readback failed: {e:?}"))?;
        Ok(BinaryMask::from_probs(
            window.width(),
            window.height(),
            &values,
            0.5,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSummary {
    pub images: usize,
    pub instances: usize,
    pub submission: PathBuf,
    pub prediction_dir: PathBuf,
}

/// `<output>/<group>/<id>_pred.png`
pub fn prediction_path(output: &Path, group: &str, id: &str) -> PathBuf {
    output.join(group).join(format!("{id}_pred.png"))
}

/// `<output>/<group>_sub.csv`
pub fn submission_path(output: &Path, group: &str) -> PathBuf {
    output.join(format!("{group}_sub.csv"))
}

/// Predict every test record, writing one prediction image each and the submission CSV.
pub fn run_inference<B: Backend>(
    predictor: &Predictor<B>,
    dataset: &Dataset,
    output: &Path,
    group: &str,
) -> anyhow::Result<InferenceSummary> {
    let csv_path = submission_path(output, group);
    let mut submission = SubmissionWriter::create(&csv_path)?;
    let mut instances = 0;

    for record in &dataset.records {
        let original = record
            .original
            .with_context(|| format!("test sample {} has no original dimensions", record.id))?;
        let image = record
            .images
            .first()
            .with_context(|| format!("test sample {} has no image", record.id))?;
        let mask = predictor
            .predict(image, original)
            .with_context(|| format!("predicting {}", record.id))?;

        let png = prediction_path(output, group, &record.id);
        let values: Vec<f32> = mask.data.iter().map(|v| if *v { 1.0 } else { 0.0 }).collect();
        save_mask_png(&png, &values, mask.width as u32, mask.height as u32)
            .with_context(|| format!("writing {}", png.display()))?;

        let written = submission.write_mask(&record.id, &mask)?;
        log::debug!("{}: {} instances", record.id, written);
        instances += written;
    }
    submission.finish()?;
    log::info!(
        "wrote {} instances for {} images to {}",
        instances,
        dataset.len(),
        csv_path.display()
    );
    Ok(InferenceSummary {
        images: dataset.len(),
        instances,
        submission: csv_path,
        prediction_dir: output.join(group),
    })
}
