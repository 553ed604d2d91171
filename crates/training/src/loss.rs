//! Adaptive per-tile loss weighting and weighted BCE-with-logits.
//!
//! Each label tile is classified by its foreground/background pixel ratio:
//! - `0 < ratio < 1` (foreground minority): `w = (label / 255 + 1 / (1 / ratio - 1)) * 100`
//! - `ratio > 1` (foreground majority): `w = (label / 255 + 1 / (ratio - 1)) * 100`
//! - `ratio == 0` or `ratio == 1`: unweighted mean loss
//!
//! A tile with no background pixels has an infinite ratio and lands in the majority branch
//! with a zero offset.

use burn::tensor::{backend::Backend, Tensor, TensorData};

/// Scale applied to every weight.
pub const WEIGHT_SCALE: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossWeighting {
    Uniform,
    /// Foreground is the rarer class.
    Minority { ratio: f64 },
    /// Foreground is the more common class.
    Majority { ratio: f64 },
}

/// Foreground pixel count over background pixel count. Foreground is any value above zero.
pub fn foreground_ratio(label: &[f32]) -> f64 {
    let positive = label.iter().filter(|v| **v > 0.0).count();
    let negative = label.len() - positive;
    if negative == 0 {
        if positive == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        positive as f64 / negative as f64
    }
}

impl LossWeighting {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.0 && ratio < 1.0 {
            LossWeighting::Minority { ratio }
        } else if ratio > 1.0 {
            LossWeighting::Majority { ratio }
        } else {
            LossWeighting::Uniform
        }
    }

    /// Classify a raw label tile (values 0..=255).
    pub fn from_label(label: &[f32]) -> Self {
        Self::from_ratio(foreground_ratio(label))
    }

    /// Constant added to `label / 255` before scaling.
    pub fn offset(&self) -> Option<f64> {
        match *self {
            LossWeighting::Uniform => None,
            LossWeighting::Minority { ratio } => Some(1.0 / (1.0 / ratio - 1.0)),
            LossWeighting::Majority { ratio } => Some(1.0 / (ratio - 1.0)),
        }
    }

    /// Per-pixel weights for a raw label tile, or `None` for the uniform branch.
    pub fn weights(&self, label: &[f32]) -> Option<Vec<f32>> {
        let offset = self.offset()?;
        Some(
            label
                .iter()
                .map(|v| ((*v as f64 / 255.0 + offset) * WEIGHT_SCALE as f64) as f32)
                .collect(),
        )
    }
}

/// Mean of `w * (max(x, 0) - x * y + ln(1 + exp(-|x|)))` over all elements.
pub fn bce_with_logits<B: Backend>(
    logits: Tensor<B, 4>,
    targets: Tensor<B, 4>,
    weights: Option<Tensor<B, 4>>,
) -> Tensor<B, 1> {
    let per_pixel = logits.clone().clamp_min(0.0) - logits.clone() * targets
        + logits.abs().neg().exp().log1p();
    match weights {
        Some(w) => (per_pixel * w).mean(),
        None => per_pixel.mean(),
    }
}

/// Loss for one `[1, 1, T, T]` logit tile against a raw label tile.
pub fn tile_loss<B: Backend>(
    logits: Tensor<B, 4>,
    label: &[f32],
    device: &B::Device,
) -> Tensor<B, 1> {
    let shape = logits.dims();
    let targets = Tensor::<B, 4>::from_data(
        TensorData::new(label.iter().map(|v| v / 255.0).collect::<Vec<f32>>(), shape),
        device,
    );
    let weights = LossWeighting::from_label(label)
        .weights(label)
        .map(|w| Tensor::<B, 4>::from_data(TensorData::new(w, shape), device));
    bce_with_logits(logits, targets, weights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    fn label_with(positive: usize, total: usize) -> Vec<f32> {
        (0..total)
            .map(|i| if i < positive { 255.0 } else { 0.0 })
            .collect()
    }

    #[test]
    fn degenerate_ratios_select_uniform_branch() {
        assert_eq!(LossWeighting::from_label(&label_with(0, 8)), LossWeighting::Uniform);
        assert_eq!(LossWeighting::from_label(&label_with(4, 8)), LossWeighting::Uniform);
        assert!(LossWeighting::Uniform.weights(&label_with(4, 8)).is_none());
    }

    #[test]
    fn minority_foreground_weights_follow_formula() {
        // 2 positive, 4 negative -> ratio 0.5 -> offset 1 / (2 - 1) = 1
        let label = label_with(2, 6);
        let weighting = LossWeighting::from_label(&label);
        assert_eq!(weighting, LossWeighting::Minority { ratio: 0.5 });
        let w = weighting.weights(&label).unwrap();
        assert!((w[0] - 200.0).abs() < 1e-4);
        assert!((w[5] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn majority_foreground_weights_follow_formula() {
        // 4 positive, 2 negative -> ratio 2 -> offset 1 / (2 - 1) = 1
        let label = label_with(4, 6);
        let weighting = LossWeighting::from_label(&label);
        assert_eq!(weighting, LossWeighting::Majority { ratio: 2.0 });
        let w = weighting.weights(&label).unwrap();
        assert!((w[0] - 200.0).abs() < 1e-4);
        assert!((w[4] - 100.0).abs() < 1e-4);

        // ratio 3 -> offset 0.5
        let w = LossWeighting::from_ratio(3.0).weights(&[0.0, 255.0]).unwrap();
        assert!((w[0] - 50.0).abs() < 1e-4);
        assert!((w[1] - 150.0).abs() < 1e-4);
    }

    #[test]
    fn all_foreground_tile_gets_zero_offset() {
        let label = label_with(4, 4);
        let weighting = LossWeighting::from_label(&label);
        assert!(matches!(weighting, LossWeighting::Majority { .. }));
        assert_eq!(weighting.offset(), Some(0.0));
        let w = weighting.weights(&label).unwrap();
        assert!(w.iter().all(|v| (*v - 100.0).abs() < 1e-4));
    }

    #[test]
    fn bce_matches_closed_form() {
        let device = Default::default();
        let logits =
            Tensor::<B, 4>::from_data(TensorData::new(vec![0.0f32, 2.0], [1, 1, 1, 2]), &device);
        let targets =
            Tensor::<B, 4>::from_data(TensorData::new(vec![1.0f32, 0.0], [1, 1, 1, 2]), &device);
        let loss = bce_with_logits(logits.clone(), targets.clone(), None)
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];
        // ln 2 for the first pixel, 2 + ln(1 + e^-2) for the second
        let expected = (2f32.ln() + 2.0 + (1.0 + (-2f32).exp()).ln()) / 2.0;
        assert!((loss - expected).abs() < 1e-5);

        let weights =
            Tensor::<B, 4>::from_data(TensorData::new(vec![2.0f32, 0.0], [1, 1, 1, 2]), &device);
        let weighted = bce_with_logits(logits, targets, Some(weights))
            .into_data()
            .to_vec::<f32>()
            .unwrap()[0];
        assert!((weighted - 2f32.ln()).abs() < 1e-5);
    }
}
