/// Laplace-smoothed positive-predictive score: `(tp + 1) / (pred + label - tp + 1)`.
///
/// `probs` are sigmoid outputs; a pixel is predicted foreground when its probability exceeds
/// `threshold`. `targets` are soft labels in `0..=1` and contribute their value, not a count.
pub fn ppv_score(probs: &[f32], targets: &[f32], threshold: f32) -> f64 {
    let mut predicted = 0.0f64;
    let mut label = 0.0f64;
    let mut tp = 0.0f64;
    for (p, t) in probs.iter().zip(targets) {
        let t = *t as f64;
        label += t;
        if *p > threshold {
            predicted += 1.0;
            tp += t;
        }
    }
    (tp + 1.0) / (predicted + label - tp + 1.0)
}

/// Streaming mean without storing samples.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    pub fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
