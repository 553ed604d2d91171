//! Step learning-rate decay and the loss-plateau stopping rule.

/// Early stopping is only considered once the epoch index exceeds this value.
pub const EARLY_STOP_AFTER_EPOCH: usize = 10;
/// Number of trailing losses inspected by the stopping rule.
pub const PLATEAU_WINDOW: usize = 5;

/// `lr(epoch) = initial * 0.1^(epoch / pace)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDecay {
    pub initial_lr: f64,
    /// Epochs per factor-of-ten decay. Zero disables decay.
    pub pace: usize,
}

impl StepDecay {
    pub fn new(initial_lr: f64, pace: usize) -> Self {
        Self { initial_lr, pace }
    }

    pub fn lr(&self, epoch: usize) -> f64 {
        if self.pace == 0 {
            return self.initial_lr;
        }
        self.initial_lr * 0.1f64.powi((epoch / self.pace) as i32)
    }
}

/// True when the last `window` values never decrease from one epoch to the next.
pub fn plateaued(history: &[f64], window: usize) -> bool {
    if window < 2 || history.len() < window {
        return false;
    }
    history[history.len() - window..]
        .windows(2)
        .all(|pair| pair[1] >= pair[0])
}

/// Stop after epoch index `epoch` when either loss series has plateaued.
pub fn should_stop(epoch: usize, train_loss: &[f64], val_loss: &[f64]) -> bool {
    epoch > EARLY_STOP_AFTER_EPOCH
        && (plateaued(train_loss, PLATEAU_WINDOW) || plateaued(val_loss, PLATEAU_WINDOW))
}
