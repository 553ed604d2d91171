//! Epoch-level training state machine.
//!
//! Per epoch the controller asks its runner for one pass over the data, applies exactly one
//! parameter update, records the epoch in the loss history, writes a checkpoint on every
//! `checkpoint_every`-th epoch, and then evaluates the stopping rule.
//!
//! The update at the end of epoch `e` uses the learning rate in effect during that epoch:
//! the initial rate for epoch 0, otherwise the decayed rate computed for epoch `e - 1`.

use crate::schedule::{should_stop, StepDecay};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingState {
    Running,
    Checkpointing,
    EarlyStopped,
    Completed,
}

/// Epoch means produced by one pass over the training (and validation) tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    pub train_loss: f64,
    pub train_score: f64,
    /// `None` when the validation set contributed no tiles.
    pub val_loss: Option<f64>,
    pub val_score: Option<f64>,
}

/// Append-only per-epoch metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossHistory {
    pub train_loss: Vec<f64>,
    pub val_loss: Vec<f64>,
    pub train_score: Vec<f64>,
    pub val_score: Vec<f64>,
}

impl LossHistory {
    pub fn push(&mut self, report: &EpochReport) {
        self.train_loss.push(report.train_loss);
        self.train_score.push(report.train_score);
        if let Some(v) = report.val_loss {
            self.val_loss.push(v);
        }
        if let Some(v) = report.val_score {
            self.val_score.push(v);
        }
    }

    pub fn epochs(&self) -> usize {
        self.train_loss.len()
    }
}

/// Work the controller delegates: data passes, parameter updates, persistence.
pub trait EpochRunner {
    /// Forward every training and validation tile once, accumulating their gradients.
    fn run_epoch(&mut self, epoch: usize) -> anyhow::Result<EpochReport>;

    /// Apply the accumulated gradient once at `lr` and reset the accumulator.
    fn apply_update(&mut self, lr: f64) -> anyhow::Result<()>;

    /// Persist parameters and optimizer state after `epochs_done` epochs.
    fn checkpoint(&mut self, epochs_done: usize, lr: f64, history: &LossHistory) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerConfig {
    pub epochs: usize,
    pub schedule: StepDecay,
    pub checkpoint_every: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub state: TrainingState,
    pub epochs_run: usize,
    /// Learning rate in effect after the last epoch.
    pub final_lr: f64,
    pub history: LossHistory,
}

#[derive(Debug)]
pub struct TrainingController {
    cfg: ControllerConfig,
    state: TrainingState,
    history: LossHistory,
}

impl TrainingController {
    pub fn new(cfg: ControllerConfig) -> Self {
        Self {
            cfg,
            state: TrainingState::Running,
            history: LossHistory::default(),
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    pub fn history(&self) -> &LossHistory {
        &self.history
    }

    pub fn run<R: EpochRunner>(&mut self, runner: &mut R) -> anyhow::Result<TrainingOutcome> {
        let mut lr_in_effect = self.cfg.schedule.initial_lr;
        let mut epochs_run = 0;

        for epoch in 0..self.cfg.epochs {
            self.state = TrainingState::Running;
            let lr = self.cfg.schedule.lr(epoch);
            let report = runner.run_epoch(epoch)?;
            runner.apply_update(lr_in_effect)?;
            self.history.push(&report);
            epochs_run = epoch + 1;
            log::info!(
                "epoch {:>3} | lr {:.5} | loss {:.5} | vloss {} | train score {:.5} | val score {}",
                epochs_run,
                lr,
                report.train_loss,
                fmt_optional(report.val_loss),
                report.train_score,
                fmt_optional(report.val_score),
            );
            lr_in_effect = lr;

            if self.cfg.checkpoint_every > 0 && epochs_run % self.cfg.checkpoint_every == 0 {
                self.state = TrainingState::Checkpointing;
                runner.checkpoint(epochs_run, lr_in_effect, &self.history)?;
            }

            if should_stop(epoch, &self.history.train_loss, &self.history.val_loss) {
                log::info!("loss plateaued; stopping after epoch {epochs_run}");
                self.state = TrainingState::EarlyStopped;
                break;
            }
        }

        if self.state != TrainingState::EarlyStopped {
            self.state = TrainingState::Completed;
        }
        Ok(TrainingOutcome {
            state: self.state,
            epochs_run,
            final_lr: lr_in_effect,
            history: self.history.clone(),
        })
    }
}

fn fmt_optional(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.5}"),
        None => "-".to_string(),
    }
}
