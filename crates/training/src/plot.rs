//! Loss-curve artifacts: `loss.csv` always, `loss.png` with the `plots` feature.

use crate::controller::LossHistory;
use std::path::Path;

pub const LOSS_PLOT_TITLE: &str = "Train & Validation Loss";

/// One row per epoch: `epoch,train_loss,val_loss,train_score,val_score`.
pub fn write_loss_csv(path: &Path, history: &LossHistory) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["epoch", "train_loss", "val_loss", "train_score", "val_score"])?;
    let cell = |v: Option<&f64>| v.map(|v| v.to_string()).unwrap_or_default();
    for epoch in 0..history.epochs() {
        writer.write_record([
            (epoch + 1).to_string(),
            cell(history.train_loss.get(epoch)),
            cell(history.val_loss.get(epoch)),
            cell(history.train_score.get(epoch)),
            cell(history.val_score.get(epoch)),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "plots")]
pub fn plot_loss_png(path: &Path, history: &LossHistory) -> anyhow::Result<()> {
    use plotters::prelude::*;

    let draw = || -> Result<(), Box<dyn std::error::Error>> {
        let root = BitMapBackend::new(path, (640, 480)).into_drawing_area();
        root.fill(&WHITE)?;
        let epochs = history.epochs().max(2);
        let y_max = history
            .train_loss
            .iter()
            .chain(history.val_loss.iter())
            .copied()
            .fold(0.0f64, f64::max)
            .max(1e-6);
        let mut chart = ChartBuilder::on(&root)
            .margin(20)
            .caption(LOSS_PLOT_TITLE, ("sans-serif", 22))
            .x_label_area_size(45)
            .y_label_area_size(55)
            .build_cartesian_2d(0usize..epochs - 1, 0.0f64..y_max * 1.05)?;
        chart.configure_mesh().x_desc("Epoch").y_desc("Loss").draw()?;
        chart
            .draw_series(LineSeries::new(
                history.train_loss.iter().copied().enumerate(),
                &BLUE,
            ))?
            .label("Train")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.filled()));
        chart
            .draw_series(LineSeries::new(
                history.val_loss.iter().copied().enumerate(),
                &RED,
            ))?
            .label("Validation")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.filled()));
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
        Ok(())
    };
    draw().map_err(|e| anyhow::anyhow!("failed to plot {}: {e}", path.display()))
}

#[cfg(not(feature = "plots"))]
pub fn plot_loss_png(_path: &Path, _history: &LossHistory) -> anyhow::Result<()> {
    anyhow::bail!("plots feature is not enabled")
}

/// Write `loss.csv` and, when available, `loss.png` under `output`.
pub fn write_loss_artifacts(output: &Path, history: &LossHistory) -> anyhow::Result<()> {
    write_loss_csv(&output.join("loss.csv"), history)?;
    if cfg!(feature = "plots") {
        if let Err(err) = plot_loss_png(&output.join("loss.png"), history) {
            log::warn!("{err}");
        }
    }
    Ok(())
}
