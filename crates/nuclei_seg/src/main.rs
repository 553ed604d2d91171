use clap::Parser;
use env_logger::Env;
use nuclei_seg::{run_app, AppArgs};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let summary = run_app(AppArgs::parse())?;
    log::info!(
        "done: {} epochs ({:?}) in {}",
        summary.training.epochs_run,
        summary.training.state,
        summary.output.display()
    );
    Ok(())
}
