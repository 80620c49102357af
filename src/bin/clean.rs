use anyhow::{Context, Result};
use i94_warehouse::{clean, logging, Config};
use tracing::{info, warn};

fn main() -> Result<()> {
    logging::init();
    let config = Config::load().context("loading configuration")?;

    let report = clean::run(&config).context("cleaning raw sources")?;
    let rows: u64 = report.datasets.values().map(|s| s.rows).sum();
    if !report.skipped_months.is_empty() {
        warn!(months = ?report.skipped_months, "months without an immigration extract");
    }
    info!(datasets = report.datasets.len(), rows, "clean finished");
    Ok(())
}
