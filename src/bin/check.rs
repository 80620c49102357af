use anyhow::{Context, Result};
use i94_warehouse::{logging, pipeline, Config, Stage, Warehouse};

fn main() -> Result<()> {
    logging::init();
    let config = Config::load().context("loading configuration")?;
    let warehouse = Warehouse::open(&config.warehouse).context("opening warehouse")?;
    pipeline::run_stage(Stage::QualityCheck, &config, &warehouse).context("running quality checks")?;
    Ok(())
}
