use anyhow::{Context, Result};
use i94_warehouse::{logging, pipeline, Config};
use tracing::{error, info};

fn main() -> Result<()> {
    logging::init();
    info!("startup");

    let config = Config::load().context("loading configuration")?;
    if let Err(e) = pipeline::run_all(&config) {
        error!(error = %e, "pipeline failed");
        return Err(e.into());
    }
    Ok(())
}
