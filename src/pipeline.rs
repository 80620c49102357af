// src/pipeline.rs
//! Stage sequencing: Clean → Stage → Extract → QualityCheck.

use std::{fmt, time::Instant};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::warehouse::Warehouse;
use crate::{clean, quality, stage, transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Stage,
    Extract,
    QualityCheck,
}

impl Stage {
    /// Fixed run order.
    pub const ALL: [Stage; 4] = [Stage::Clean, Stage::Stage, Stage::Extract, Stage::QualityCheck];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clean => "clean",
            Stage::Stage => "stage",
            Stage::Extract => "extract",
            Stage::QualityCheck => "quality_check",
        };
        f.write_str(name)
    }
}

#[tracing::instrument(level = "info", skip_all, fields(stage = %which))]
pub fn run_stage(which: Stage, config: &Config, warehouse: &Warehouse) -> Result<()> {
    match which {
        Stage::Clean => {
            let report = clean::run(config)?;
            info!(datasets = report.datasets.len(), skipped = report.skipped_months.len(), "cleaned");
        }
        Stage::Stage => {
            let loaded = stage::run(config, warehouse)?;
            info!(tables = loaded.len(), "staged");
        }
        Stage::Extract => {
            let rows = transform::run(warehouse)?;
            info!(tables = rows.len(), "extracted");
        }
        Stage::QualityCheck => quality::run(warehouse)?,
    }
    Ok(())
}

/// Run every stage in order, stopping at the first error.
pub fn run_all(config: &Config) -> Result<()> {
    let start = Instant::now();
    let warehouse = Warehouse::open(&config.warehouse)?;
    for stage in Stage::ALL {
        run_stage(stage, config, &warehouse)?;
    }
    info!(elapsed = ?start.elapsed(), "pipeline complete");
    Ok(())
}
