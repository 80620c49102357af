// src/transform/mod.rs
//! Extract step: rebuild the star schema from the staging tables.

pub mod sql;

use std::{collections::BTreeMap, time::Instant};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::warehouse::Warehouse;

/// One warehouse table: how to create it and how to fill it.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    pub table: &'static str,
    /// Identity sequence backing the surrogate key, if any.
    pub sequence: Option<&'static str>,
    pub create: &'static str,
    pub extract: &'static str,
    /// Tables that must be filled before this one is extracted.
    pub depends_on: &'static [&'static str],
}

pub const COUNTRIES: Step = Step {
    table: "dim_countries",
    sequence: Some("dim_countries_seq"),
    create: sql::CREATE_COUNTRIES,
    extract: sql::EXTRACT_COUNTRIES,
    depends_on: &[],
};

pub const PORTS: Step = Step {
    table: "dim_ports",
    sequence: Some("dim_ports_seq"),
    create: sql::CREATE_PORTS,
    extract: sql::EXTRACT_PORTS,
    depends_on: &[],
};

pub const AIRPORTS: Step = Step {
    table: "dim_airports",
    sequence: Some("dim_airports_seq"),
    create: sql::CREATE_AIRPORTS,
    extract: sql::EXTRACT_AIRPORTS,
    depends_on: &["dim_ports"],
};

pub const DEMOGRAPHICS: Step = Step {
    table: "dim_demographics",
    sequence: Some("dim_demographics_seq"),
    create: sql::CREATE_DEMOGRAPHICS,
    extract: sql::EXTRACT_DEMOGRAPHICS,
    depends_on: &["dim_ports"],
};

pub const TIME: Step = Step {
    table: "dim_time",
    sequence: None,
    create: sql::CREATE_TIME,
    extract: sql::EXTRACT_TIME,
    depends_on: &[],
};

pub const FACT: Step = Step {
    table: "fact_immigration",
    sequence: Some("fact_immigration_seq"),
    create: sql::CREATE_FACT,
    extract: sql::EXTRACT_FACT,
    depends_on: &["dim_countries", "dim_ports", "dim_time"],
};

/// Creation and extraction order.
pub const STEPS: [Step; 6] = [COUNTRIES, PORTS, AIRPORTS, DEMOGRAPHICS, TIME, FACT];

/// Every dependency of a step must be produced by an earlier step.
pub fn validate_order(steps: &[Step]) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        for dep in step.depends_on {
            if !steps[..i].iter().any(|s| s.table == *dep) {
                let reason = if steps[i..].iter().any(|s| s.table == *dep) {
                    "comes later"
                } else {
                    "is not produced by any step"
                };
                return Err(PipelineError::Ordering(format!(
                    "{} depends on {}, which {}",
                    step.table, dep, reason
                )));
            }
        }
    }
    Ok(())
}

/// Drop in reverse order so no foreign key dangles, then create in order.
pub fn create_tables(warehouse: &Warehouse, steps: &[Step]) -> Result<()> {
    for step in steps.iter().rev() {
        warehouse.execute(&format!("DROP TABLE IF EXISTS {};", step.table))?;
    }
    for step in steps {
        if let Some(seq) = step.sequence {
            warehouse.execute(&format!("CREATE OR REPLACE SEQUENCE {} START 1;", seq))?;
        }
        info!(table = step.table, "creating table");
        warehouse.execute(step.create)?;
    }
    Ok(())
}

/// Fill one table; returns its row count afterwards.
pub fn extract(warehouse: &Warehouse, step: &Step) -> Result<i64> {
    let start = Instant::now();
    warehouse.execute(step.extract)?;
    let rows = warehouse.count_rows(step.table)?;
    info!(table = step.table, rows, elapsed = ?start.elapsed(), "extracted");
    Ok(rows)
}

#[tracing::instrument(level = "info", skip_all)]
pub fn run(warehouse: &Warehouse) -> Result<BTreeMap<&'static str, i64>> {
    validate_order(&STEPS)?;
    create_tables(warehouse, &STEPS)?;
    let mut rows = BTreeMap::new();
    for step in &STEPS {
        rows.insert(step.table, extract(warehouse, step)?);
    }
    Ok(rows)
}
