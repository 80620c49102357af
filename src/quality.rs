// src/quality.rs
//! Post-load row-count checks. Each failure is logged and aborts the run.

use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::warehouse::Warehouse;

pub const STAGING_COUNT: &str = "SELECT COUNT(*) FROM staging_immigration";

/// Joinable staging rows minus 2016 fact rows.
pub const STAGING_MINUS_FACT: &str = "
SELECT s.staging_count - f.fact_count
FROM (
    SELECT COUNT(*) AS staging_count
    FROM staging_immigration i
    INNER JOIN dim_countries c ON i.origin_country_code = c.country_code
    INNER JOIN dim_ports p ON i.port_code = p.port_code
) s
CROSS JOIN (
    SELECT COUNT(*) AS fact_count
    FROM fact_immigration i
    INNER JOIN dim_time t ON i.arrdate = t.sas_timestamp
    WHERE t.year = 2016
) f";

pub fn check_staging_populated(warehouse: &Warehouse) -> Result<()> {
    let rows = warehouse.query_i64(STAGING_COUNT)?;
    if rows < 1 {
        error!("staging_immigration has no rows");
        return Err(PipelineError::DataQuality(
            "staging_immigration returned no rows".into(),
        ));
    }
    info!(rows, "staging_immigration is populated");
    Ok(())
}

/// Fails only when joinable staging rows outnumber the 2016 fact rows; a
/// fact surplus passes.
pub fn check_staging_reached_fact(warehouse: &Warehouse) -> Result<()> {
    let missing = warehouse.query_i64(STAGING_MINUS_FACT)?;
    if missing > 0 {
        error!(missing, "joinable staging rows are missing from fact_immigration");
        return Err(PipelineError::DataQuality(format!(
            "{} joinable staging rows did not reach fact_immigration",
            missing
        )));
    }
    info!("fact_immigration holds the joinable staging rows");
    Ok(())
}

#[tracing::instrument(level = "info", skip_all)]
pub fn run(warehouse: &Warehouse) -> Result<()> {
    check_staging_populated(warehouse)?;
    check_staging_reached_fact(warehouse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage;
    use crate::transform::{self, tests::seeded_warehouse};
    use anyhow::Result;

    #[test]
    fn passes_when_every_joinable_row_landed() -> Result<()> {
        let wh = seeded_warehouse()?;
        transform::run(&wh)?;
        run(&wh)?;
        Ok(())
    }

    #[test]
    fn fails_when_fact_falls_short() -> Result<()> {
        let wh = seeded_warehouse()?;
        transform::run(&wh)?;
        wh.execute(
            "DELETE FROM fact_immigration
             WHERE immigration_id = (SELECT MAX(immigration_id) FROM fact_immigration)",
        )?;
        assert_eq!(wh.count_rows("fact_immigration")?, 7);
        check_staging_populated(&wh)?;
        assert!(matches!(
            check_staging_reached_fact(&wh),
            Err(PipelineError::DataQuality(_))
        ));
        Ok(())
    }

    #[test]
    fn fact_surplus_still_passes() -> Result<()> {
        let wh = seeded_warehouse()?;
        transform::run(&wh)?;
        wh.execute(
            "INSERT INTO fact_immigration (country_id, port_id, arrdate)
             SELECT country_id, port_id, arrdate FROM fact_immigration LIMIT 2",
        )?;
        assert_eq!(wh.count_rows("fact_immigration")?, 10);
        // literal comparison is staging - fact <= 0, not equality
        check_staging_reached_fact(&wh)?;
        Ok(())
    }

    #[test]
    fn empty_staging_fails_first_check() -> Result<()> {
        let wh = Warehouse::open_in_memory()?;
        stage::create_tables(&wh)?;
        // no star schema exists, so reaching check 2 would be a warehouse error
        assert!(matches!(run(&wh), Err(PipelineError::DataQuality(_))));
        Ok(())
    }
}
