use anyhow::{Context, Result};
use i94_warehouse::{logging, report, Config, Warehouse};
use tracing::info;

const YEAR: i32 = 2016;
const MONTH: i32 = 4;
const TOP_COUNTRIES: usize = 10;

fn main() -> Result<()> {
    logging::init();
    let config = Config::load().context("loading configuration")?;
    let warehouse = Warehouse::open(&config.warehouse).context("opening warehouse")?;

    for row in report::immigrants_by_country(&warehouse, YEAR, MONTH, TOP_COUNTRIES)? {
        info!(country = %row.country, immigrants = row.immigrants, "immigrants by country");
    }
    for row in report::arrivals_by_weekday(&warehouse, YEAR, MONTH)? {
        info!(day_of_week = row.day_of_week, arrivals = row.arrivals, "arrivals by weekday");
    }
    Ok(())
}
