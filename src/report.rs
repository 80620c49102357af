// src/report.rs
//! Analytic queries over the star schema.

use duckdb::params;

use crate::error::Result;
use crate::warehouse::Warehouse;

#[derive(Debug, Clone, PartialEq)]
pub struct CountryCount {
    pub country: String,
    pub immigrants: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdayCount {
    /// Sunday = 0.
    pub day_of_week: i32,
    pub arrivals: i64,
}

/// Countries with the most arrivals in `year`/`month`, largest first.
pub fn immigrants_by_country(
    warehouse: &Warehouse,
    year: i32,
    month: i32,
    limit: usize,
) -> Result<Vec<CountryCount>> {
    let mut stmt = warehouse.connection().prepare(&format!(
        "SELECT c.country, COUNT(*) AS immigrants
         FROM fact_immigration i
         INNER JOIN dim_countries c ON i.country_id = c.country_id
         INNER JOIN dim_time t ON i.arrdate = t.sas_timestamp
         WHERE t.year = ? AND t.month = ?
         GROUP BY c.country
         ORDER BY immigrants DESC, c.country
         LIMIT {}",
        limit
    ))?;
    let rows = stmt
        .query_map(params![year, month], |r| {
            Ok(CountryCount {
                country: r.get(0)?,
                immigrants: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Arrivals per day of week in `year`/`month`.
pub fn arrivals_by_weekday(
    warehouse: &Warehouse,
    year: i32,
    month: i32,
) -> Result<Vec<WeekdayCount>> {
    let mut stmt = warehouse.connection().prepare(
        "SELECT t.day_of_week, COUNT(*) AS arrivals
         FROM fact_immigration i
         INNER JOIN dim_ports p ON i.port_id = p.port_id
         INNER JOIN dim_time t ON i.arrdate = t.sas_timestamp
         WHERE t.year = ? AND t.month = ?
         GROUP BY t.day_of_week
         ORDER BY t.day_of_week",
    )?;
    let rows = stmt
        .query_map(params![year, month], |r| {
            Ok(WeekdayCount {
                day_of_week: r.get(0)?,
                arrivals: r.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
