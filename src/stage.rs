// src/stage.rs
//! Stage step: recreate the staging tables and bulk-load the Parquet datasets.

use glob::glob;
use std::{collections::BTreeMap, path::Path, time::Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::warehouse::{sql_literal, Warehouse};

/// A landing table shaped like one intermediate dataset.
#[derive(Debug, Clone, Copy)]
pub struct StagingTable {
    pub name: &'static str,
    pub dataset: Dataset,
    /// `(column, SQL type)`; partition columns last.
    pub columns: &'static [(&'static str, &'static str)],
}

pub const STAGING_PORTS: StagingTable = StagingTable {
    name: "staging_ports",
    dataset: Dataset::PortCodes,
    columns: &[
        ("port_code", "VARCHAR(3)"),
        ("city", "VARCHAR(256)"),
        ("state", "VARCHAR(50)"),
    ],
};

pub const STAGING_COUNTRIES: StagingTable = StagingTable {
    name: "staging_countries",
    dataset: Dataset::CountryCodes,
    columns: &[
        ("country_code", "VARCHAR(3) NOT NULL"),
        ("country", "VARCHAR(256) NOT NULL"),
    ],
};

pub const STAGING_AIRPORTS: StagingTable = StagingTable {
    name: "staging_airports",
    dataset: Dataset::Airports,
    columns: &[
        ("ident", "VARCHAR(256) NOT NULL"),
        ("type", "VARCHAR(256) NOT NULL"),
        ("name", "VARCHAR(256) NOT NULL"),
        ("elevation_ft", "INTEGER"),
        ("iso_country", "VARCHAR(256)"),
        ("municipality", "VARCHAR(256)"),
        ("gps_code", "VARCHAR(256)"),
        ("local_code", "VARCHAR(256)"),
        ("coordinates", "VARCHAR(256)"),
    ],
};

pub const STAGING_TEMPERATURES: StagingTable = StagingTable {
    name: "staging_temperatures",
    dataset: Dataset::Temperature,
    columns: &[
        ("dt", "DATE"),
        ("average_temperature", "DOUBLE"),
        ("average_temperature_uncertainty", "DOUBLE"),
        ("city", "VARCHAR"),
        ("country", "VARCHAR"),
        ("latitude", "VARCHAR"),
        ("longitude", "VARCHAR"),
    ],
};

pub const STAGING_DEMOGRAPHICS: StagingTable = StagingTable {
    name: "staging_demographics",
    dataset: Dataset::Demographics,
    columns: &[
        ("city", "VARCHAR(256)"),
        ("state", "VARCHAR(100)"),
        ("median_age", "DOUBLE"),
        ("male_population", "BIGINT"),
        ("female_population", "BIGINT"),
        ("total_population", "BIGINT"),
        ("number_of_veterans", "BIGINT"),
        ("foreign_born", "BIGINT"),
        ("average_household_size", "DOUBLE"),
        ("state_code", "VARCHAR(50)"),
        ("race", "VARCHAR(100)"),
        ("count", "BIGINT"),
    ],
};

pub const STAGING_IMMIGRATION: StagingTable = StagingTable {
    name: "staging_immigration",
    dataset: Dataset::Immigration,
    columns: &[
        ("cicid", "DOUBLE"),
        ("origin_country_code", "VARCHAR"),
        ("age", "INTEGER"),
        ("arrival_date", "DATE"),
        ("departure_date", "DATE"),
        ("depdate", "DOUBLE"),
        ("arrdate", "DOUBLE"),
        ("port_code", "VARCHAR"),
        ("mode", "VARCHAR"),
        ("gender", "VARCHAR"),
        ("visa_category", "VARCHAR"),
        ("visatype", "VARCHAR"),
        ("year", "INTEGER"),
        ("month", "INTEGER"),
        ("arrival_day", "INTEGER"),
    ],
};

/// Creation and load order.
pub const STAGING_TABLES: [StagingTable; 6] = [
    STAGING_PORTS,
    STAGING_COUNTRIES,
    STAGING_AIRPORTS,
    STAGING_TEMPERATURES,
    STAGING_DEMOGRAPHICS,
    STAGING_IMMIGRATION,
];

impl StagingTable {
    fn is_partition(&self, column: &str) -> bool {
        self.dataset.partition_columns().contains(&column)
    }

    pub fn create_sql(&self) -> String {
        let cols: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| format!("    \"{}\" {}", name, ty))
            .collect();
        format!(
            "DROP TABLE IF EXISTS {name};\nCREATE TABLE {name} (\n{cols}\n);",
            name = self.name,
            cols = cols.join(",\n")
        )
    }

    fn file_glob(&self, location: &str) -> String {
        let root = location.trim_end_matches('/');
        if self.dataset.partition_columns().is_empty() {
            format!("{}/*.parquet", root)
        } else {
            format!("{}/**/*.parquet", root)
        }
    }

    /// Server-side bulk read of every Parquet file under `location`.
    pub fn load_sql(&self, location: &str) -> String {
        let names: Vec<String> = self
            .columns
            .iter()
            .map(|(name, _)| format!("\"{}\"", name))
            .collect();
        let exprs: Vec<String> = self
            .columns
            .iter()
            .map(|(name, ty)| {
                if self.is_partition(name) {
                    // directory values are text; unknown ones load as NULL
                    format!("TRY_CAST(\"{name}\" AS {ty}) AS \"{name}\"")
                } else {
                    format!("\"{}\"", name)
                }
            })
            .collect();
        format!(
            "INSERT INTO {table} ({names})\nSELECT {exprs}\nFROM read_parquet({glob}, hive_partitioning = {hive}, union_by_name = true);",
            table = self.name,
            names = names.join(", "),
            exprs = exprs.join(", "),
            glob = sql_literal(&self.file_glob(location)),
            hive = !self.dataset.partition_columns().is_empty(),
        )
    }

    /// True if a local dataset directory holds at least one Parquet file.
    fn has_local_files(&self, location: &str) -> Result<bool> {
        if !Path::new(location).is_dir() {
            return Ok(false);
        }
        Ok(glob(&self.file_glob(location))?.any(|e| e.is_ok()))
    }
}

/// Drop and recreate every staging table, one committed statement each.
pub fn create_tables(warehouse: &Warehouse) -> Result<()> {
    for table in STAGING_TABLES {
        info!(table = table.name, "creating staging table");
        warehouse.execute(&table.create_sql())?;
    }
    Ok(())
}

/// Bulk-load one table. A local dataset with no files leaves the table empty.
pub fn load_table(
    warehouse: &Warehouse,
    table: &StagingTable,
    location: &str,
    remote: bool,
) -> Result<i64> {
    if !remote && !table.has_local_files(location)? {
        warn!(table = table.name, location, "no parquet files to load");
        return Ok(0);
    }
    let start = Instant::now();
    warehouse.execute(&table.load_sql(location))?;
    let rows = warehouse.count_rows(table.name)?;
    info!(table = table.name, rows, elapsed = ?start.elapsed(), "loaded staging table");
    Ok(rows)
}

#[tracing::instrument(level = "info", skip_all)]
pub fn run(config: &Config, warehouse: &Warehouse) -> Result<BTreeMap<&'static str, i64>> {
    let storage = &config.storage;
    let remote = storage.loads_from_object_store();
    if remote {
        match &config.object_store {
            Some(store) => warehouse.register_object_store(store)?,
            None => warn!("load root is remote but no [object_store] credentials are configured"),
        }
    }

    create_tables(warehouse)?;

    let mut loaded = BTreeMap::new();
    for table in STAGING_TABLES {
        let location = storage.load_location(table.dataset);
        loaded.insert(table.name, load_table(warehouse, &table, &location, remote)?);
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::immigration::{clean_batch, tests::raw_batch};
    use crate::clean::write::DatasetWriter;
    use anyhow::Result;
    use arrow::array::{ArrayRef, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn create_sql_quotes_columns() {
        let sql = STAGING_COUNTRIES.create_sql();
        assert!(sql.starts_with("DROP TABLE IF EXISTS staging_countries;"));
        assert!(sql.contains("\"country_code\" VARCHAR(3) NOT NULL"));
    }

    #[test]
    fn recreate_is_idempotent() -> Result<()> {
        let wh = Warehouse::open_in_memory()?;
        create_tables(&wh)?;
        wh.execute("INSERT INTO staging_ports VALUES ('NYC', 'NEW YORK', 'NY')")?;
        create_tables(&wh)?;
        for table in STAGING_TABLES {
            assert!(wh.table_exists(table.name)?);
            assert_eq!(wh.count_rows(table.name)?, 0);
        }
        Ok(())
    }

    #[test]
    fn loads_flat_and_partitioned_datasets() -> Result<()> {
        let tmp = tempdir()?;
        let wh = Warehouse::open_in_memory()?;
        create_tables(&wh)?;

        let ports_dir = tmp.path().join("port_codes");
        let ports = RecordBatch::try_new(
            Arc::new(Schema::new(vec![
                Field::new("port_code", DataType::Utf8, false),
                Field::new("city", DataType::Utf8, false),
                Field::new("state", DataType::Utf8, false),
            ])),
            vec![
                Arc::new(StringArray::from(vec!["NYC", "ANC"])) as ArrayRef,
                Arc::new(StringArray::from(vec!["NEW YORK", "ANCHORAGE"])),
                Arc::new(StringArray::from(vec!["NY", "AK"])),
            ],
        )?;
        DatasetWriter::new(&ports_dir, &[]).write(&ports, "ports")?;
        let rows = load_table(&wh, &STAGING_PORTS, &ports_dir.display().to_string(), false)?;
        assert_eq!(rows, 2);

        // partition columns come back from the directory names
        let imm_dir = tmp.path().join("immigration_data");
        let imm = clean_batch(&raw_batch(&[
            (1.0, 236.0, "NYC", Some(20545.0), Some(20550.0), 1.0, 2.0),
            (2.0, 236.0, "NYC", Some(20546.0), None, 1.0, 2.0),
            (3.0, 101.0, "ANC", None, None, 1.0, 1.0),
        ]))?;
        DatasetWriter::new(&imm_dir, Dataset::Immigration.partition_columns()).write(&imm, "apr")?;
        let rows = load_table(&wh, &STAGING_IMMIGRATION, &imm_dir.display().to_string(), false)?;
        assert_eq!(rows, 3);
        assert_eq!(
            wh.query_i64("SELECT COUNT(*) FROM staging_immigration WHERE year = 2016 AND month = 4")?,
            3
        );
        assert_eq!(
            wh.query_i64("SELECT COUNT(*) FROM staging_immigration WHERE arrival_day IS NULL")?,
            1
        );
        assert_eq!(
            wh.query_i64("SELECT COUNT(*) FROM staging_immigration WHERE arrival_day = 2")?,
            1
        );
        assert_eq!(
            wh.query_i64(
                "SELECT COUNT(*) FROM staging_immigration
                 WHERE arrival_date = DATE '2016-04-01' AND departure_date = DATE '2016-04-06'"
            )?,
            1
        );
        Ok(())
    }

    #[test]
    fn empty_local_dataset_is_skipped() -> Result<()> {
        let tmp = tempdir()?;
        let wh = Warehouse::open_in_memory()?;
        create_tables(&wh)?;
        let rows = load_table(
            &wh,
            &STAGING_IMMIGRATION,
            &tmp.path().join("missing").display().to_string(),
            false,
        )?;
        assert_eq!(rows, 0);
        assert_eq!(wh.count_rows("staging_immigration")?, 0);
        Ok(())
    }
}
