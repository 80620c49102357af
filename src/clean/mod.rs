// src/clean/mod.rs
//! Clean stage: raw sources → Parquet datasets under the staging root.

pub mod csv_source;
pub mod immigration;
pub mod write;

use arrow::{
    array::{ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{collections::BTreeMap, sync::Arc, time::Instant};
use tracing::{info, warn};

use crate::codes::{self, CodeTables};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::Result;
use csv_source::{latest_temperature_per_city, project_airports, read_csv, CsvSpec};
use immigration::{clean_month, ImmigrationSource, ParquetExtracts};
use write::{prepare_dataset_dir, DatasetWriter, WriteSummary};

/// Per-dataset totals of one clean run.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub datasets: BTreeMap<Dataset, WriteSummary>,
    pub skipped_months: Vec<String>,
}

impl CleanReport {
    fn record(&mut self, dataset: Dataset, summary: WriteSummary) {
        let total = self.datasets.entry(dataset).or_default();
        total.rows += summary.rows;
        total.files += summary.files;
        total.bytes += summary.bytes;
    }
}

fn utf8_batch(columns: Vec<(&str, Vec<&str>)>) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, _)| Field::new(*name, DataType::Utf8, false))
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .into_iter()
        .map(|(_, values)| Arc::new(StringArray::from(values)) as ArrayRef)
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

pub fn country_codes_batch(tables: &CodeTables) -> Result<RecordBatch> {
    utf8_batch(vec![
        (
            "country_code",
            tables.countries.keys().map(String::as_str).collect(),
        ),
        (
            "country",
            tables.countries.values().map(String::as_str).collect(),
        ),
    ])
}

pub fn port_codes_batch(tables: &CodeTables) -> Result<RecordBatch> {
    utf8_batch(vec![
        (
            "port_code",
            tables.ports.iter().map(|p| p.code.as_str()).collect(),
        ),
        ("city", tables.ports.iter().map(|p| p.city.as_str()).collect()),
        (
            "state",
            tables.ports.iter().map(|p| p.state.as_str()).collect(),
        ),
    ])
}

/// Run the clean stage with the Parquet extract reader from `config`.
pub fn run(config: &Config) -> Result<CleanReport> {
    let source = ParquetExtracts::new(config.source.immigration_pattern.clone());
    run_with_source(config, &source)
}

/// Clear (or keep) the dataset directory, then write one batch into it.
fn write_dataset(
    config: &Config,
    dataset: Dataset,
    batch: &RecordBatch,
    tag: &str,
) -> Result<WriteSummary> {
    let dir = config.storage.dataset_dir(dataset);
    prepare_dataset_dir(&dir, config.storage.write_mode(dataset))?;
    DatasetWriter::new(dir, dataset.partition_columns()).write(batch, tag)
}

#[tracing::instrument(level = "info", skip_all, fields(root = %config.storage.staging_root.display()))]
pub fn run_with_source(config: &Config, source: &dyn ImmigrationSource) -> Result<CleanReport> {
    let start = Instant::now();
    let mut report = CleanReport::default();

    // a dataset's earlier output is only touched once its source has been read
    let tables = codes::load_labels(&config.source.labels)?;
    let ports = port_codes_batch(&tables)?;
    report.record(
        Dataset::PortCodes,
        write_dataset(config, Dataset::PortCodes, &ports, "port_codes")?,
    );
    let countries = country_codes_batch(&tables)?;
    report.record(
        Dataset::CountryCodes,
        write_dataset(config, Dataset::CountryCodes, &countries, "country_codes")?,
    );

    let airports = read_csv(
        config.source.raw_file(&config.source.airports_file),
        &CsvSpec::airports(),
    )?;
    let airports = project_airports(&airports)?;
    report.record(
        Dataset::Airports,
        write_dataset(config, Dataset::Airports, &airports, "airport_codes")?,
    );

    let temperature = read_csv(
        config.source.raw_file(&config.source.temperature_file),
        &CsvSpec::temperature(),
    )?;
    let temperature = latest_temperature_per_city(&temperature)?;
    report.record(
        Dataset::Temperature,
        write_dataset(config, Dataset::Temperature, &temperature, "temperature")?,
    );

    let demographics = read_csv(
        config.source.raw_file(&config.source.demographics_file),
        &CsvSpec::demographics(),
    )?;
    report.record(
        Dataset::Demographics,
        write_dataset(config, Dataset::Demographics, &demographics, "demographic")?,
    );

    let storage = &config.storage;
    let immigration_dir = storage.dataset_dir(Dataset::Immigration);
    let immigration = DatasetWriter::new(&immigration_dir, Dataset::Immigration.partition_columns());
    let mut prepared = false;
    for month in &config.source.months {
        match clean_month(source, month)? {
            Some(batch) => {
                // months of one run accumulate
                if !prepared {
                    prepare_dataset_dir(&immigration_dir, storage.write_mode(Dataset::Immigration))?;
                    prepared = true;
                }
                report.record(Dataset::Immigration, immigration.write(&batch, month)?);
            }
            None => {
                warn!(month = %month, "no immigration extract for month; skipping");
                report.skipped_months.push(month.clone());
            }
        }
    }
    if !prepared {
        warn!(dir = %immigration_dir.display(), "no immigration month written; earlier output left in place");
    }

    for (dataset, summary) in &report.datasets {
        info!(
            dataset = %dataset,
            rows = summary.rows,
            files = summary.files,
            bytes = summary.bytes,
            "dataset written"
        );
    }
    info!(elapsed = ?start.elapsed(), "clean stage complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::Port;
    use anyhow::Result;
    use arrow::array::AsArray;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    const LABELS: &str = "  value i94cntyl
   236 =  'AFGHANISTAN'
;
  value $i94prtl
\t'NYC'\t=\t'NEW YORK, NY          '
;
";

    /// Config rooted at `root`, with earlier output already in every dataset.
    fn config_with_earlier_output(root: &Path) -> Result<Config> {
        let config: Config = format!(
            r#"
[source]
labels = "{root}/labels.SAS"
raw_dir = "{root}/raw"
immigration_pattern = "{root}/i94_{{month}}.parquet"
months = ["apr"]

[storage]
staging_root = "{root}/staging"
"#,
            root = root.display()
        )
        .parse()?;
        for dataset in Dataset::ALL {
            let dir = config.storage.dataset_dir(dataset);
            fs::create_dir_all(&dir)?;
            fs::write(dir.join("prev.parquet"), b"earlier run")?;
        }
        Ok(config)
    }

    #[test]
    fn code_tables_become_string_batches() -> Result<()> {
        let mut tables = CodeTables::default();
        tables.countries.insert("236".into(), "AFGHANISTAN".into());
        tables.countries.insert("101".into(), "ALBANIA".into());
        tables.ports.push(Port {
            code: "NYC".into(),
            city: "NEW YORK".into(),
            state: "NY".into(),
        });

        let countries = country_codes_batch(&tables)?;
        assert_eq!(countries.num_rows(), 2);
        assert_eq!(countries.schema().field(0).name(), "country_code");
        // BTreeMap order
        assert_eq!(countries.column(0).as_string::<i32>().value(0), "101");

        let ports = port_codes_batch(&tables)?;
        assert_eq!(ports.num_columns(), 3);
        assert_eq!(ports.column(2).as_string::<i32>().value(0), "NY");
        Ok(())
    }

    #[test]
    fn unreadable_labels_leave_every_dataset_alone() -> Result<()> {
        let tmp = tempdir()?;
        let config = config_with_earlier_output(tmp.path())?;

        assert!(run(&config).is_err());
        for dataset in Dataset::ALL {
            assert!(
                config.storage.dataset_dir(dataset).join("prev.parquet").exists(),
                "{} was cleared",
                dataset
            );
        }
        Ok(())
    }

    #[test]
    fn failed_source_only_clears_datasets_already_written() -> Result<()> {
        let tmp = tempdir()?;
        let config = config_with_earlier_output(tmp.path())?;
        fs::write(tmp.path().join("labels.SAS"), LABELS)?;
        // raw_dir has no airports CSV

        assert!(run(&config).is_err());
        let earlier = |dataset: Dataset| config.storage.dataset_dir(dataset).join("prev.parquet");
        assert!(!earlier(Dataset::PortCodes).exists());
        assert!(!earlier(Dataset::CountryCodes).exists());
        // replaced by this run's single file
        assert_eq!(
            fs::read_dir(config.storage.dataset_dir(Dataset::PortCodes))?.count(),
            1
        );
        for dataset in [
            Dataset::Airports,
            Dataset::Temperature,
            Dataset::Demographics,
            Dataset::Immigration,
        ] {
            assert!(earlier(dataset).exists(), "{} was cleared", dataset);
        }
        Ok(())
    }
}
