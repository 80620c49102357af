// src/clean/csv_source.rs
//! The three CSV sources: airport codes, city temperatures, US city demographics.

use arrow::{
    array::{Array, AsArray, UInt32Array},
    compute::{cast, concat_batches, filter_record_batch, is_not_null, take_record_batch},
    csv::ReaderBuilder,
    datatypes::{DataType, Date32Type, Field, Schema},
    record_batch::RecordBatch,
};
use regex::Regex;
use std::{
    collections::{btree_map::Entry, BTreeMap},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    sync::Arc,
};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

const BATCH_SIZE: usize = 64 * 1024;

/// The nine airport fields kept in the intermediate dataset.
pub const AIRPORT_COLUMNS: [&str; 9] = [
    "ident",
    "type",
    "name",
    "elevation_ft",
    "iso_country",
    "municipality",
    "gps_code",
    "local_code",
    "coordinates",
];

/// Trim whitespace, a byte-order mark, and outer quotes from a header cell.
fn clean_header(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('\u{feff}');
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

/// `AverageTemperatureUncertainty` → `average_temperature_uncertainty`.
pub fn camel_to_snake(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Ok(String::new());
    };
    let rest: String = chars.collect();
    let rest = Regex::new(r"[A-Z]")?.replace_all(&rest, |caps: &regex::Captures| {
        format!("_{}", caps[0].to_lowercase())
    });
    Ok(format!("{}{}", first.to_lowercase(), rest))
}

/// `Foreign-born` → `foreign_born`, `Median Age` → `median_age`.
pub fn lower_underscored(name: &str) -> Result<String> {
    Ok(name.to_lowercase().replace([' ', '-'], "_"))
}

pub fn airport_column_type(name: &str) -> DataType {
    match name {
        "elevation_ft" => DataType::Int64,
        _ => DataType::Utf8,
    }
}

pub fn temperature_column_type(name: &str) -> DataType {
    match name {
        "dt" => DataType::Date32,
        "average_temperature" | "average_temperature_uncertainty" => DataType::Float64,
        _ => DataType::Utf8,
    }
}

pub fn demographic_column_type(name: &str) -> DataType {
    match name {
        "median_age" | "average_household_size" => DataType::Float64,
        "male_population" | "female_population" | "total_population" | "number_of_veterans"
        | "foreign_born" | "count" => DataType::Int64,
        _ => DataType::Utf8,
    }
}

/// How one CSV file is read: delimiter, header renaming, and column typing.
pub struct CsvSpec {
    pub delimiter: u8,
    pub rename: fn(&str) -> Result<String>,
    pub column_type: fn(&str) -> DataType,
}

impl CsvSpec {
    pub fn airports() -> Self {
        Self {
            delimiter: b',',
            rename: |s| Ok(s.to_string()),
            column_type: airport_column_type,
        }
    }

    pub fn temperature() -> Self {
        Self {
            delimiter: b',',
            rename: camel_to_snake,
            column_type: temperature_column_type,
        }
    }

    pub fn demographics() -> Self {
        Self {
            delimiter: b';',
            rename: lower_underscored,
            column_type: demographic_column_type,
        }
    }

    /// Build the typed read schema from the file's header line.
    fn schema_for(&self, header_line: &str) -> Result<Schema> {
        let fields = header_line
            .trim_end_matches(['\r', '\n'])
            .split(self.delimiter as char)
            .map(|raw| {
                let name = (self.rename)(&clean_header(raw))?;
                let ty = (self.column_type)(&name);
                Ok(Field::new(name, ty, true))
            })
            .collect::<Result<Vec<Field>>>()?;
        Ok(Schema::new(fields))
    }
}

/// Read a whole CSV file into one record batch with normalized column names.
#[tracing::instrument(level = "info", skip(path, spec), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P, spec: &CsvSpec) -> Result<RecordBatch> {
    let path = path.as_ref();
    let mut header_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut header_line)?;
    let schema = Arc::new(spec.schema_for(&header_line)?);
    debug!(columns = ?schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>(), "read schema");

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_delimiter(spec.delimiter)
        .with_batch_size(BATCH_SIZE)
        .build(File::open(path)?)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let batch = concat_batches(&schema, &batches)?;
    info!(rows = batch.num_rows(), "read csv");
    Ok(batch)
}

fn column_index(batch: &RecordBatch, source: &str, name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| PipelineError::MissingColumn {
            source_name: source.to_string(),
            column: name.to_string(),
        })
}

/// Project the airport codes down to [`AIRPORT_COLUMNS`].
pub fn project_airports(batch: &RecordBatch) -> Result<RecordBatch> {
    let indices = AIRPORT_COLUMNS
        .iter()
        .map(|c| column_index(batch, "airports", c))
        .collect::<Result<Vec<_>>>()?;
    Ok(batch.project(&indices)?)
}

/// Drop rows without a measurement, then keep only the most recent `dt`
/// per `(city, country)`. Ties keep the first row seen.
pub fn latest_temperature_per_city(batch: &RecordBatch) -> Result<RecordBatch> {
    let temp_idx = column_index(batch, "temperature", "average_temperature")?;
    let measured = is_not_null(batch.column(temp_idx).as_ref())?;
    let batch = filter_record_batch(batch, &measured)?;

    let city = cast(batch.column(column_index(&batch, "temperature", "city")?), &DataType::Utf8)?;
    let country = cast(
        batch.column(column_index(&batch, "temperature", "country")?),
        &DataType::Utf8,
    )?;
    let dt = cast(batch.column(column_index(&batch, "temperature", "dt")?), &DataType::Date32)?;
    let (city, country) = (city.as_string::<i32>(), country.as_string::<i32>());
    let dt = dt.as_primitive::<Date32Type>();

    let value = |arr: &arrow::array::StringArray, row: usize| {
        arr.is_valid(row).then(|| arr.value(row).to_string())
    };

    let mut latest: BTreeMap<(Option<String>, Option<String>), (Option<i32>, u32)> =
        BTreeMap::new();
    for row in 0..batch.num_rows() {
        let key = (value(city, row), value(country, row));
        let date = dt.is_valid(row).then(|| dt.value(row));
        match latest.entry(key) {
            Entry::Vacant(e) => {
                e.insert((date, row as u32));
            }
            Entry::Occupied(mut e) => {
                if date > e.get().0 {
                    e.insert((date, row as u32));
                }
            }
        }
    }

    let dropped = batch.num_rows() - latest.len();
    if dropped > 0 {
        debug!(dropped, kept = latest.len(), "deduplicated temperatures");
    }
    if latest.keys().any(|(c, n)| c.is_none() || n.is_none()) {
        warn!("temperature rows without city or country kept as their own group");
    }

    let indices = UInt32Array::from_iter_values(latest.values().map(|(_, i)| *i));
    Ok(take_record_batch(&batch, &indices)?)
}
