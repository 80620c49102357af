// src/clean/immigration.rs

use arrow::{
    array::{ArrayRef, AsArray, Date32Array, Float64Array, Int32Array, RecordBatch, StringArray},
    compute::{cast, concat_batches},
    datatypes::{DataType, Field, Float64Type, Schema, SchemaRef},
};
use chrono::Datelike;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::{fs::File, path::PathBuf, sync::Arc};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::sas;

/// Reader for the raw monthly immigration dataset.
///
/// The statistical file format is read by an external component; anything
/// that can hand over its rows as Arrow batches plugs in here.
pub trait ImmigrationSource {
    /// Raw rows for one reporting month (`"jan"`..`"dec"`), or `None` if the
    /// month has no extract.
    fn read_month(&self, month: &str) -> Result<Option<Vec<RecordBatch>>>;
}

/// Parquet exports of the monthly files, located by a `{month}` pattern.
pub struct ParquetExtracts {
    pattern: String,
}

impl ParquetExtracts {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    fn path_for(&self, month: &str) -> PathBuf {
        PathBuf::from(self.pattern.replace("{month}", month))
    }
}

impl ImmigrationSource for ParquetExtracts {
    fn read_month(&self, month: &str) -> Result<Option<Vec<RecordBatch>>> {
        let path = self.path_for(month);
        if !path.is_file() {
            return Ok(None);
        }
        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(path = %path.display(), batches = batches.len(), "read immigration extract");
        Ok(Some(batches))
    }
}

/// Schema of the cleaned immigration rows, partition columns included.
pub fn cleaned_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("cicid", DataType::Float64, true),
        Field::new("year", DataType::Int32, true),
        Field::new("month", DataType::Int32, true),
        Field::new("origin_country_code", DataType::Utf8, true),
        Field::new("age", DataType::Int32, true),
        Field::new("arrival_date", DataType::Date32, true),
        Field::new("arrival_day", DataType::Int32, true),
        Field::new("departure_date", DataType::Date32, true),
        Field::new("depdate", DataType::Float64, true),
        Field::new("arrdate", DataType::Float64, true),
        Field::new("port_code", DataType::Utf8, true),
        Field::new("mode", DataType::Utf8, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("visa_category", DataType::Utf8, true),
        Field::new("visatype", DataType::Utf8, true),
    ]))
}

struct RawColumns<'a> {
    batch: &'a RecordBatch,
}

impl RawColumns<'_> {
    fn get(&self, name: &str) -> Result<&ArrayRef> {
        self.batch
            .column_by_name(name)
            .ok_or_else(|| PipelineError::MissingColumn {
                source_name: "immigration".into(),
                column: name.into(),
            })
    }

    fn numeric(&self, name: &str) -> Result<Float64Array> {
        Ok(cast(self.get(name)?, &DataType::Float64)?
            .as_primitive::<Float64Type>()
            .clone())
    }

    fn text(&self, name: &str) -> Result<StringArray> {
        Ok(cast(self.get(name)?, &DataType::Utf8)?.as_string::<i32>().clone())
    }
}

fn to_int(values: &Float64Array) -> Int32Array {
    values.iter().map(|v| v.map(|x| x as i32)).collect()
}

/// Rename, cast and decode one raw batch into [`cleaned_schema`].
pub fn clean_batch(batch: &RecordBatch) -> Result<RecordBatch> {
    let raw = RawColumns { batch };

    let arrdate = raw.numeric("arrdate")?;
    let depdate = raw.numeric("depdate")?;

    let origin: StringArray = raw
        .numeric("i94cit")?
        .iter()
        .map(|v| v.map(|x| (x as i64).to_string()))
        .collect();
    let arrival_date: Date32Array = arrdate.iter().map(sas::offset_to_date32).collect();
    let departure_date: Date32Array = depdate.iter().map(sas::offset_to_date32).collect();
    let arrival_day: Int32Array = arrdate
        .iter()
        .map(|v| sas::decode_day_offset(v).map(|d| d.day() as i32))
        .collect();
    let mode: StringArray = raw
        .numeric("i94mode")?
        .iter()
        .map(|v| Some(sas::decode_mode(v)))
        .collect();
    let visa: StringArray = raw
        .numeric("i94visa")?
        .iter()
        .map(|v| Some(sas::decode_visa(v)))
        .collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(raw.numeric("cicid")?),
        Arc::new(to_int(&raw.numeric("i94yr")?)),
        Arc::new(to_int(&raw.numeric("i94mon")?)),
        Arc::new(origin),
        Arc::new(to_int(&raw.numeric("i94bir")?)),
        Arc::new(arrival_date),
        Arc::new(arrival_day),
        Arc::new(departure_date),
        Arc::new(depdate),
        Arc::new(arrdate),
        Arc::new(raw.text("i94port")?),
        Arc::new(mode),
        Arc::new(raw.text("gender")?),
        Arc::new(visa),
        Arc::new(raw.text("visatype")?),
    ];
    Ok(RecordBatch::try_new(cleaned_schema(), columns)?)
}

/// Read and clean one month. `None` when the source has nothing for it.
pub fn clean_month(source: &dyn ImmigrationSource, month: &str) -> Result<Option<RecordBatch>> {
    let Some(raw) = source.read_month(month)? else {
        return Ok(None);
    };
    let cleaned = raw.iter().map(clean_batch).collect::<Result<Vec<_>>>()?;
    let batch = concat_batches(&cleaned_schema(), &cleaned)?;
    info!(month, rows = batch.num_rows(), "cleaned immigration month");
    Ok(Some(batch))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::Array;

    pub(crate) type RawRow<'a> = (f64, f64, &'a str, Option<f64>, Option<f64>, f64, f64);

    fn floats(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
        Arc::new(values.collect::<Float64Array>())
    }

    /// Raw rows as `(cicid, i94cit, i94port, arrdate, depdate, i94mode, i94visa)`.
    pub(crate) fn raw_batch(rows: &[RawRow<'_>]) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("cicid", DataType::Float64, true),
            Field::new("i94yr", DataType::Float64, true),
            Field::new("i94mon", DataType::Float64, true),
            Field::new("i94cit", DataType::Float64, true),
            Field::new("i94res", DataType::Float64, true),
            Field::new("i94port", DataType::Utf8, true),
            Field::new("arrdate", DataType::Float64, true),
            Field::new("i94mode", DataType::Float64, true),
            Field::new("depdate", DataType::Float64, true),
            Field::new("i94bir", DataType::Float64, true),
            Field::new("i94visa", DataType::Float64, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("visatype", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                floats(rows.iter().map(|r| Some(r.0))),
                floats(rows.iter().map(|_| Some(2016.0))),
                floats(rows.iter().map(|_| Some(4.0))),
                floats(rows.iter().map(|r| Some(r.1))),
                floats(rows.iter().map(|r| Some(r.1))),
                Arc::new(rows.iter().map(|r| Some(r.2)).collect::<StringArray>()),
                floats(rows.iter().map(|r| r.3)),
                floats(rows.iter().map(|r| Some(r.5))),
                floats(rows.iter().map(|r| r.4)),
                floats(rows.iter().map(|_| Some(30.0))),
                floats(rows.iter().map(|r| Some(r.6))),
                Arc::new(rows.iter().map(|_| Some("F")).collect::<StringArray>()),
                Arc::new(rows.iter().map(|_| Some("B2")).collect::<StringArray>()),
            ],
        )
        .expect("valid test batch")
    }

    #[test]
    fn decodes_and_renames() -> Result<()> {
        let raw = raw_batch(&[
            (1.0, 236.0, "NYC", Some(20545.0), Some(20550.0), 1.0, 2.0),
            (2.0, 101.0, "ANC", Some(20574.0), None, 9.0, 7.0),
            (3.0, 582.0, "ALC", None, None, 2.0, 3.0),
        ]);
        let out = clean_batch(&raw)?;
        assert_eq!(out.schema(), cleaned_schema());

        let text = |name: &str| -> Vec<Option<String>> {
            out.column_by_name(name)
                .unwrap()
                .as_string::<i32>()
                .iter()
                .map(|v| v.map(str::to_string))
                .collect()
        };
        assert_eq!(
            text("origin_country_code"),
            vec![Some("236".into()), Some("101".into()), Some("582".into())]
        );
        assert_eq!(
            text("mode"),
            vec![Some("Air".into()), Some("Not reported".into()), Some("Sea".into())]
        );
        assert_eq!(
            text("visa_category"),
            vec![
                Some("Pleasure".into()),
                Some("Invalid Visa Type".into()),
                Some("Student".into())
            ]
        );

        let day = out
            .column_by_name("arrival_day")
            .unwrap()
            .as_primitive::<arrow::datatypes::Int32Type>();
        assert_eq!(day.value(0), 1);
        assert_eq!(day.value(1), 30);
        assert!(day.is_null(2));

        let dep = out
            .column_by_name("departure_date")
            .unwrap()
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dep.value(0), 20550 + sas::SAS_EPOCH_DATE32);
        assert!(dep.is_null(1));
        Ok(())
    }

    #[test]
    fn missing_column_is_reported() {
        let raw = raw_batch(&[(1.0, 236.0, "NYC", Some(20545.0), None, 1.0, 1.0)]);
        let trimmed = raw.project(&[0, 1, 2]).unwrap();
        assert!(matches!(
            clean_batch(&trimmed),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn absent_month_is_none() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let pattern = format!("{}/i94_{{month}}16_sub.parquet", tmp.path().display());
        let source = ParquetExtracts::new(pattern);
        assert!(clean_month(&source, "jan")?.is_none());
        Ok(())
    }
}
