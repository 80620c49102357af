// src/clean/write.rs

use arrow::{
    array::{Array, AsArray, UInt32Array},
    compute::{cast, take_record_batch},
    datatypes::DataType,
    record_batch::RecordBatch,
};
use chrono::Utc;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use rayon::prelude::*;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

use crate::dataset::WriteMode;
use crate::error::{PipelineError, Result};

/// Directory name used for a null partition value, as Spark and Hive do.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Make `dir` ready for a clean run. `Overwrite` removes everything already there.
pub fn prepare_dataset_dir(dir: &Path, mode: WriteMode) -> Result<()> {
    if mode == WriteMode::Overwrite && dir.exists() {
        debug!(dir = %dir.display(), "clearing dataset directory");
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: u64,
    pub files: u64,
    pub bytes: u64,
}

/// Writes record batches into one dataset directory, hive-partitioned by
/// `partition_by` (partition columns become directories, not file columns).
pub struct DatasetWriter {
    dir: PathBuf,
    partition_by: Vec<String>,
    props: WriterProperties,
}

impl DatasetWriter {
    pub fn new(dir: impl Into<PathBuf>, partition_by: &[&str]) -> Self {
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_dictionary_enabled(true)
            .build();
        Self {
            dir: dir.into(),
            partition_by: partition_by.iter().map(|s| s.to_string()).collect(),
            props,
        }
    }

    /// Write `batch` as new files named `<tag>-<ts>.parquet`; existing files are untouched.
    pub fn write(&self, batch: &RecordBatch, tag: &str) -> Result<WriteSummary> {
        let file_name = format!("{}-{}.parquet", tag, Utc::now().timestamp_micros());

        if self.partition_by.is_empty() {
            fs::create_dir_all(&self.dir)?;
            let bytes = self.write_file(batch, &self.dir.join(&file_name))?;
            return Ok(WriteSummary {
                rows: batch.num_rows() as u64,
                files: 1,
                bytes,
            });
        }

        let groups = self.partition_rows(batch)?;
        let data_columns: Vec<usize> = batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !self.partition_by.contains(f.name()))
            .map(|(i, _)| i)
            .collect();

        // partitions are independent files; write them on the rayon pool
        let results: Vec<Result<u64>> = groups
            .into_par_iter()
            .map(|(values, rows)| -> Result<u64> {
                let indices = UInt32Array::from(rows);
                let part = take_record_batch(batch, &indices)?.project(&data_columns)?;
                let mut dir = self.dir.clone();
                for (col, value) in self.partition_by.iter().zip(&values) {
                    dir.push(format!("{}={}", col, value));
                }
                fs::create_dir_all(&dir)?;
                self.write_file(&part, &dir.join(&file_name))
            })
            .collect();

        let mut summary = WriteSummary {
            rows: batch.num_rows() as u64,
            ..Default::default()
        };
        for r in results {
            summary.bytes += r?;
            summary.files += 1;
        }
        info!(
            dir = %self.dir.display(),
            rows = summary.rows,
            files = summary.files,
            "wrote partitioned dataset"
        );
        Ok(summary)
    }

    /// Group row indices by their rendered partition values.
    fn partition_rows(&self, batch: &RecordBatch) -> Result<BTreeMap<Vec<String>, Vec<u32>>> {
        let mut rendered = Vec::with_capacity(self.partition_by.len());
        for col in &self.partition_by {
            let arr = batch
                .column_by_name(col)
                .ok_or_else(|| PipelineError::MissingColumn {
                    source_name: self.dir.display().to_string(),
                    column: col.clone(),
                })?;
            rendered.push(cast(arr, &DataType::Utf8)?);
        }

        let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
        for row in 0..batch.num_rows() {
            let key = rendered
                .iter()
                .map(|arr| {
                    let s = arr.as_string::<i32>();
                    if s.is_null(row) {
                        NULL_PARTITION.to_string()
                    } else {
                        s.value(row).to_string()
                    }
                })
                .collect();
            groups.entry(key).or_default().push(row as u32);
        }
        Ok(groups)
    }

    fn write_file(&self, batch: &RecordBatch, path: &Path) -> Result<u64> {
        let tmp_path = path.with_extension("parquet.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.props.clone()))?;
        writer.write(batch)?;
        writer.close()?;
        fs::rename(&tmp_path, path)?;

        let len = fs::metadata(path)?.len();
        debug!(path = %path.display(), rows = batch.num_rows(), bytes = len, "wrote parquet");
        Ok(len)
    }
}
