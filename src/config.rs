use serde::Deserialize;
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use crate::dataset::{Dataset, WriteMode};
use crate::error::{PipelineError, Result};

/// Environment variable naming the config file; falls back to `i94.toml`.
pub const CONFIG_ENV: &str = "I94_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "i94.toml";

/// Everything a stage needs, loaded once at startup and passed down.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub object_store: Option<ObjectStoreConfig>,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// The fixed-format label file with the country and port code tables.
    pub labels: PathBuf,
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,
    /// Path of one monthly immigration extract; `{month}` is replaced by
    /// the lowercase three-letter month abbreviation.
    #[serde(default = "default_immigration_pattern")]
    pub immigration_pattern: String,
    #[serde(default = "default_months")]
    pub months: Vec<String>,
    #[serde(default = "default_airports_file")]
    pub airports_file: String,
    #[serde(default = "default_temperature_file")]
    pub temperature_file: String,
    #[serde(default = "default_demographics_file")]
    pub demographics_file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Local directory the cleaner writes Parquet datasets into.
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    /// Where the stager reads the same layout from, e.g. `s3://bucket/staging`.
    /// Defaults to `staging_root`.
    #[serde(default)]
    pub load_root: Option<String>,
    #[serde(default)]
    pub paths: BTreeMap<Dataset, String>,
    #[serde(default)]
    pub write_modes: BTreeMap<Dataset, WriteMode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub key_id: String,
    pub secret: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    /// DuckDB database file, or `:memory:`.
    #[serde(default = "default_warehouse_path")]
    pub path: String,
    #[serde(default)]
    pub threads: Option<u32>,
}

fn default_raw_dir() -> PathBuf {
    PathBuf::from("data/raw_data")
}

fn default_immigration_pattern() -> String {
    "data/i94/i94_{month}16_sub.parquet".into()
}

fn default_months() -> Vec<String> {
    [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_airports_file() -> String {
    "airport-codes_csv.csv".into()
}

fn default_temperature_file() -> String {
    "GlobalLandTemperaturesByCity.csv".into()
}

fn default_demographics_file() -> String {
    "us-cities-demographics.csv".into()
}

fn default_staging_root() -> PathBuf {
    PathBuf::from("staging")
}

fn default_warehouse_path() -> String {
    "i94.duckdb".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            load_root: None,
            paths: BTreeMap::new(),
            write_modes: BTreeMap::new(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: default_warehouse_path(),
            threads: None,
        }
    }
}

impl Config {
    /// Read the file named by `I94_CONFIG`, or `i94.toml` in the working directory.
    pub fn load() -> Result<Self> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_path(path)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), "loaded config");
        content.parse()
    }
}

impl FromStr for Config {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        if config.source.months.is_empty() {
            return Err(PipelineError::Config(
                "source.months must name at least one month".into(),
            ));
        }
        if !config.source.immigration_pattern.contains("{month}") && config.source.months.len() > 1
        {
            return Err(PipelineError::Config(
                "source.immigration_pattern needs a {month} placeholder".into(),
            ));
        }
        Ok(config)
    }
}

impl SourceConfig {
    pub fn raw_file(&self, name: &str) -> PathBuf {
        self.raw_dir.join(name)
    }
}

impl StorageConfig {
    fn subpath(&self, dataset: Dataset) -> &str {
        self.paths
            .get(&dataset)
            .map(String::as_str)
            .unwrap_or_else(|| dataset.default_subpath())
    }

    /// Local directory the cleaner writes `dataset` into.
    pub fn dataset_dir(&self, dataset: Dataset) -> PathBuf {
        self.staging_root.join(self.subpath(dataset))
    }

    /// Location the stager bulk-loads `dataset` from.
    pub fn load_location(&self, dataset: Dataset) -> String {
        match &self.load_root {
            Some(root) => format!("{}/{}", root.trim_end_matches('/'), self.subpath(dataset)),
            None => self.dataset_dir(dataset).display().to_string(),
        }
    }

    pub fn write_mode(&self, dataset: Dataset) -> WriteMode {
        self.write_modes.get(&dataset).copied().unwrap_or_default()
    }

    /// True when the stager reads from an object store rather than local disk.
    pub fn loads_from_object_store(&self) -> bool {
        self.load_root
            .as_deref()
            .map(|r| r.contains("://"))
            .unwrap_or(false)
    }
}
