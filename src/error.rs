use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] duckdb::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(String),

    /// The label file does not have the expected section layout.
    #[error("label file line {line}: {message}")]
    LabelFormat { line: usize, message: String },

    /// A raw source is missing a column the cleaner needs.
    #[error("{source_name}: missing column `{column}`")]
    MissingColumn { source_name: String, column: String },

    #[error("data quality check failed: {0}")]
    DataQuality(String),

    #[error("stage ordering violated: {0}")]
    Ordering(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
