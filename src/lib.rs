pub mod clean;
pub mod codes;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod sas;
pub mod stage;
pub mod transform;
pub mod warehouse;

pub use config::Config;
pub use error::{PipelineError, Result};
pub use pipeline::Stage;
pub use warehouse::Warehouse;
