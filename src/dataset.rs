use serde::Deserialize;
use std::fmt;

/// One intermediate dataset produced by the cleaner and loaded by the stager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    PortCodes,
    CountryCodes,
    Airports,
    Temperature,
    Demographics,
    Immigration,
}

impl Dataset {
    pub const ALL: [Dataset; 6] = [
        Dataset::PortCodes,
        Dataset::CountryCodes,
        Dataset::Airports,
        Dataset::Temperature,
        Dataset::Demographics,
        Dataset::Immigration,
    ];

    /// Subdirectory under the staging root, unless overridden in config.
    pub fn default_subpath(self) -> &'static str {
        match self {
            Dataset::PortCodes => "port_codes",
            Dataset::CountryCodes => "country_codes",
            Dataset::Airports => "airport_codes",
            Dataset::Temperature => "temperature",
            Dataset::Demographics => "demographic",
            Dataset::Immigration => "immigration_data",
        }
    }

    /// Columns the dataset is partitioned by, hive-style, in directory order.
    pub fn partition_columns(self) -> &'static [&'static str] {
        match self {
            Dataset::Immigration => &["year", "month", "arrival_day"],
            _ => &[],
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_subpath())
    }
}

/// How a dataset's existing files are treated when the cleaner writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Clear the dataset directory once per clean run, then write.
    #[default]
    Overwrite,
    /// Keep existing files and add new uniquely named ones.
    Append,
}
