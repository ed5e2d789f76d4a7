//! ### Error
//! Failures surfaced by the library. Unparseable fields inside a reading are
//! not errors; `convert` substitutes zero for them.

use crate::month::MonthKey;

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("cannot total an empty list of monthly summaries")]
    EmptyInput,
    #[error("invalid month key '{0}', expected e.g. 2024-Mar")]
    InvalidMonthKey(String),
    #[error("invalid grid cost {rate} for {month}: must be finite and non-negative")]
    InvalidRate { month: MonthKey, rate: f64 },
    #[error("no readings found for {0}")]
    UnknownMonth(MonthKey),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}
