//! Monthly self-sufficiency and grid-cost analysis for solar installations,
//! computed from SolarEdge-style energy meter exports.
//!
//! The pipeline is `convert::map_record` → `compute::aggregate_by_month`
//! → `compute::reduce_totals`. Everything else renders or persists around it.

pub mod compute;
pub mod config;
pub mod convert;
pub mod error;
pub mod graph;
pub mod month;
pub mod observability;
pub mod overrides;
pub mod report;

pub use compute::{aggregate_by_month, reduce_totals, try_reduce_totals, MonthlySummary};
pub use convert::{map_record, EnergyRecord, RawFieldRecord};
pub use error::AnalysisError;
pub use month::MonthKey;
pub use overrides::{apply_override, CostOverrides};
