//! Aadhaar Pulse - Aggregation and metrics engine for regional identity-service indicators
//!
//! Pulse turns daily enrolment, demographic-update and biometric-update counts
//! into per-region, per-period indicators through a deterministic pipeline:
//! loading → region/period aggregation → snapshot merge → indicators →
//! insights → export.
//!
//! ## Indicators
//!
//! - **Migration Stress Index**: composite z-score of update, growth and decline signals
//! - **Demand proxies**: school and housing demand growth per region
//! - **MBU load**: mandatory biometric update backlog against each region's history

pub mod aggregator;
pub mod encoder;
pub mod error;
pub mod history;
pub mod insights;
pub mod loader;
pub mod metrics;
pub mod pipeline;
pub mod snapshot;
pub mod types;

pub use encoder::{MetricsReport, ReportEncoder, SummaryStats};
pub use error::ComputeError;
pub use history::RunState;
pub use loader::DatasetLoader;
pub use pipeline::{aggregate_datasets, compute_all_metrics, PipelineConfig, PulseProcessor};
pub use types::{DatasetKind, Granularity, Period, RegionKey};

/// Pulse version embedded in every run manifest
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for run manifests
pub const PRODUCER_NAME: &str = "aadhaar-pulse";
