//! Report encoding
//!
//! This module shapes computed indicators into the structures consumed by the
//! dashboard and writes them out as JSON artifacts.

use crate::error::ComputeError;
use crate::insights::BACKLOG_INSIGHT_THRESHOLD;
use crate::pipeline::PeriodMetrics;
use crate::types::{
    DemandProxy, Granularity, Insight, MbuLoad, MsiClassification, MsiResult, Period,
};
use crate::{PRODUCER_NAME, PULSE_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the exported metrics report
pub const METRICS_FILE: &str = "metrics.json";

/// Full metrics output, keyed by period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub msi: BTreeMap<Period, Vec<MsiResult>>,
    pub demand_proxies: BTreeMap<Period, Vec<DemandProxy>>,
    pub mbu_load: BTreeMap<Period, Vec<MbuLoad>>,
    /// State → period → insights
    pub insights_by_state: BTreeMap<String, BTreeMap<Period, Vec<Insight>>>,
}

impl MetricsReport {
    /// Add one period's results
    pub fn push(&mut self, metrics: PeriodMetrics) {
        let period = metrics.period;

        for (state, insights) in metrics.insights_by_state {
            self.insights_by_state
                .entry(state)
                .or_default()
                .insert(period.clone(), insights);
        }

        self.msi.insert(period.clone(), metrics.msi);
        self.demand_proxies
            .insert(period.clone(), metrics.demand_proxies);
        self.mbu_load.insert(period, metrics.mbu_load);
    }

    /// Fold a later report into this one; periods present in both take the
    /// later report's results
    pub fn merge(&mut self, later: MetricsReport) {
        self.msi.extend(later.msi);
        self.demand_proxies.extend(later.demand_proxies);
        self.mbu_load.extend(later.mbu_load);
        for (state, periods) in later.insights_by_state {
            self.insights_by_state
                .entry(state)
                .or_default()
                .extend(periods);
        }
    }

    /// Read a previously exported `metrics.json`; `None` when there is none
    pub fn read_from_dir(output_dir: &Path) -> Result<Option<Self>, ComputeError> {
        let path = output_dir.join(METRICS_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let report = serde_json::from_str(&fs::read_to_string(&path)?)?;
        log::debug!("Read existing report from {}", path.display());
        Ok(Some(report))
    }

    /// Periods with MSI results, in order
    pub fn periods(&self) -> Vec<&Period> {
        self.msi.keys().collect()
    }

    pub fn latest_period(&self) -> Option<&Period> {
        self.msi.keys().next_back()
    }

    pub fn is_empty(&self) -> bool {
        self.msi.is_empty()
    }
}

/// National summary of the latest period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_regions: usize,
    pub critical_regions: usize,
    pub watch_regions: usize,
    pub stable_regions: usize,
    /// Latest-period regions with a backlog signal above the insight threshold
    pub high_mbu_regions: usize,
    /// Empty when the report has no periods
    pub latest_period: String,
    pub states: Vec<String>,
    pub districts: usize,
    pub pincodes: usize,
}

impl SummaryStats {
    pub fn from_report(report: &MetricsReport) -> Self {
        let Some(latest) = report.latest_period() else {
            return Self::default();
        };

        let mut summary = Self {
            latest_period: latest.to_string(),
            ..Default::default()
        };

        let mut states = BTreeSet::new();
        let mut districts = BTreeSet::new();
        let mut pincodes = BTreeSet::new();

        let latest_msi = report.msi.get(latest).map(Vec::as_slice).unwrap_or(&[]);
        summary.total_regions = latest_msi.len();

        for result in latest_msi {
            match result.classification {
                MsiClassification::Critical => summary.critical_regions += 1,
                MsiClassification::Watch => summary.watch_regions += 1,
                MsiClassification::Stable => summary.stable_regions += 1,
            }
            states.insert(result.region_key.state.as_str());
            districts.insert(result.region_key.district.as_str());
            pincodes.insert(result.region_key.pincode.as_str());
        }

        summary.states = states.into_iter().map(str::to_string).collect();
        summary.districts = districts.len();
        summary.pincodes = pincodes.len();

        summary.high_mbu_regions = report
            .mbu_load
            .get(latest)
            .map(|loads| {
                loads
                    .iter()
                    .filter(|m| m.backlog_signal > BACKLOG_INSIGHT_THRESHOLD)
                    .count()
            })
            .unwrap_or(0);

        summary
    }
}

/// Producer metadata embedded in the run manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Description of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub producer: Producer,
    pub computed_at_utc: String,
    pub granularity: Granularity,
    pub periods: Vec<Period>,
}

/// Encoder producing the exported JSON artifacts
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Build the manifest for a report
    pub fn manifest(&self, report: &MetricsReport, granularity: Granularity) -> RunManifest {
        RunManifest {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: PULSE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            granularity,
            periods: report.periods().into_iter().cloned().collect(),
        }
    }

    /// Render every artifact as `(file name, pretty JSON)`
    pub fn render(
        &self,
        report: &MetricsReport,
        granularity: Granularity,
    ) -> Result<Vec<(&'static str, String)>, ComputeError> {
        let summary = SummaryStats::from_report(report);

        Ok(vec![
            (METRICS_FILE, serde_json::to_string_pretty(report)?),
            ("summary.json", serde_json::to_string_pretty(&summary)?),
            ("states.json", serde_json::to_string_pretty(&summary.states)?),
            (
                "run.json",
                serde_json::to_string_pretty(&self.manifest(report, granularity))?,
            ),
        ])
    }

    /// Write all artifacts into `output_dir`.
    ///
    /// Everything is rendered before the first write, and each file replaces
    /// its predecessor by rename.
    pub fn write_to_dir(
        &self,
        report: &MetricsReport,
        granularity: Granularity,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, ComputeError> {
        let artifacts = self.render(report, granularity)?;
        fs::create_dir_all(output_dir)?;

        let mut written = Vec::with_capacity(artifacts.len());
        for (name, contents) in artifacts {
            let target = output_dir.join(name);
            let staging = output_dir.join(format!(".{name}.{}.tmp", self.instance_id));
            fs::write(&staging, contents)?;
            fs::rename(&staging, &target)?;
            log::debug!("Wrote {}", target.display());
            written.push(target);
        }

        Ok(written)
    }
}
