//! Pipeline orchestration
//!
//! This module provides the public API for Aadhaar Pulse. It walks periods in
//! chronological order and threads run state from one period to the next:
//! aggregation → snapshot merge → indicators → insights.

use crate::aggregator::{RawAggregate, RegionPeriodAggregator};
use crate::encoder::MetricsReport;
use crate::error::ComputeError;
use crate::history::RunState;
use crate::insights::{InsightGenerator, DEFAULT_TOP_N};
use crate::loader::DatasetLoader;
use crate::metrics::{compute_demand_proxies, compute_mbu_load, compute_msi};
use crate::snapshot::MergedSnapshot;
use crate::types::{
    BiometricCounts, DatasetKind, DemandProxy, DemographicCounts, EnrolmentCounts, Granularity,
    Insight, MbuLoad, MsiResult, Period, RegionKey,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Period bucket size
    pub granularity: Granularity,
    /// Insights kept per state and period
    pub insights_top_n: usize,
    /// MBU baseline window in periods; `None` averages over every period
    pub baseline_window: Option<usize>,
}

impl PipelineConfig {
    /// Reject settings no run can use
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.baseline_window == Some(0) {
            return Err(ComputeError::InvalidConfig(
                "baseline window must cover at least one period".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::Monthly,
            insights_top_n: DEFAULT_TOP_N,
            baseline_window: None,
        }
    }
}

/// The three aggregated source datasets
#[derive(Debug, Clone, Default)]
pub struct AggregatedDatasets {
    pub enrolment: RawAggregate<EnrolmentCounts>,
    pub demographic: RawAggregate<DemographicCounts>,
    pub biometric: RawAggregate<BiometricCounts>,
}

impl AggregatedDatasets {
    /// Union of all periods seen in any dataset, sorted
    pub fn periods(&self) -> Vec<Period> {
        let periods: BTreeSet<&Period> = self
            .enrolment
            .periods()
            .chain(self.demographic.periods())
            .chain(self.biometric.periods())
            .collect();
        periods.into_iter().cloned().collect()
    }
}

/// Load and aggregate all three datasets from a data directory
pub fn aggregate_datasets(
    loader: &DatasetLoader,
    granularity: Granularity,
) -> Result<AggregatedDatasets, ComputeError> {
    let aggregator = RegionPeriodAggregator::new(granularity);

    log::info!("Processing enrolment data...");
    let enrolment = aggregator.aggregate(loader.load_dataset(DatasetKind::Enrolment)?);

    log::info!("Processing demographic data...");
    let demographic = aggregator.aggregate(loader.load_dataset(DatasetKind::Demographic)?);

    log::info!("Processing biometric data...");
    let biometric = aggregator.aggregate(loader.load_dataset(DatasetKind::Biometric)?);

    Ok(AggregatedDatasets {
        enrolment,
        demographic,
        biometric,
    })
}

/// Indicators for a single period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodMetrics {
    pub period: Period,
    pub msi: Vec<MsiResult>,
    pub demand_proxies: Vec<DemandProxy>,
    pub mbu_load: Vec<MbuLoad>,
    pub insights_by_state: BTreeMap<String, Vec<Insight>>,
}

/// Compute one period's indicators and advance `state`.
///
/// Periods must be fed in increasing order; an earlier or repeated period is
/// rejected without touching `state`.
pub fn process_period(
    state: &mut RunState,
    generator: &InsightGenerator,
    period: &Period,
    enrolment: &BTreeMap<RegionKey, EnrolmentCounts>,
    demographic: &BTreeMap<RegionKey, DemographicCounts>,
    biometric: &BTreeMap<RegionKey, BiometricCounts>,
) -> Result<PeriodMetrics, ComputeError> {
    state.check_order(period)?;

    // Stage 1: Merge enrolment and demographic sums with derived ratios
    let snapshot =
        MergedSnapshot::build(period.clone(), enrolment, demographic, state.previous.as_ref());

    // Stage 2: MSI (advances consecutive counters)
    let msi = compute_msi(&snapshot, &mut state.history);

    // Stage 3: Demand proxies against the previous snapshot
    let demand_proxies = compute_demand_proxies(&snapshot, state.previous.as_ref());

    // Stage 4: Fold this period's load into the baseline, then score it
    state.load_baseline.record(biometric);
    let mbu_load = compute_mbu_load(period, biometric, &state.load_baseline);

    // Stage 5: Insights for every state present in the MSI results
    let states: BTreeSet<&str> = msi.iter().map(|r| r.region_key.state.as_str()).collect();
    let insights_by_state: BTreeMap<String, Vec<Insight>> = states
        .into_iter()
        .map(|s| {
            let insights = generator.generate(s, &msi, &demand_proxies, &mbu_load);
            (s.to_string(), insights)
        })
        .collect();

    log::debug!(
        "Period {}: {} MSI regions, {} biometric regions",
        period,
        msi.len(),
        mbu_load.len()
    );

    state.previous = Some(snapshot);
    state.last_period = Some(period.clone());

    Ok(PeriodMetrics {
        period: period.clone(),
        msi,
        demand_proxies,
        mbu_load,
        insights_by_state,
    })
}

/// Compute all indicators for all periods with fresh run state.
///
/// # Example
/// ```ignore
/// let datasets = aggregate_datasets(&DatasetLoader::new("data"), Granularity::Monthly)?;
/// let report = compute_all_metrics(&datasets, &PipelineConfig::default())?;
/// ```
pub fn compute_all_metrics(
    datasets: &AggregatedDatasets,
    config: &PipelineConfig,
) -> Result<MetricsReport, ComputeError> {
    config.validate()?;
    PulseProcessor::new(config.clone()).process(datasets)
}

/// Stateful processor for incremental runs with persistent state.
///
/// Use this when a run should continue where a previous one stopped.
pub struct PulseProcessor {
    config: PipelineConfig,
    state: RunState,
    generator: InsightGenerator,
}

impl Default for PulseProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl PulseProcessor {
    /// Create a processor with fresh state
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            state: RunState::new(config.baseline_window),
            generator: InsightGenerator::new(config.insights_top_n),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Load run state from JSON.
    ///
    /// The loaded baseline keeps the window it was recorded with; a different
    /// configured window is reported and ignored.
    pub fn load_state(&mut self, json: &str) -> Result<(), ComputeError> {
        let state = RunState::from_json(json)?;

        let loaded_window = state.load_baseline.window_size();
        if loaded_window != self.config.baseline_window {
            log::warn!(
                "Loaded state uses baseline window {:?}, ignoring configured {:?}",
                loaded_window,
                self.config.baseline_window
            );
            self.config.baseline_window = loaded_window;
        }

        self.state = state;
        Ok(())
    }

    /// Save run state to JSON
    pub fn save_state(&self) -> Result<String, ComputeError> {
        Ok(self.state.to_json()?)
    }

    /// Process every period not yet covered by the current state
    pub fn process(&mut self, datasets: &AggregatedDatasets) -> Result<MetricsReport, ComputeError> {
        let mut report = MetricsReport::default();

        for period in datasets.periods() {
            if self.state.has_processed(&period) {
                log::warn!("Skipping period {period}: already covered by loaded state");
                continue;
            }

            let metrics = self.process_period(
                &period,
                &datasets.enrolment.period(&period),
                &datasets.demographic.period(&period),
                &datasets.biometric.period(&period),
            )?;
            report.push(metrics);
        }

        log::info!("Computed metrics for {} periods", report.periods().len());
        Ok(report)
    }

    /// Process a single period against the current state
    pub fn process_period(
        &mut self,
        period: &Period,
        enrolment: &BTreeMap<RegionKey, EnrolmentCounts>,
        demographic: &BTreeMap<RegionKey, DemographicCounts>,
        biometric: &BTreeMap<RegionKey, BiometricCounts>,
    ) -> Result<PeriodMetrics, ComputeError> {
        process_period(
            &mut self.state,
            &self.generator,
            period,
            enrolment,
            demographic,
            biometric,
        )
    }
}
