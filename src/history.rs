//! Multi-period state
//!
//! This module holds the state a run threads from one period to the next:
//! per-region consecutive watch counters, the historical biometric load used
//! as the MBU backlog baseline, and the previous period's merged snapshot.
//! State is owned by the caller and passed into each period's computation.

use crate::error::ComputeError;
use crate::snapshot::MergedSnapshot;
use crate::types::{BiometricCounts, Period, RegionKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Per-region history of consecutive-period counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryTracker {
    counts: BTreeMap<RegionKey, Vec<u32>>,
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded counter for a region (0 if never seen)
    pub fn last(&self, region: &RegionKey) -> u32 {
        self.counts
            .get(region)
            .and_then(|values| values.last().copied())
            .unwrap_or(0)
    }

    /// Advance a region's counter and return the new value.
    ///
    /// The counter grows by one while `held` is true and resets to 0 otherwise.
    pub fn advance(&mut self, region: &RegionKey, held: bool) -> u32 {
        let next = if held { self.last(region) + 1 } else { 0 };
        self.counts.entry(region.clone()).or_default().push(next);
        next
    }

    /// Full counter history for a region
    pub fn history(&self, region: &RegionKey) -> &[u32] {
        self.counts.get(region).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn region_count(&self) -> usize {
        self.counts.len()
    }
}

/// Historical biometric load per region
///
/// With no window every period ever recorded contributes to the mean. A window
/// keeps only the most recent `n` loads per region.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBaseline {
    loads: BTreeMap<RegionKey, VecDeque<i64>>,
    window_size: Option<usize>,
}

impl LoadBaseline {
    /// Running mean over all recorded periods
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Mean over the last `window_size` periods; zero is raised to one
    pub fn with_window(window_size: usize) -> Self {
        Self {
            loads: BTreeMap::new(),
            window_size: Some(window_size.max(1)),
        }
    }

    pub fn window_size(&self) -> Option<usize> {
        self.window_size
    }

    /// Fold one period's biometric totals into the history
    pub fn record(&mut self, biometric: &BTreeMap<RegionKey, BiometricCounts>) {
        for (region, counts) in biometric {
            let queue = self.loads.entry(region.clone()).or_default();
            queue.push_back(counts.total());
            if let Some(window) = self.window_size {
                while queue.len() > window {
                    queue.pop_front();
                }
            }
        }
    }

    /// Historical average load for a region, if any load was recorded
    pub fn average(&self, region: &RegionKey) -> Option<f64> {
        let queue = self.loads.get(region)?;
        if queue.is_empty() {
            return None;
        }
        let sum: i64 = queue.iter().sum();
        Some(sum as f64 / queue.len() as f64)
    }

    /// Number of periods currently contributing to a region's average
    pub fn periods_recorded(&self, region: &RegionKey) -> usize {
        self.loads.get(region).map_or(0, VecDeque::len)
    }
}

/// State carried across the periods of one run
///
/// A run from the first period needs a fresh instance; a loaded instance
/// continues after `last_period`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub history: HistoryTracker,
    pub load_baseline: LoadBaseline,
    pub previous: Option<MergedSnapshot>,
    pub last_period: Option<Period>,
}

impl RunState {
    pub fn new(baseline_window: Option<usize>) -> Self {
        Self {
            load_baseline: match baseline_window {
                Some(window) => LoadBaseline::with_window(window),
                None => LoadBaseline::unbounded(),
            },
            ..Default::default()
        }
    }

    /// Reject a period that does not come strictly after the last one
    pub fn check_order(&self, period: &Period) -> Result<(), ComputeError> {
        match &self.last_period {
            Some(last) if period <= last => Err(ComputeError::OutOfOrderPeriod {
                period: period.to_string(),
                last: last.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether a period was already covered by this state
    pub fn has_processed(&self, period: &Period) -> bool {
        self.last_period.as_ref().is_some_and(|last| period <= last)
    }

    /// Load run state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize run state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
