//! Insight generation
//!
//! This module turns one period's indicator lists into a short, ranked list of
//! advisory records for a single state.

use crate::types::{round_to, DemandProxy, Impact, Insight, MbuLoad, MsiClassification, MsiResult};

/// Default number of insights kept per state and period
pub const DEFAULT_TOP_N: usize = 10;

/// School demand above which an insight is raised
pub const SCHOOL_DEMAND_THRESHOLD: f64 = 0.10;

/// School demand at or above which the insight is High impact
pub const SCHOOL_DEMAND_HIGH_IMPACT: f64 = 0.20;

/// Housing/transport demand above which an insight is raised
pub const HOUSING_DEMAND_THRESHOLD: f64 = 0.15;

/// Backlog signal above which an MBU insight is raised
pub const BACKLOG_INSIGHT_THRESHOLD: f64 = 0.3;

const CRITICAL_MSI_LIMIT: usize = 3;
const SCHOOL_DEMAND_LIMIT: usize = 3;
const HOUSING_DEMAND_LIMIT: usize = 2;
const MBU_BACKLOG_LIMIT: usize = 2;

/// Responsible department for each insight family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Department {
    Education,
    UrbanDevelopment,
    LabourWelfare,
    UidaiRegionalOffice,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Education => "Education",
            Department::UrbanDevelopment => "Urban Development",
            Department::LabourWelfare => "Labour/Welfare",
            Department::UidaiRegionalOffice => "UIDAI Regional Office",
        }
    }
}

/// Generator for per-state insight lists
#[derive(Debug, Clone)]
pub struct InsightGenerator {
    top_n: usize,
}

impl Default for InsightGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N)
    }
}

impl InsightGenerator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Generate the top insights for `state` from one period's results.
    ///
    /// `msi` and `mbu` are expected in their computed order (score and load
    /// descending); demand proxies are ranked here.
    pub fn generate(
        &self,
        state: &str,
        msi: &[MsiResult],
        demand: &[DemandProxy],
        mbu: &[MbuLoad],
    ) -> Vec<Insight> {
        let state_msi: Vec<&MsiResult> =
            msi.iter().filter(|r| r.region_key.state == state).collect();
        let state_demand: Vec<&DemandProxy> =
            demand.iter().filter(|r| r.region_key.state == state).collect();
        let state_mbu: Vec<&MbuLoad> =
            mbu.iter().filter(|r| r.region_key.state == state).collect();

        let mut insights = Vec::new();

        insights.extend(
            state_msi
                .iter()
                .filter(|r| r.classification == MsiClassification::Critical)
                .take(CRITICAL_MSI_LIMIT)
                .map(|r| critical_msi_insight(r)),
        );

        let mut by_school = state_demand.clone();
        by_school.sort_by(|a, b| b.school_demand.total_cmp(&a.school_demand));
        insights.extend(
            by_school
                .iter()
                .take(SCHOOL_DEMAND_LIMIT)
                .filter(|d| d.school_demand > SCHOOL_DEMAND_THRESHOLD)
                .map(|d| school_demand_insight(d)),
        );

        let mut by_housing = state_demand;
        by_housing.sort_by(|a, b| {
            b.housing_transport_demand
                .total_cmp(&a.housing_transport_demand)
        });
        insights.extend(
            by_housing
                .iter()
                .take(HOUSING_DEMAND_LIMIT)
                .filter(|d| d.housing_transport_demand > HOUSING_DEMAND_THRESHOLD)
                .map(|d| housing_demand_insight(d)),
        );

        insights.extend(
            state_mbu
                .iter()
                .filter(|m| m.backlog_signal > BACKLOG_INSIGHT_THRESHOLD)
                .take(MBU_BACKLOG_LIMIT)
                .map(|m| mbu_backlog_insight(m)),
        );

        insights.sort_by(|a, b| {
            a.impact
                .cmp(&b.impact)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
        insights.truncate(self.top_n);
        insights
    }
}

/// Confidence from MSI strength plus a bonus for sustained high periods
pub fn msi_confidence(msi_score: f64, consecutive: u32) -> f64 {
    let base = (msi_score.abs() / 4.0).min(0.7);
    let duration_bonus = (f64::from(consecutive) * 0.1).min(0.3);
    round_to(base + duration_bonus, 2)
}

fn critical_msi_insight(result: &MsiResult) -> Insight {
    Insight {
        indicator: "MSI (Critical)".to_string(),
        region: result.region_key.display_name(),
        evidence: format!(
            "MSI={:?}, {} consecutive high periods",
            result.msi_score, result.consecutive_watch_periods
        ),
        action: "Priority intervention needed - high settlement instability signals".to_string(),
        department: Department::LabourWelfare.as_str().to_string(),
        impact: Impact::High,
        confidence: msi_confidence(result.msi_score, result.consecutive_watch_periods),
    }
}

fn school_demand_insight(demand: &DemandProxy) -> Insight {
    let impact = if demand.school_demand < SCHOOL_DEMAND_HIGH_IMPACT {
        Impact::Medium
    } else {
        Impact::High
    };

    Insight {
        indicator: "School Demand Proxy".to_string(),
        region: demand.region_key.display_name(),
        evidence: format!(
            "Child growth={}, Adult settlement gain detected",
            percent(demand.child_growth_rate, 1)
        ),
        action: "Assess school infrastructure capacity".to_string(),
        department: Department::Education.as_str().to_string(),
        impact,
        confidence: round_to((0.5 + demand.school_demand.abs()).min(0.9), 4),
    }
}

fn housing_demand_insight(demand: &DemandProxy) -> Insight {
    Insight {
        indicator: "Housing/Transport Proxy".to_string(),
        region: demand.region_key.display_name(),
        evidence: format!(
            "Adult growth={}, Address intensity={}",
            percent(demand.adult_growth_rate, 1),
            percent(demand.address_intensity, 1)
        ),
        action: "Review housing and transport infrastructure plans".to_string(),
        department: Department::UrbanDevelopment.as_str().to_string(),
        impact: Impact::Medium,
        confidence: round_to((0.4 + demand.housing_transport_demand.abs()).min(0.85), 4),
    }
}

fn mbu_backlog_insight(load: &MbuLoad) -> Insight {
    Insight {
        indicator: "MBU Backlog Signal".to_string(),
        region: load.region_key.display_name(),
        evidence: format!(
            "Load={}, Backlog signal=+{}",
            load.total_mbu_load,
            percent(load.backlog_signal, 0)
        ),
        action: "Schedule additional MBU camps in this region".to_string(),
        department: Department::UidaiRegionalOffice.as_str().to_string(),
        impact: Impact::Medium,
        confidence: round_to((0.5 + load.backlog_signal).min(0.9), 4),
    }
}

fn percent(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}
