//! Core types for the Aadhaar Pulse pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw rows, per-period count records, merged snapshots, and the
//! indicator records handed to the exporter.

use crate::error::ComputeError;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder for a missing state or district
pub const UNKNOWN_GEO: &str = "Unknown";

/// Placeholder for a missing pincode
pub const DEFAULT_PINCODE: &str = "000000";

/// Composite geographic identifier (state, district, pincode)
///
/// Serialized as `"state|district|pincode"` so it can be used as a JSON map key.
/// Parts containing `|` do not survive that form: parsing rejects any string
/// that does not split into exactly three parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub state: String,
    pub district: String,
    pub pincode: String,
}

impl RegionKey {
    pub fn new(
        state: impl Into<String>,
        district: impl Into<String>,
        pincode: impl Into<String>,
    ) -> Self {
        Self {
            state: state.into(),
            district: district.into(),
            pincode: pincode.into(),
        }
    }

    /// Human-readable form used in insights: `"{district}, {state} ({pincode})"`
    pub fn display_name(&self) -> String {
        format!("{}, {} ({})", self.district, self.state, self.pincode)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.state, self.district, self.pincode)
    }
}

impl FromStr for RegionKey {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('|').collect();
        match parts.as_slice() {
            [state, district, pincode] => Ok(Self::new(*state, *district, *pincode)),
            _ => Err(ComputeError::InvalidRegionKey(s.to_string())),
        }
    }
}

impl Serialize for RegionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RegionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Aggregation bucket size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Monthly,
    Quarterly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
        }
    }
}

/// Calendar period label: `YYYY-MM` or `YYYY-Q{1..4}`
///
/// Ordering is lexicographic, which is chronological because labels are
/// zero-padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period(String);

impl Period {
    /// Bucket a date into its period label
    pub fn from_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Monthly => Self(format!("{:04}-{:02}", date.year(), date.month())),
            Granularity::Quarterly => {
                let quarter = (date.month() - 1) / 3 + 1;
                Self(format!("{:04}-Q{}", date.year(), quarter))
            }
        }
    }

    /// Parse and validate a period label
    pub fn parse(label: &str) -> Result<Self, ComputeError> {
        let invalid = || ComputeError::InvalidPeriod(label.to_string());
        let (year, rest) = label.split_once('-').ok_or_else(invalid)?;

        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let valid = match rest.strip_prefix('Q') {
            Some(q) => matches!(q, "1" | "2" | "3" | "4"),
            None => {
                rest.len() == 2
                    && rest
                        .parse::<u32>()
                        .map(|m| (1..=12).contains(&m))
                        .unwrap_or(false)
            }
        };

        if valid {
            Ok(Self(label.to_string()))
        } else {
            Err(invalid())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Period {
    type Error = ComputeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.0
    }
}

/// Source dataset category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Enrolment,
    Demographic,
    Biometric,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Enrolment,
        DatasetKind::Demographic,
        DatasetKind::Biometric,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "enrolment",
            DatasetKind::Demographic => "demographic",
            DatasetKind::Biometric => "biometric",
        }
    }

    /// Numeric columns of this dataset's schema
    pub fn numeric_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Enrolment => &["age_0_5", "age_5_17", "age_18_greater"],
            DatasetKind::Demographic => &["demo_age_5_17", "demo_age_17_"],
            DatasetKind::Biometric => &["bio_age_5_17", "bio_age_17_"],
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enrolment" => Ok(DatasetKind::Enrolment),
            "demographic" => Ok(DatasetKind::Demographic),
            "biometric" => Ok(DatasetKind::Biometric),
            other => Err(ComputeError::UnknownDataset(other.to_string())),
        }
    }
}

/// One cleaned source row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// Parsed date; `None` when the cell could not be parsed
    pub date: Option<NaiveDate>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,
    /// Numeric cells by column name
    pub values: HashMap<String, i64>,
}

impl RawRow {
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self {
            date,
            ..Default::default()
        }
    }

    pub fn with_geo(mut self, state: &str, district: &str, pincode: &str) -> Self {
        self.state = Some(state.to_string());
        self.district = Some(district.to_string());
        self.pincode = Some(pincode.to_string());
        self
    }

    pub fn with_value(mut self, column: &str, value: i64) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    /// Numeric cell value; absent columns read as 0
    pub fn value(&self, column: &str) -> i64 {
        self.values.get(column).copied().unwrap_or(0)
    }

    /// Region key with missing parts defaulted
    pub fn region_key(&self) -> RegionKey {
        RegionKey::new(
            self.state.as_deref().unwrap_or(UNKNOWN_GEO),
            self.district.as_deref().unwrap_or(UNKNOWN_GEO),
            self.pincode.as_deref().unwrap_or(DEFAULT_PINCODE),
        )
    }
}

/// Summed enrolment counts for one period and region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolmentCounts {
    pub age_0_5: i64,
    pub age_5_17: i64,
    pub age_18_greater: i64,
}

impl EnrolmentCounts {
    pub fn total(&self) -> i64 {
        self.age_0_5 + self.age_5_17 + self.age_18_greater
    }

    pub fn children(&self) -> i64 {
        self.age_0_5 + self.age_5_17
    }
}

/// Summed demographic-update counts for one period and region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemographicCounts {
    pub demo_age_5_17: i64,
    pub demo_age_17_: i64,
}

impl DemographicCounts {
    pub fn total(&self) -> i64 {
        self.demo_age_5_17 + self.demo_age_17_
    }
}

/// Summed biometric-update counts for one period and region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricCounts {
    pub bio_age_5_17: i64,
    pub bio_age_17_: i64,
}

impl BiometricCounts {
    pub fn total(&self) -> i64 {
        self.bio_age_5_17 + self.bio_age_17_
    }
}

/// Enrolment and demographic counts for a region plus three derived ratios
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub enrolment: EnrolmentCounts,
    #[serde(flatten)]
    pub demographic: DemographicCounts,
    /// demo_age_17_ / max(total enrolment, 1)
    pub address_update_rate: f64,
    /// Period-over-period growth of age_18_greater (0 when no prior adults)
    pub adult_enrolment_growth: f64,
    /// Relative drop against the previous record's value sum
    pub enrolment_decline: f64,
}

impl MergedRecord {
    /// Sum of every value in the record, raw counts and derived ratios alike
    pub fn value_sum(&self) -> f64 {
        (self.enrolment.total() + self.demographic.total()) as f64
            + self.address_update_rate
            + self.adult_enrolment_growth
            + self.enrolment_decline
    }
}

/// MSI classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsiClassification {
    Stable,
    Watch,
    Critical,
}

/// Migration Stress Index result for a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsiResult {
    pub region_key: RegionKey,
    pub period: Period,
    pub msi_score: f64,
    pub classification: MsiClassification,
    pub address_update_zscore: f64,
    pub adult_enrolment_zscore: f64,
    pub enrolment_decline_zscore: f64,
    pub consecutive_watch_periods: u32,
}

/// Infrastructure demand proxy result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandProxy {
    pub region_key: RegionKey,
    pub period: Period,
    pub school_demand: f64,
    pub housing_transport_demand: f64,
    pub child_growth_rate: f64,
    pub adult_growth_rate: f64,
    pub address_intensity: f64,
}

/// Mandatory Biometric Update load metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MbuLoad {
    pub region_key: RegionKey,
    pub period: Period,
    pub total_mbu_load: i64,
    pub age_5_17_load: i64,
    /// Positive when the load is above the region's historical average
    pub backlog_signal: f64,
    /// 1-based rank by total load, highest first
    pub priority_rank: u32,
}

/// Insight impact tier; declaration order is the ranking order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// Short advisory record derived from one period's indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub indicator: String,
    pub region: String,
    pub evidence: String,
    pub action: String,
    pub department: String,
    pub impact: Impact,
    /// Confidence in the signal (0-1)
    pub confidence: f64,
}

/// Round to a fixed number of decimal places
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
