//! Merged period snapshots
//!
//! This module joins one period's enrolment and demographic sums per region and
//! derives the three ratios the MSI is built from. Growth and decline are taken
//! relative to the previous period's snapshot.

use crate::types::{DemographicCounts, EnrolmentCounts, MergedRecord, Period, RegionKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-region merged records for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSnapshot {
    pub period: Period,
    pub records: BTreeMap<RegionKey, MergedRecord>,
}

impl MergedSnapshot {
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            records: BTreeMap::new(),
        }
    }

    /// Build a snapshot from one period's sums.
    ///
    /// Covers the union of enrolment and demographic regions; a missing side
    /// reads as zero counts. Regions absent from `previous` get zero growth
    /// and decline.
    pub fn build(
        period: Period,
        enrolment: &BTreeMap<RegionKey, EnrolmentCounts>,
        demographic: &BTreeMap<RegionKey, DemographicCounts>,
        previous: Option<&MergedSnapshot>,
    ) -> Self {
        let regions: BTreeSet<&RegionKey> = enrolment.keys().chain(demographic.keys()).collect();

        let records = regions
            .into_iter()
            .map(|region| {
                let e = enrolment.get(region).copied().unwrap_or_default();
                let d = demographic.get(region).copied().unwrap_or_default();
                let prev = previous.and_then(|snapshot| snapshot.get(region));
                (region.clone(), merge_record(e, d, prev))
            })
            .collect();

        Self { period, records }
    }

    pub fn get(&self, region: &RegionKey) -> Option<&MergedRecord> {
        self.records.get(region)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn merge_record(
    enrolment: EnrolmentCounts,
    demographic: DemographicCounts,
    previous: Option<&MergedRecord>,
) -> MergedRecord {
    let total_enrol = enrolment.total();
    let address_update_rate = demographic.demo_age_17_ as f64 / total_enrol.max(1) as f64;

    let prev_adult = previous.map_or(0, |p| p.enrolment.age_18_greater);
    let adult_enrolment_growth = if prev_adult > 0 {
        (enrolment.age_18_greater - prev_adult) as f64 / prev_adult as f64
    } else {
        0.0
    };

    let prev_total = previous.map_or(0.0, MergedRecord::value_sum);
    let enrolment_decline = if prev_total > 0.0 {
        (prev_total - total_enrol as f64) / prev_total
    } else {
        0.0
    };

    MergedRecord {
        enrolment,
        demographic,
        address_update_rate,
        adult_enrolment_growth,
        enrolment_decline,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key(pincode: &str) -> RegionKey {
        RegionKey::new("Bihar", "Patna", pincode)
    }

    fn enrol(age_0_5: i64, age_5_17: i64, age_18_greater: i64) -> EnrolmentCounts {
        EnrolmentCounts {
            age_0_5,
            age_5_17,
            age_18_greater,
        }
    }

    fn demo(demo_age_5_17: i64, demo_age_17_: i64) -> DemographicCounts {
        DemographicCounts {
            demo_age_5_17,
            demo_age_17_,
        }
    }

    #[test]
    fn test_first_period_has_neutral_growth() {
        let enrolment = BTreeMap::from([(key("800001"), enrol(10, 20, 70))]);
        let demographic = BTreeMap::from([(key("800001"), demo(5, 25))]);

        let snapshot = MergedSnapshot::build(
            Period::parse("2025-01").unwrap(),
            &enrolment,
            &demographic,
            None,
        );

        let record = snapshot.get(&key("800001")).unwrap();
        assert!((record.address_update_rate - 0.25).abs() < 1e-12);
        assert_eq!(record.adult_enrolment_growth, 0.0);
        assert_eq!(record.enrolment_decline, 0.0);
    }

    #[test]
    fn test_growth_and_decline_against_previous() {
        let jan = MergedSnapshot::build(
            Period::parse("2025-01").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(0, 0, 100))]),
            &BTreeMap::new(),
            None,
        );

        let feb = MergedSnapshot::build(
            Period::parse("2025-02").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(0, 0, 80))]),
            &BTreeMap::new(),
            Some(&jan),
        );

        let record = feb.get(&key("800001")).unwrap();
        assert!((record.adult_enrolment_growth + 0.2).abs() < 1e-12);
        // previous value sum is 100 counts + 0 derived ratios
        assert!((record.enrolment_decline - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_decline_uses_full_previous_value_sum() {
        let jan = MergedSnapshot::build(
            Period::parse("2025-01").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(0, 0, 100))]),
            &BTreeMap::from([(key("800001"), demo(0, 50))]),
            None,
        );
        // 100 + 50 counts + 0.5 address rate
        let prev_sum = jan.get(&key("800001")).unwrap().value_sum();
        assert!((prev_sum - 150.5).abs() < 1e-12);

        let feb = MergedSnapshot::build(
            Period::parse("2025-02").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(0, 0, 100))]),
            &BTreeMap::new(),
            Some(&jan),
        );
        let record = feb.get(&key("800001")).unwrap();
        assert!((record.enrolment_decline - 50.5 / 150.5).abs() < 1e-12);
    }

    #[test]
    fn test_adult_growth_is_zero_when_previous_adults_zero() {
        let jan = MergedSnapshot::build(
            Period::parse("2025-01").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(5, 0, 0))]),
            &BTreeMap::new(),
            None,
        );
        let feb = MergedSnapshot::build(
            Period::parse("2025-02").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(5, 0, 40))]),
            &BTreeMap::new(),
            Some(&jan),
        );
        assert_eq!(feb.get(&key("800001")).unwrap().adult_enrolment_growth, 0.0);
    }

    #[test]
    fn test_union_of_regions() {
        let snapshot = MergedSnapshot::build(
            Period::parse("2025-01").unwrap(),
            &BTreeMap::from([(key("800001"), enrol(1, 1, 1))]),
            &BTreeMap::from([(key("800002"), demo(0, 9))]),
            None,
        );

        assert_eq!(snapshot.len(), 2);
        let demo_only = snapshot.get(&key("800002")).unwrap();
        assert_eq!(demo_only.enrolment, EnrolmentCounts::default());
        // guarded by max(total_enrol, 1)
        assert!((demo_only.address_update_rate - 9.0).abs() < 1e-12);
    }
}
