//! Indicator computation
//!
//! This module computes the three per-period indicator sets:
//! - Migration Stress Index (z-score composite with consecutive-period tracking)
//! - Infrastructure demand proxies (school, housing/transport)
//! - Mandatory Biometric Update load and backlog signal
//!
//! All outputs are proxy indicators, not exact migration measurements.

use crate::history::{HistoryTracker, LoadBaseline};
use crate::snapshot::MergedSnapshot;
use crate::types::{
    round_to, BiometricCounts, DemandProxy, MbuLoad, MsiClassification, MsiResult, Period,
    RegionKey,
};
use std::collections::BTreeMap;

/// MSI score at or above which a region is at least on watch
pub const STABLE_THRESHOLD: f64 = 1.0;

/// MSI score at or above which a period counts towards the consecutive counter
pub const WATCH_THRESHOLD: f64 = 2.0;

/// Consecutive high periods required for a Critical classification
pub const CONSECUTIVE_PERIODS_FOR_CRITICAL: u32 = 3;

/// Mean and sample standard deviation of a value list
///
/// Both are taken over values shifted by the first one, so a list of equal
/// values has exactly zero spread.
#[derive(Debug, Clone, Copy)]
struct Distribution {
    shift: f64,
    mean: f64,
    std_dev: f64,
    count: usize,
}

impl Distribution {
    fn of(values: &[f64]) -> Self {
        let count = values.len();
        let shift = values.first().copied().unwrap_or(0.0);
        if count < 2 {
            return Self {
                shift,
                mean: 0.0,
                std_dev: 0.0,
                count,
            };
        }

        let mean = values.iter().map(|v| v - shift).sum::<f64>() / count as f64;
        let variance = values
            .iter()
            .map(|v| (v - shift - mean).powi(2))
            .sum::<f64>()
            / (count - 1) as f64;

        Self {
            shift,
            mean,
            std_dev: variance.sqrt(),
            count,
        }
    }

    fn zscore(&self, value: f64) -> f64 {
        if self.count < 2 || self.std_dev == 0.0 {
            return 0.0;
        }
        (value - self.shift - self.mean) / self.std_dev
    }
}

/// Z-score of `value` against `values` (sample standard deviation).
///
/// Returns 0 for fewer than two values or zero spread.
pub fn zscore(value: f64, values: &[f64]) -> f64 {
    Distribution::of(values).zscore(value)
}

/// Period-over-period growth with a step at zero: 0 → 0 is 0, 0 → n is 1
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current == 0.0 { 0.0 } else { 1.0 };
    }
    (current - previous) / previous
}

/// Classify an MSI score given the region's updated consecutive counter
pub fn classify(msi_score: f64, consecutive: u32) -> MsiClassification {
    if msi_score >= WATCH_THRESHOLD && consecutive >= CONSECUTIVE_PERIODS_FOR_CRITICAL {
        MsiClassification::Critical
    } else if msi_score >= STABLE_THRESHOLD {
        MsiClassification::Watch
    } else {
        MsiClassification::Stable
    }
}

/// Compute the Migration Stress Index for every region in a snapshot.
///
/// `MSI = z(address_update_rate) + z(adult_enrolment_growth) - z(enrolment_decline)`,
/// with z-scores taken across all regions in the period. Advances each
/// region's consecutive counter in `history`. Results are sorted by score,
/// highest first.
pub fn compute_msi(snapshot: &MergedSnapshot, history: &mut HistoryTracker) -> Vec<MsiResult> {
    let address_rates: Vec<f64> = snapshot
        .records
        .values()
        .map(|r| r.address_update_rate)
        .collect();
    let adult_growths: Vec<f64> = snapshot
        .records
        .values()
        .map(|r| r.adult_enrolment_growth)
        .collect();
    let declines: Vec<f64> = snapshot
        .records
        .values()
        .map(|r| r.enrolment_decline)
        .collect();

    let address_dist = Distribution::of(&address_rates);
    let adult_dist = Distribution::of(&adult_growths);
    let decline_dist = Distribution::of(&declines);

    let mut results: Vec<MsiResult> = snapshot
        .records
        .iter()
        .map(|(region, record)| {
            let addr_z = address_dist.zscore(record.address_update_rate);
            let adult_z = adult_dist.zscore(record.adult_enrolment_growth);
            let decline_z = decline_dist.zscore(record.enrolment_decline);

            let msi_score = addr_z + adult_z - decline_z;
            let consecutive = history.advance(region, msi_score >= WATCH_THRESHOLD);

            MsiResult {
                region_key: region.clone(),
                period: snapshot.period.clone(),
                msi_score: round_to(msi_score, 3),
                classification: classify(msi_score, consecutive),
                address_update_zscore: round_to(addr_z, 3),
                adult_enrolment_zscore: round_to(adult_z, 3),
                enrolment_decline_zscore: round_to(decline_z, 3),
                consecutive_watch_periods: consecutive,
            }
        })
        .collect();

    results.sort_by(|a, b| b.msi_score.total_cmp(&a.msi_score));
    results
}

/// Compute infrastructure demand proxies for every region in `current`.
///
/// - School demand = child growth + max(0, adult growth)
/// - Housing/transport demand = adult growth + address intensity
pub fn compute_demand_proxies(
    current: &MergedSnapshot,
    previous: Option<&MergedSnapshot>,
) -> Vec<DemandProxy> {
    current
        .records
        .iter()
        .map(|(region, curr)| {
            let prev = previous
                .and_then(|snapshot| snapshot.get(region))
                .cloned()
                .unwrap_or_default();

            let child_growth = growth_rate(
                curr.enrolment.children() as f64,
                prev.enrolment.children() as f64,
            );
            let adult_growth = growth_rate(
                curr.enrolment.age_18_greater as f64,
                prev.enrolment.age_18_greater as f64,
            );

            let net_settlement = adult_growth.max(0.0);
            let address_intensity =
                curr.demographic.demo_age_17_ as f64 / curr.demographic.total().max(1) as f64;

            DemandProxy {
                region_key: region.clone(),
                period: current.period.clone(),
                school_demand: round_to(child_growth + net_settlement, 4),
                housing_transport_demand: round_to(adult_growth + address_intensity, 4),
                child_growth_rate: round_to(child_growth, 4),
                adult_growth_rate: round_to(adult_growth, 4),
                address_intensity: round_to(address_intensity, 4),
            }
        })
        .collect()
}

/// Compute MBU load and backlog signal for one period's biometric sums.
///
/// `backlog = load / historical_average - 1`; a region with no recorded history
/// is measured against its own load. Ranks are assigned by load, highest first.
pub fn compute_mbu_load(
    period: &Period,
    biometric: &BTreeMap<RegionKey, BiometricCounts>,
    baseline: &LoadBaseline,
) -> Vec<MbuLoad> {
    let mut results: Vec<MbuLoad> = biometric
        .iter()
        .map(|(region, counts)| {
            let total_load = counts.total();
            let avg = baseline.average(region).unwrap_or(total_load as f64);

            let backlog_signal = if avg > 0.0 {
                total_load as f64 / avg - 1.0
            } else {
                0.0
            };

            MbuLoad {
                region_key: region.clone(),
                period: period.clone(),
                total_mbu_load: total_load,
                age_5_17_load: counts.bio_age_5_17,
                backlog_signal: round_to(backlog_signal, 3),
                priority_rank: 0,
            }
        })
        .collect();

    results.sort_by(|a, b| b.total_mbu_load.cmp(&a.total_mbu_load));
    for (index, result) in results.iter_mut().enumerate() {
        result.priority_rank = index as u32 + 1;
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DemographicCounts, EnrolmentCounts, MergedRecord};
    use pretty_assertions::assert_eq;

    fn period() -> Period {
        Period::parse("2025-03").unwrap()
    }

    fn ratios(address: f64, adult: f64, decline: f64) -> MergedRecord {
        MergedRecord {
            address_update_rate: address,
            adult_enrolment_growth: adult,
            enrolment_decline: decline,
            ..Default::default()
        }
    }

    fn snapshot(records: Vec<(RegionKey, MergedRecord)>) -> MergedSnapshot {
        MergedSnapshot {
            period: period(),
            records: records.into_iter().collect(),
        }
    }

    fn patna() -> RegionKey {
        RegionKey::new("Bihar", "Patna", "800001")
    }

    fn gaya() -> RegionKey {
        RegionKey::new("Bihar", "Gaya", "823001")
    }

    #[test]
    fn test_zscore_guards() {
        assert_eq!(zscore(5.0, &[5.0]), 0.0);
        assert_eq!(zscore(5.0, &[]), 0.0);
        assert_eq!(zscore(3.0, &[3.0, 3.0, 3.0]), 0.0);

        // mean 2, sample std 1
        assert!((zscore(3.0, &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_growth_rate_step_at_zero() {
        assert_eq!(growth_rate(0.0, 0.0), 0.0);
        assert_eq!(growth_rate(25.0, 0.0), 1.0);
        assert!((growth_rate(120.0, 100.0) - 0.2).abs() < 1e-12);
        assert!((growth_rate(80.0, 100.0) + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_two_region_scenario() {
        let snap = snapshot(vec![
            (patna(), ratios(0.15, 0.08, 0.02)),
            (gaya(), ratios(0.25, 0.12, -0.05)),
        ]);
        let mut history = HistoryTracker::new();

        let results = compute_msi(&snap, &mut history);

        // With two samples each z-score is +/- 1/sqrt(2)
        let z = std::f64::consts::FRAC_1_SQRT_2;
        let gaya_result = &results[0];
        let patna_result = &results[1];

        assert_eq!(gaya_result.region_key, gaya());
        assert_eq!(gaya_result.address_update_zscore, round_to(z, 3));
        assert_eq!(gaya_result.adult_enrolment_zscore, round_to(z, 3));
        assert_eq!(gaya_result.enrolment_decline_zscore, round_to(-z, 3));
        assert_eq!(gaya_result.msi_score, round_to(3.0 * z, 3));
        assert_eq!(patna_result.msi_score, round_to(-3.0 * z, 3));
        assert!(gaya_result.msi_score > patna_result.msi_score);

        // 2.121 crosses the watch threshold but has only one high period
        assert_eq!(gaya_result.classification, MsiClassification::Watch);
        assert_eq!(gaya_result.consecutive_watch_periods, 1);
        assert_eq!(patna_result.classification, MsiClassification::Stable);
        assert_eq!(patna_result.consecutive_watch_periods, 0);
    }

    #[test]
    fn test_single_region_has_zero_scores() {
        let snap = snapshot(vec![(patna(), ratios(0.9, 0.5, -0.3))]);
        let results = compute_msi(&snap, &mut HistoryTracker::new());

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].msi_score, 0.0);
        assert_eq!(results[0].address_update_zscore, 0.0);
        assert_eq!(results[0].classification, MsiClassification::Stable);
    }

    #[test]
    fn test_zscore_of_equal_values_is_zero() {
        for value in [0.1, 0.2, 0.3, 0.7, 1e-6, 123.456, -0.05] {
            for count in [2, 3, 7, 10, 50] {
                let values = vec![value; count];
                assert_eq!(zscore(value, &values), 0.0, "value {value}, count {count}");
            }
        }
    }

    #[test]
    fn test_identical_regions_have_zero_scores() {
        for value in [0.1, 0.2, 0.7] {
            for count in [3, 7, 10] {
                let records = (0..count)
                    .map(|i| {
                        let key = RegionKey::new("Bihar", "Patna", format!("8000{i:02}"));
                        (key, ratios(value, value, 0.0))
                    })
                    .collect();
                let results = compute_msi(&snapshot(records), &mut HistoryTracker::new());

                assert_eq!(results.len(), count);
                for result in &results {
                    assert_eq!(result.address_update_zscore, 0.0);
                    assert_eq!(result.adult_enrolment_zscore, 0.0);
                    assert_eq!(result.enrolment_decline_zscore, 0.0);
                    assert_eq!(result.msi_score, 0.0);
                    assert_eq!(result.classification, MsiClassification::Stable);
                }
            }
        }
    }

    #[test]
    fn test_critical_after_three_consecutive_high_periods() {
        let mut history = HistoryTracker::new();
        let snap = snapshot(vec![
            (patna(), ratios(0.15, 0.08, 0.02)),
            (gaya(), ratios(0.25, 0.12, -0.05)),
        ]);

        let classes: Vec<(MsiClassification, u32)> = (0..4)
            .map(|_| {
                let results = compute_msi(&snap, &mut history);
                (results[0].classification, results[0].consecutive_watch_periods)
            })
            .collect();

        assert_eq!(
            classes,
            vec![
                (MsiClassification::Watch, 1),
                (MsiClassification::Watch, 2),
                (MsiClassification::Critical, 3),
                (MsiClassification::Critical, 4),
            ]
        );

        // Dropping below the threshold resets the counter
        let calm = snapshot(vec![
            (patna(), ratios(0.2, 0.1, 0.0)),
            (gaya(), ratios(0.2, 0.1, 0.0)),
        ]);
        let results = compute_msi(&calm, &mut history);
        let gaya_result = results.iter().find(|r| r.region_key == gaya()).unwrap();
        assert_eq!(gaya_result.consecutive_watch_periods, 0);
        assert_eq!(history.history(&gaya()), &[1, 2, 3, 4, 0]);
    }

    #[test]
    fn test_classification_bounds() {
        assert_eq!(classify(0.99, 0), MsiClassification::Stable);
        assert_eq!(classify(1.0, 0), MsiClassification::Watch);
        assert_eq!(classify(2.5, 2), MsiClassification::Watch);
        assert_eq!(classify(2.0, 3), MsiClassification::Critical);
        assert_eq!(classify(-4.0, 7), MsiClassification::Stable);
    }

    #[test]
    fn test_all_zero_snapshot_is_neutral() {
        let snap = snapshot(vec![
            (patna(), MergedRecord::default()),
            (gaya(), MergedRecord::default()),
        ]);

        let msi = compute_msi(&snap, &mut HistoryTracker::new());
        for result in &msi {
            assert_eq!(result.msi_score, 0.0);
            assert_eq!(result.classification, MsiClassification::Stable);
        }

        let demand = compute_demand_proxies(&snap, None);
        for proxy in &demand {
            assert_eq!(proxy.school_demand, 0.0);
            assert_eq!(proxy.housing_transport_demand, 0.0);
            assert_eq!(proxy.child_growth_rate, 0.0);
            assert_eq!(proxy.adult_growth_rate, 0.0);
            assert_eq!(proxy.address_intensity, 0.0);
        }
    }

    #[test]
    fn test_demand_proxies() {
        let prev = snapshot(vec![(
            patna(),
            MergedRecord {
                enrolment: EnrolmentCounts {
                    age_0_5: 40,
                    age_5_17: 60,
                    age_18_greater: 200,
                },
                ..Default::default()
            },
        )]);

        let curr = snapshot(vec![
            (
                patna(),
                MergedRecord {
                    enrolment: EnrolmentCounts {
                        age_0_5: 50,
                        age_5_17: 60,
                        age_18_greater: 180,
                    },
                    demographic: DemographicCounts {
                        demo_age_5_17: 25,
                        demo_age_17_: 75,
                    },
                    ..Default::default()
                },
            ),
            (
                gaya(),
                MergedRecord {
                    enrolment: EnrolmentCounts {
                        age_0_5: 0,
                        age_5_17: 0,
                        age_18_greater: 30,
                    },
                    ..Default::default()
                },
            ),
        ]);

        let proxies = compute_demand_proxies(&curr, Some(&prev));
        let patna_proxy = proxies.iter().find(|p| p.region_key == patna()).unwrap();
        let gaya_proxy = proxies.iter().find(|p| p.region_key == gaya()).unwrap();

        assert_eq!(patna_proxy.child_growth_rate, 0.1);
        assert_eq!(patna_proxy.adult_growth_rate, -0.1);
        assert_eq!(patna_proxy.address_intensity, 0.75);
        // negative adult growth contributes nothing to settlement
        assert_eq!(patna_proxy.school_demand, 0.1);
        assert_eq!(patna_proxy.housing_transport_demand, 0.65);

        // first appearance: children 0 -> 0, adults 0 -> 30
        assert_eq!(gaya_proxy.child_growth_rate, 0.0);
        assert_eq!(gaya_proxy.adult_growth_rate, 1.0);
        assert_eq!(gaya_proxy.school_demand, 1.0);
    }

    #[test]
    fn test_mbu_load_and_ranks() {
        let bio = BTreeMap::from([
            (
                gaya(),
                BiometricCounts {
                    bio_age_5_17: 300,
                    bio_age_17_: 100,
                },
            ),
            (
                patna(),
                BiometricCounts {
                    bio_age_5_17: 500,
                    bio_age_17_: 700,
                },
            ),
            (
                RegionKey::new("Bihar", "Nalanda", "803101"),
                BiometricCounts {
                    bio_age_5_17: 0,
                    bio_age_17_: 0,
                },
            ),
        ]);

        let mut baseline = LoadBaseline::unbounded();
        baseline.record(&BTreeMap::from([(
            patna(),
            BiometricCounts {
                bio_age_5_17: 800,
                bio_age_17_: 0,
            },
        )]));

        let loads = compute_mbu_load(&period(), &bio, &baseline);

        let ranks: Vec<(RegionKey, u32)> = loads
            .iter()
            .map(|l| (l.region_key.clone(), l.priority_rank))
            .collect();
        assert_eq!(
            ranks,
            vec![
                (patna(), 1),
                (gaya(), 2),
                (RegionKey::new("Bihar", "Nalanda", "803101"), 3),
            ]
        );

        assert_eq!(loads[0].total_mbu_load, 1200);
        assert_eq!(loads[0].age_5_17_load, 500);
        assert_eq!(loads[0].backlog_signal, 0.5);
        // no history: compared against its own load
        assert_eq!(loads[1].backlog_signal, 0.0);
        // zero load and zero average
        assert_eq!(loads[2].backlog_signal, 0.0);
    }

    #[test]
    fn test_mbu_rank_ties_keep_encounter_order() {
        let bio = BTreeMap::from([
            (
                gaya(),
                BiometricCounts {
                    bio_age_5_17: 10,
                    bio_age_17_: 0,
                },
            ),
            (
                patna(),
                BiometricCounts {
                    bio_age_5_17: 0,
                    bio_age_17_: 10,
                },
            ),
        ]);

        let loads = compute_mbu_load(&period(), &bio, &LoadBaseline::unbounded());
        // BTreeMap iteration puts Gaya before Patna
        assert_eq!(loads[0].region_key, gaya());
        assert_eq!(loads[0].priority_rank, 1);
        assert_eq!(loads[1].priority_rank, 2);
    }
}
