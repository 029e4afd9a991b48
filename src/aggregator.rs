//! Region/period aggregation
//!
//! This module folds cleaned source rows into per-period, per-region sums of
//! the dataset's numeric columns.

use crate::types::{
    BiometricCounts, DatasetKind, DemographicCounts, EnrolmentCounts, Granularity, Period,
    RawRow, RegionKey,
};
use std::collections::BTreeMap;

/// Typed count record built from one dataset's numeric columns
pub trait CountRecord: Default + Clone {
    /// Dataset this record summarizes
    const KIND: DatasetKind;

    /// Read the record's columns from a row; absent columns read as 0
    fn from_row(row: &RawRow) -> Self;

    /// Add another record's counts into this one
    fn accumulate(&mut self, other: &Self);
}

impl CountRecord for EnrolmentCounts {
    const KIND: DatasetKind = DatasetKind::Enrolment;

    fn from_row(row: &RawRow) -> Self {
        Self {
            age_0_5: row.value("age_0_5"),
            age_5_17: row.value("age_5_17"),
            age_18_greater: row.value("age_18_greater"),
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.age_0_5 += other.age_0_5;
        self.age_5_17 += other.age_5_17;
        self.age_18_greater += other.age_18_greater;
    }
}

impl CountRecord for DemographicCounts {
    const KIND: DatasetKind = DatasetKind::Demographic;

    fn from_row(row: &RawRow) -> Self {
        Self {
            demo_age_5_17: row.value("demo_age_5_17"),
            demo_age_17_: row.value("demo_age_17_"),
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.demo_age_5_17 += other.demo_age_5_17;
        self.demo_age_17_ += other.demo_age_17_;
    }
}

impl CountRecord for BiometricCounts {
    const KIND: DatasetKind = DatasetKind::Biometric;

    fn from_row(row: &RawRow) -> Self {
        Self {
            bio_age_5_17: row.value("bio_age_5_17"),
            bio_age_17_: row.value("bio_age_17_"),
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.bio_age_5_17 += other.bio_age_5_17;
        self.bio_age_17_ += other.bio_age_17_;
    }
}

/// Per-period, per-region sums for one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct RawAggregate<T> {
    cells: BTreeMap<Period, BTreeMap<RegionKey, T>>,
}

impl<T> Default for RawAggregate<T> {
    fn default() -> Self {
        Self {
            cells: BTreeMap::new(),
        }
    }
}

impl<T: CountRecord> RawAggregate<T> {
    /// Add a record into the (period, region) cell, zero-initializing it first
    pub fn add(&mut self, period: Period, region: RegionKey, record: &T) {
        self.cells
            .entry(period)
            .or_default()
            .entry(region)
            .or_default()
            .accumulate(record);
    }

    /// All regions for a period; empty when the period was never seen
    pub fn period(&self, period: &Period) -> BTreeMap<RegionKey, T> {
        self.cells.get(period).cloned().unwrap_or_default()
    }

    /// Single cell lookup
    pub fn get(&self, period: &Period, region: &RegionKey) -> Option<&T> {
        self.cells.get(period).and_then(|regions| regions.get(region))
    }

    /// Periods present in this aggregate, in order
    pub fn periods(&self) -> impl Iterator<Item = &Period> {
        self.cells.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Aggregator folding a row stream into a [`RawAggregate`]
pub struct RegionPeriodAggregator {
    granularity: Granularity,
}

impl RegionPeriodAggregator {
    pub fn new(granularity: Granularity) -> Self {
        Self { granularity }
    }

    /// Sum rows by period and region.
    ///
    /// Rows without a parsed date are skipped.
    pub fn aggregate<T, I>(&self, rows: I) -> RawAggregate<T>
    where
        T: CountRecord,
        I: IntoIterator<Item = RawRow>,
    {
        let mut aggregate = RawAggregate::default();
        let mut skipped = 0usize;
        let mut folded = 0usize;

        for row in rows {
            let Some(date) = row.date else {
                skipped += 1;
                continue;
            };

            let period = Period::from_date(date, self.granularity);
            aggregate.add(period, row.region_key(), &T::from_row(&row));
            folded += 1;
        }

        log::debug!(
            "Aggregated {} {} rows into {} periods ({} undated rows skipped)",
            folded,
            T::KIND,
            aggregate.cells.len(),
            skipped
        );

        aggregate
    }
}
