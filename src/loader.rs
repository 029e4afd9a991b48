//! Dataset loading
//!
//! This module discovers the CSV files of each dataset under a base directory
//! and cleans their rows into [`RawRow`]s: dates parsed, geographic cells
//! trimmed, numeric cells coerced to integers.

use crate::error::ComputeError;
use crate::types::{DatasetKind, RawRow};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Name of the date column in every dataset
pub const DATE_COLUMN: &str = "date";

/// Geographic columns shared by every dataset
pub const GEO_COLUMNS: [&str; 3] = ["state", "district", "pincode"];

/// Accepted date formats, tried in order
const DATE_FORMATS: [&str; 2] = ["%d-%m-%Y", "%Y-%m-%d"];

/// Parse a date cell; `None` when no accepted format matches
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

/// Loader for the dataset directories under one base directory
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    base_dir: PathBuf,
}

impl DatasetLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Locate a dataset's directory.
    ///
    /// Archives often unpack to `api_data_aadhar_X/api_data_aadhar_X`, so the
    /// nested layout is preferred over the flat one.
    pub fn dataset_dir(&self, kind: DatasetKind) -> Result<PathBuf, ComputeError> {
        let name = format!("api_data_aadhar_{}", kind.as_str());
        let flat = self.base_dir.join(&name);
        let nested = flat.join(&name);

        if nested.is_dir() {
            Ok(nested)
        } else if flat.is_dir() {
            Ok(flat)
        } else {
            Err(ComputeError::DatasetNotFound(flat))
        }
    }

    /// All CSV files of a dataset, sorted by path.
    ///
    /// Looks one level deep first and recurses only when that finds nothing.
    pub fn discover_files(&self, kind: DatasetKind) -> Result<Vec<PathBuf>, ComputeError> {
        let dir = self.dataset_dir(kind)?;

        let mut files = Vec::new();
        collect_csv_files(&dir, false, &mut files)?;
        if files.is_empty() {
            collect_csv_files(&dir, true, &mut files)?;
        }

        files.sort();
        log::debug!("Found {} {} files in {}", files.len(), kind, dir.display());
        Ok(files)
    }

    /// Load every row of a dataset
    pub fn load_dataset(&self, kind: DatasetKind) -> Result<Vec<RawRow>, ComputeError> {
        let mut rows = Vec::new();

        for path in self.discover_files(kind)? {
            let file = fs::File::open(&path)?;
            let before = rows.len();
            rows.extend(read_rows(kind, file)?);
            log::debug!("Read {} rows from {}", rows.len() - before, path.display());
        }

        let undated = rows.iter().filter(|r| r.date.is_none()).count();
        if undated > 0 {
            log::warn!("{undated} {kind} rows have no parsable date and will be skipped");
        }

        log::info!("Loaded {} {} rows", rows.len(), kind);
        Ok(rows)
    }

    /// Earliest and latest parsed dates in a dataset
    pub fn date_range(
        &self,
        kind: DatasetKind,
    ) -> Result<Option<(NaiveDate, NaiveDate)>, ComputeError> {
        let rows = self.load_dataset(kind)?;
        let dates = rows.iter().filter_map(|r| r.date);

        Ok(dates.fold(None, |range, date| match range {
            None => Some((date, date)),
            Some((min, max)) => Some((min.min(date), max.max(date))),
        }))
    }

    /// Distinct values of a column (geographic or numeric)
    pub fn unique_values(
        &self,
        kind: DatasetKind,
        column: &str,
    ) -> Result<BTreeSet<String>, ComputeError> {
        let rows = self.load_dataset(kind)?;

        Ok(rows
            .iter()
            .filter_map(|row| match column {
                "state" => row.state.clone(),
                "district" => row.district.clone(),
                "pincode" => row.pincode.clone(),
                other => row.values.get(other).map(i64::to_string),
            })
            .collect())
    }
}

/// Clean the rows of one CSV source
pub fn read_rows<R: Read>(kind: DatasetKind, reader: R) -> Result<Vec<RawRow>, ComputeError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(index, header)| (header.trim().to_owned(), index))
        .collect();

    let mut rows = Vec::new();

    for result in reader.records() {
        let record = result?;

        let values = kind
            .numeric_columns()
            .iter()
            .map(|&column| {
                let value = cell(&headers, &record, column).parse::<i64>().unwrap_or(0);
                (column.to_owned(), value)
            })
            .collect();

        rows.push(RawRow {
            date: parse_date(cell(&headers, &record, DATE_COLUMN)),
            state: geo_cell(&headers, &record, GEO_COLUMNS[0]),
            district: geo_cell(&headers, &record, GEO_COLUMNS[1]),
            pincode: geo_cell(&headers, &record, GEO_COLUMNS[2]),
            values,
        });
    }

    Ok(rows)
}

/// Trimmed cell value; absent columns read as empty
fn cell<'r>(
    headers: &HashMap<String, usize>,
    record: &'r csv::StringRecord,
    column: &str,
) -> &'r str {
    headers
        .get(column)
        .and_then(|&index| record.get(index))
        .map_or("", str::trim)
}

fn geo_cell(
    headers: &HashMap<String, usize>,
    record: &csv::StringRecord,
    column: &str,
) -> Option<String> {
    let value = cell(headers, record, column);
    (!value.is_empty()).then(|| value.to_owned())
}

fn collect_csv_files(
    dir: &Path,
    recursive: bool,
    files: &mut Vec<PathBuf>,
) -> Result<(), ComputeError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            if recursive {
                collect_csv_files(&path, true, files)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ENROLMENT_CSV: &str = "\
date,state,district,pincode,age_0_5,age_5_17,age_18_greater
01-03-2025,Bihar,Patna,800001,4,7,12
2025-03-02, Bihar ,Gaya,823001,1,,3
not-a-date,Bihar,Patna,800001,9,9,9
15-04-2025,,,,2,x,5
";

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("01-03-2025"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_date("2025-03-01"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_date("03/01/2025"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_read_rows_cleans_cells() {
        let rows = read_rows(DatasetKind::Enrolment, ENROLMENT_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(rows[0].value("age_18_greater"), 12);

        assert_eq!(rows[1].state.as_deref(), Some("Bihar"));
        assert_eq!(rows[1].value("age_5_17"), 0);

        assert_eq!(rows[2].date, None);

        assert_eq!(rows[3].state, None);
        assert_eq!(rows[3].value("age_5_17"), 0);
        assert_eq!(rows[3].region_key().to_string(), "Unknown|Unknown|000000");
    }

    #[test]
    fn test_missing_columns_read_as_zero() {
        let csv = "date,state,district,pincode,bio_age_5_17\n01-01-2025,Goa,North Goa,403001,8\n";
        let rows = read_rows(DatasetKind::Biometric, csv.as_bytes()).unwrap();

        assert_eq!(rows[0].value("bio_age_5_17"), 8);
        assert_eq!(rows[0].value("bio_age_17_"), 0);
    }

    #[test]
    fn test_missing_dataset_directory() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DatasetLoader::new(dir.path());

        assert!(matches!(
            loader.load_dataset(DatasetKind::Demographic),
            Err(ComputeError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_discovers_nested_layout_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir
            .path()
            .join("api_data_aadhar_enrolment")
            .join("api_data_aadhar_enrolment");
        write(&nested.join("part_b.csv"), ENROLMENT_CSV);
        write(&nested.join("part_a.csv"), ENROLMENT_CSV);
        write(&nested.join("notes.txt"), "ignored");

        let loader = DatasetLoader::new(dir.path());
        let files = loader.discover_files(DatasetKind::Enrolment).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["part_a.csv", "part_b.csv"]);

        assert_eq!(loader.load_dataset(DatasetKind::Enrolment).unwrap().len(), 8);
        assert_eq!(
            loader.date_range(DatasetKind::Enrolment).unwrap(),
            Some((
                NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
            ))
        );

        let districts = loader
            .unique_values(DatasetKind::Enrolment, "district")
            .unwrap();
        assert_eq!(
            districts.into_iter().collect::<Vec<_>>(),
            vec!["Gaya".to_string(), "Patna".to_string()]
        );
    }

    #[test]
    fn test_flat_layout_with_deeper_files() {
        let dir = tempfile::tempdir().unwrap();
        let flat = dir.path().join("api_data_aadhar_biometric");
        write(
            &flat.join("2025").join("march.csv"),
            "date,state,district,pincode,bio_age_5_17,bio_age_17_\n01-03-2025,Goa,North Goa,403001,1,2\n",
        );

        let loader = DatasetLoader::new(dir.path());
        let rows = loader.load_dataset(DatasetKind::Biometric).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("bio_age_17_"), 2);
    }
}
