use crate::domain::series::observation::{Observation, ObservationSeries, ObservationStore};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    #[serde(alias = "timestamp", alias = "Date")]
    date: String,
    #[serde(alias = "close", alias = "Close", alias = "actual")]
    value: Option<f64>,
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and plain `YYYY-MM-DD` (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

/// Reads a `date,value` CSV into a series.
///
/// Rows with a missing or unparsable date or value are skipped with a warning.
/// Unsorted rows are sorted; duplicate dates keep the last row.
pub fn read_series<R: Read>(reader: R, entity: &str) -> Result<ObservationSeries> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for (row, record) in rdr.deserialize::<SeriesRecord>().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("CsvLoader {}: row {} unreadable: {}", entity, row + 1, e);
                skipped += 1;
                continue;
            }
        };
        let (Some(timestamp), Some(value)) = (parse_timestamp(&record.date), record.value) else {
            warn!(
                "CsvLoader {}: row {} skipped (date '{}', value {:?})",
                entity,
                row + 1,
                record.date,
                record.value
            );
            skipped += 1;
            continue;
        };
        points.push(Observation::new(timestamp, value));
    }

    let series = ObservationSeries::from_unordered(entity, points);
    info!(
        "CsvLoader {}: {} observations loaded ({} rows skipped)",
        entity,
        series.len(),
        skipped
    );
    Ok(series)
}

/// Loads one CSV file; the entity defaults to the file stem
pub fn load_series(path: &Path, entity: Option<&str>) -> Result<ObservationSeries> {
    let entity = match entity {
        Some(e) => e.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("CSV path has no usable file name")?
            .to_string(),
    };
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_series(BufReader::new(file), &entity)
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Loads every `*.csv` file of a directory, one entity per file
pub fn load_dir(dir: &Path) -> Result<ObservationStore> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")))
        .collect();
    paths.sort();

    let mut store = ObservationStore::default();
    for path in paths {
        store.insert(load_series(&path, None)?);
    }
    Ok(store)
}

/// Loads a file or a directory of files
pub fn load_store(path: &Path) -> Result<ObservationStore> {
    if path.is_dir() {
        load_dir(path)
    } else {
        let mut store = ObservationStore::default();
        store.insert(load_series(path, None)?);
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_reads_date_value_rows() {
        let data = "date,value\n2024-01-02,100.5\n2024-01-03,101.0\n2024-01-04,99.75\n";
        let series = read_series(data.as_bytes(), "SPX").unwrap();
        assert_eq!(series.entity(), "SPX");
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.first().unwrap().timestamp,
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
        );
        assert_eq!(series.last().unwrap().value, 99.75);
    }

    #[test]
    fn test_skips_bad_rows_and_dedups() {
        let data = "timestamp,close\n\
                    2024-01-03,101.0\n\
                    not-a-date,5.0\n\
                    2024-01-02,\n\
                    2024-01-04,n/a\n\
                    2024-01-01,99.0\n\
                    2024-01-03,102.0\n";
        let series = read_series(data.as_bytes(), "X").unwrap();
        let values: Vec<f64> = series.observations().iter().map(|o| o.value).collect();
        assert_eq!(values, vec![99.0, 102.0]);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let midnight = Utc.with_ymd_and_hms(2023, 6, 30, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2023-06-30"), Some(midnight));
        assert_eq!(parse_timestamp("2023-06-30T00:00:00Z"), Some(midnight));
        assert_eq!(parse_timestamp("2023-06-30 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("30/06/2023"), None);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = load_series(Path::new("/nonexistent/pwin.csv"), None).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }
}
