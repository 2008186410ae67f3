//! CSV dataset files: load existing records, write merged records back.
//!
//! Writes are all-or-nothing per run: records are staged to a sibling
//! `.tmp` file and renamed over the dataset path, so an aborted run
//! leaves the previous dataset intact.

use std::fs;
use std::path::Path;

use datamill_source_models::TabularRecord;

use crate::StoreError;

/// Loads all records from a dataset file.
///
/// An absent file is an empty dataset. An existing file that cannot be
/// parsed back into `T` is surfaced as [`StoreError::CorruptDataset`] so
/// the caller never silently overwrites data it could not read.
///
/// # Errors
///
/// Returns [`StoreError::CorruptDataset`] on unreadable or malformed
/// content.
pub fn load_records<T: TabularRecord>(path: &Path) -> Result<Vec<T>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let corrupt = |message: String| StoreError::CorruptDataset {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| corrupt(e.to_string()))?;

    let mut records = Vec::new();
    for row in reader.deserialize::<T>() {
        records.push(row.map_err(|e| corrupt(e.to_string()))?);
    }

    log::debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Writes `records` to the dataset path atomically.
///
/// The CSV (header row plus one line per record) is staged next to the
/// target and moved into place with a same-directory rename.
///
/// # Errors
///
/// Returns [`StoreError`] if staging, encoding, or the final rename
/// fails.
pub fn write_records<T: TabularRecord>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = path.with_extension("csv.tmp");

    let mut writer = csv::Writer::from_path(&staging)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    drop(writer);

    fs::rename(&staging, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use datamill_source_models::SeismicEvent;

    use super::*;

    fn event(id: &str, time: &str, mag: f64) -> SeismicEvent {
        SeismicEvent {
            usgs_id: id.to_string(),
            time: Some(time.parse::<DateTime<Utc>>().unwrap()),
            updated: None,
            mag: Some(mag),
            place: Some("10 km N of Testville".to_string()),
            event_type: Some("earthquake".to_string()),
            status: None,
            tsunami: Some(0),
            sig: None,
            felt: None,
            cdi: None,
            mmi: None,
            alert: None,
            lon: Some(-120.5),
            lat: Some(36.1),
            depth_km: Some(7.2),
            url: None,
            detail: None,
            title: None,
        }
    }

    #[test]
    fn absent_file_is_empty_dataset() {
        let path = std::env::temp_dir().join("datamill_dataset_absent/none.csv");
        let records: Vec<SeismicEvent> = load_records(&path).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn round_trips_records() {
        let dir = std::env::temp_dir().join("datamill_dataset_roundtrip");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("earthquakes.csv");

        let records = vec![
            event("us1", "2024-01-05T10:00:00Z", 4.4),
            event("us2", "2024-01-06T11:30:00Z", 5.1),
        ];
        write_records(&path, &records).unwrap();

        let loaded: Vec<SeismicEvent> = load_records(&path).unwrap();
        assert_eq!(loaded, records);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_leaves_no_staging_file() {
        let dir = std::env::temp_dir().join("datamill_dataset_staging");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("earthquakes.csv");

        write_records(&path, &[event("us1", "2024-01-05T10:00:00Z", 4.4)]).unwrap();

        assert!(path.exists());
        assert!(!dir.join("earthquakes.csv.tmp").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_reported_not_overwritten() {
        let dir = std::env::temp_dir().join("datamill_dataset_corrupt");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("earthquakes.csv");
        fs::write(&path, "this is not,a dataset\n1,2\n3").unwrap();

        let result: Result<Vec<SeismicEvent>, _> = load_records(&path);
        assert!(matches!(result, Err(StoreError::CorruptDataset { .. })));

        let _ = fs::remove_dir_all(&dir);
    }
}
